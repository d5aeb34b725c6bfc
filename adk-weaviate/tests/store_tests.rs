//! End-to-end tests of the vector store against the in-memory service.

use std::collections::HashMap;
use std::sync::Arc;

use adk_weaviate::service::ADDITIONAL_KEY;
use adk_weaviate::{
    AddTextsOptions, DataObject, EmbeddingProvider, IndexSchema, InMemoryVectorDatabase, Metadata,
    MetadataValue, QueryOptions, QueryRequest, ResultRecord, SearchMode, VectorDatabase,
    WeaviateConfig, WeaviateError, WeaviateVectorStore,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Returns fixed vectors for known texts and a constant vector otherwise.
struct TableEmbedder {
    table: HashMap<&'static str, Vec<f32>>,
}

impl TableEmbedder {
    fn new(entries: &[(&'static str, [f32; 3])]) -> Self {
        Self { table: entries.iter().map(|(k, v)| (*k, v.to_vec())).collect() }
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed_query(&self, text: &str) -> adk_weaviate::Result<Vec<f32>> {
        Ok(self.table.get(text).cloned().unwrap_or_else(|| vec![0.0, 0.0, 1.0]))
    }
}

/// Serves canned records and remembers the last request.
struct CannedService {
    records: Vec<ResultRecord>,
    last_request: tokio::sync::Mutex<Option<QueryRequest>>,
}

impl CannedService {
    fn new(records: Vec<Value>) -> Self {
        let records = records
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                other => panic!("not an object: {other}"),
            })
            .collect();
        Self { records, last_request: tokio::sync::Mutex::new(None) }
    }
}

#[async_trait]
impl VectorDatabase for CannedService {
    async fn index_exists(&self, _index: &str) -> adk_weaviate::Result<bool> {
        Ok(true)
    }

    async fn create_index(&self, _schema: &IndexSchema) -> adk_weaviate::Result<()> {
        Ok(())
    }

    async fn insert_objects(&self, _objects: &[DataObject]) -> adk_weaviate::Result<()> {
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> adk_weaviate::Result<Vec<ResultRecord>> {
        *self.last_request.lock().await = Some(request.clone());
        Ok(self.records.iter().take(request.limit).cloned().collect())
    }

    async fn delete_by_id(
        &self,
        _index: &str,
        _id: &str,
        _tenant: Option<&str>,
    ) -> adk_weaviate::Result<()> {
        Ok(())
    }
}

fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(TableEmbedder::new(&[
        ("a", [1.0, 0.0, 0.0]),
        ("b", [0.0, 1.0, 0.0]),
        ("apple pie", [1.0, 0.1, 0.0]),
        ("apple tart", [1.0, 0.12, 0.0]),
        ("banana bread", [0.2, 1.0, 0.0]),
        ("apple", [1.0, 0.0, 0.0]),
    ]))
}

fn config(index: &str) -> WeaviateConfig {
    WeaviateConfig::builder().index_name(index).build().unwrap()
}

async fn store_with(
    texts: &[&str],
    ids: Option<&[String]>,
) -> (Arc<InMemoryVectorDatabase>, WeaviateVectorStore) {
    let db = Arc::new(InMemoryVectorDatabase::new());
    let store = WeaviateVectorStore::from_texts(
        db.clone(),
        texts,
        Some(embedder()),
        None,
        ids,
        config("Docs"),
    )
    .await
    .unwrap();
    (db, store)
}

fn contents(docs: &[adk_weaviate::Document]) -> Vec<&str> {
    docs.iter().map(|d| d.content.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn added_texts_round_trip_by_vector_with_ids() {
    let ids = vec!["id1".to_string(), "id2".to_string()];
    let (_db, store) = store_with(&[], None).await;
    let returned = store.add_texts(&["a", "b"], None, Some(&ids)).await.unwrap();
    assert_eq!(returned, ids);

    let options = QueryOptions::new().with_additional_field("id");
    let docs = store.similarity_search_by_vector(&[1.0, 0.0, 0.0], 2, &options).await.unwrap();
    assert_eq!(contents(&docs), vec!["a", "b"]);
    assert_eq!(docs[0].metadata[ADDITIONAL_KEY]["id"], json!("id1"));
}

#[tokio::test]
async fn generated_ids_are_uuids_in_input_order() {
    let (_db, store) = store_with(&[], None).await;
    let ids = store.add_texts(&["a", "b", "c"], None, None).await.unwrap();
    assert_eq!(ids.len(), 3);
    for id in &ids {
        assert!(uuid::Uuid::parse_str(id).is_ok(), "{id} is not a uuid");
    }

    let options = QueryOptions::new().with_additional_field("id");
    let docs = store.similarity_search_by_vector(&[0.0, 1.0, 0.0], 1, &options).await.unwrap();
    assert_eq!(docs[0].content, "b");
    assert_eq!(docs[0].metadata[ADDITIONAL_KEY]["id"], json!(ids[1]));
}

#[tokio::test]
async fn reusing_an_id_replaces_the_object() {
    let ids = vec!["same".to_string()];
    let (db, store) = store_with(&["a"], Some(&ids)).await;
    store.add_texts(&["b"], None, Some(&ids)).await.unwrap();
    assert_eq!(db.object_count("Docs").await, 1);

    let docs = store
        .similarity_search_by_vector(&[1.0, 0.0, 0.0], 5, &QueryOptions::new())
        .await
        .unwrap();
    assert_eq!(contents(&docs), vec!["b"]);
}

#[tokio::test]
async fn timestamp_metadata_round_trips_as_iso_string() {
    let ts = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let mut metadata = Metadata::new();
    metadata.insert("published".to_string(), MetadataValue::from(ts));
    metadata.insert("views".to_string(), MetadataValue::from(12i64));

    let db = Arc::new(InMemoryVectorDatabase::new());
    let store = WeaviateVectorStore::from_texts(
        db,
        &["a"],
        Some(embedder()),
        Some(&[metadata]),
        None,
        config("Dated"),
    )
    .await
    .unwrap();
    assert_eq!(store.config().attributes, vec!["published", "views"]);

    let docs = store
        .similarity_search_by_vector(&[1.0, 0.0, 0.0], 1, &QueryOptions::new())
        .await
        .unwrap();
    assert_eq!(docs[0].metadata["published"], json!("2024-01-01T00:00:00"));
    assert_eq!(docs[0].metadata["views"], json!(12));
}

#[tokio::test]
async fn mismatched_lengths_are_rejected_before_any_write() {
    let (db, store) = store_with(&[], None).await;
    let ids = vec!["only-one".to_string()];
    let err = store.add_texts(&["a", "b"], None, Some(&ids)).await.unwrap_err();
    assert!(matches!(err, WeaviateError::InvalidArgument(_)));
    assert_eq!(db.insert_calls(), 0);
}

#[tokio::test]
async fn batch_size_splits_insertion_round_trips() {
    let db = Arc::new(InMemoryVectorDatabase::new());
    let config = WeaviateConfig::builder().index_name("Batched").batch_size(2).build().unwrap();
    let store = WeaviateVectorStore::new(db.clone(), config).with_embedding(embedder());
    assert!(store.ensure_index().await.unwrap());
    assert!(!store.ensure_index().await.unwrap());

    store.add_texts(&["a", "b", "c", "d", "e"], None, None).await.unwrap();
    assert_eq!(db.insert_calls(), 3);
    assert_eq!(db.object_count("Batched").await, 5);
}

#[tokio::test]
async fn from_texts_reuses_an_existing_index() {
    let db = Arc::new(InMemoryVectorDatabase::new());
    for text in ["a", "b"] {
        WeaviateVectorStore::from_texts(
            db.clone(),
            &[text],
            Some(embedder()),
            None,
            None,
            config("Shared"),
        )
        .await
        .unwrap();
    }
    assert_eq!(db.object_count("Shared").await, 2);
}

#[tokio::test]
async fn from_texts_keeps_the_configured_text_mode() {
    let db = Arc::new(InMemoryVectorDatabase::new());
    let vectorless =
        WeaviateConfig::builder().index_name("Vectorless").by_text(false).build().unwrap();
    let store = WeaviateVectorStore::from_texts(db.clone(), &["a"], None, None, None, vectorless)
        .await
        .unwrap();
    assert!(!store.config().by_text);
    let err = store.similarity_search("a", 1, &QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, WeaviateError::EmbeddingRequired(_)));

    // The default hands the text to the service, which has no vectorizer here.
    let store = WeaviateVectorStore::from_texts(db, &["b"], None, None, None, config("Vectorless"))
        .await
        .unwrap();
    let err = store.similarity_search("b", 1, &QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, WeaviateError::ServiceError { .. }));
}

#[tokio::test]
async fn tenants_are_isolated() {
    let (_db, store) = store_with(&[], None).await;
    let options = AddTextsOptions { tenant: Some("acme"), ..Default::default() };
    store.add_texts_with_options(&["a"], options).await.unwrap();

    let acme = QueryOptions::new().with_tenant("acme");
    let docs = store.similarity_search_by_vector(&[1.0, 0.0, 0.0], 5, &acme).await.unwrap();
    assert_eq!(contents(&docs), vec!["a"]);

    let docs = store
        .similarity_search_by_vector(&[1.0, 0.0, 0.0], 5, &QueryOptions::new())
        .await
        .unwrap();
    assert!(docs.is_empty());
}

#[tokio::test]
async fn embeddings_accessor_exposes_the_configured_provider() {
    let db = Arc::new(InMemoryVectorDatabase::new());
    let store = WeaviateVectorStore::new(db, config("Docs"));
    assert!(store.embeddings().is_none());

    let store = store.with_embedding(embedder());
    let provider = store.embeddings().unwrap();
    assert_eq!(provider.embed_query("b").await.unwrap(), vec![0.0, 1.0, 0.0]);
}

// ---------------------------------------------------------------------------
// Deletion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_without_ids_fails_without_calling_the_service() {
    let (db, store) = store_with(&["a"], None).await;
    let err = store.delete::<String>(&[]).await.unwrap_err();
    assert!(matches!(err, WeaviateError::NoIdsProvided));
    assert_eq!(db.delete_calls(), 0);
}

#[tokio::test]
async fn delete_stops_at_first_failure_without_rollback() {
    let ids = vec!["id1".to_string(), "id2".to_string()];
    let (db, store) = store_with(&["a", "b"], Some(&ids)).await;

    let err = store.delete(&["id1", "missing", "id2"]).await.unwrap_err();
    assert!(matches!(err, WeaviateError::ServiceError { .. }));
    assert_eq!(db.delete_calls(), 2);
    assert_eq!(db.object_count("Docs").await, 1);

    store.delete(&["id2"]).await.unwrap();
    assert_eq!(db.object_count("Docs").await, 0);
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn similarity_search_embeds_and_sends_hybrid_query() {
    let service = Arc::new(CannedService::new(vec![
        json!({"text": "second by vector", "source": "x"}),
        json!({"text": "first by vector", "source": "y"}),
    ]));
    let store =
        WeaviateVectorStore::new(service.clone(), config("Docs")).with_embedding(embedder());

    let options = QueryOptions::new().with_hybrid_alpha(0.5);
    let docs = store.similarity_search("apple", 2, &options).await.unwrap();
    // Service order is kept as is.
    assert_eq!(contents(&docs), vec!["second by vector", "first by vector"]);
    assert_eq!(docs[0].metadata["source"], json!("x"));

    let request = service.last_request.lock().await.clone().unwrap();
    let SearchMode::Hybrid(hybrid) = request.search else { panic!("expected hybrid") };
    assert_eq!(hybrid.query, "apple");
    assert_eq!(hybrid.vector, Some(vec![1.0, 0.0, 0.0]));
    assert_eq!(hybrid.alpha, Some(0.5));
    assert_eq!(request.limit, 2);
}

#[tokio::test]
async fn similarity_search_ranks_stored_texts() {
    let (_db, store) = store_with(&["apple pie", "banana bread"], None).await;
    let docs = store.similarity_search("apple", 1, &QueryOptions::new()).await.unwrap();
    assert_eq!(contents(&docs), vec!["apple pie"]);
}

#[tokio::test]
async fn text_search_without_embedder_needs_by_text() {
    let db = Arc::new(InMemoryVectorDatabase::new());
    let no_text_config = WeaviateConfig::builder().index_name("Docs").by_text(false).build().unwrap();
    let store = WeaviateVectorStore::new(db.clone(), no_text_config);
    let err = store.similarity_search("apple", 2, &QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, WeaviateError::EmbeddingRequired(_)));
    assert_eq!(db.query_calls(), 0);

    let service = Arc::new(CannedService::new(vec![json!({"text": "apple"})]));
    let store = WeaviateVectorStore::new(service.clone(), config("Docs"));
    store.similarity_search("apple", 2, &QueryOptions::new()).await.unwrap();
    let request = service.last_request.lock().await.clone().unwrap();
    assert_eq!(request.search, SearchMode::NearText("apple".into()));
}

#[tokio::test]
async fn scores_pass_through_unmodified() {
    let service = Arc::new(CannedService::new(vec![
        json!({"text": "a", "_additional": {"score": "0.8"}}),
        json!({"text": "b", "_additional": {"score": "0.3"}}),
    ]));
    let store =
        WeaviateVectorStore::new(service.clone(), config("Docs")).with_embedding(embedder());

    let scored = store.similarity_search_with_score("a", 2, &QueryOptions::new()).await.unwrap();
    assert_eq!(scored.len(), 2);
    assert_eq!(scored[0].1, 0.8);
    assert_eq!(scored[1].1, 0.3);
    assert_eq!(scored[0].0.metadata[ADDITIONAL_KEY], json!({"score": "0.8"}));

    let request = service.last_request.lock().await.clone().unwrap();
    assert_eq!(request.additional, vec!["score"]);
}

#[tokio::test]
async fn relevance_scores_use_the_configured_function() {
    let service =
        Arc::new(CannedService::new(vec![json!({"text": "a", "_additional": {"score": 0.0}})]));
    let store = WeaviateVectorStore::new(service, config("Docs")).with_embedding(embedder());

    let scored =
        store.similarity_search_with_relevance_scores("a", 1, &QueryOptions::new()).await.unwrap();
    assert!((scored[0].1 - 0.5).abs() < 1e-6);

    let store = store.with_relevance_score_fn(|s| s + 1.0);
    let scored =
        store.similarity_search_with_relevance_scores("a", 1, &QueryOptions::new()).await.unwrap();
    assert_eq!(scored[0].1, 1.0);
}

#[tokio::test]
async fn limit_option_caps_k() {
    let (_db, store) = store_with(&["a", "b", "apple pie"], None).await;
    let docs = store
        .similarity_search_by_vector(&[1.0, 0.0, 0.0], 3, &QueryOptions::new().with_limit(1))
        .await
        .unwrap();
    assert_eq!(docs.len(), 1);
}

#[tokio::test]
async fn filters_pass_through_to_the_service() {
    let db = Arc::new(InMemoryVectorDatabase::new());
    let metadatas: Vec<Metadata> = ["fruit", "bakery"]
        .iter()
        .map(|kind| Metadata::from([("kind".to_string(), MetadataValue::from(*kind))]))
        .collect();
    let store = WeaviateVectorStore::from_texts(
        db,
        &["apple pie", "banana bread"],
        Some(embedder()),
        Some(&metadatas),
        None,
        config("Filtered"),
    )
    .await
    .unwrap();

    let options = QueryOptions::new()
        .with_filter(json!({"path": ["kind"], "operator": "Equal", "valueText": "bakery"}));
    let docs = store.similarity_search_by_vector(&[1.0, 0.0, 0.0], 5, &options).await.unwrap();
    assert_eq!(contents(&docs), vec!["banana bread"]);
}

#[tokio::test]
async fn incoherent_options_are_rejected_before_querying() {
    let (db, store) = store_with(&["a"], None).await;
    let options = QueryOptions::new().with_hybrid_vector(vec![0.0, 1.0, 0.0]);
    let err = store.similarity_search_by_vector(&[1.0, 0.0, 0.0], 1, &options).await.unwrap_err();
    assert!(matches!(err, WeaviateError::InvalidArgument(_)));
    assert_eq!(db.query_calls(), 0);
}

// ---------------------------------------------------------------------------
// Maximal marginal relevance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mmr_search_diversifies_and_strips_vectors() {
    let (_db, store) = store_with(&["apple pie", "apple tart", "banana bread"], None).await;

    let plain = store
        .similarity_search_by_vector(&[1.0, 0.0, 0.0], 2, &QueryOptions::new())
        .await
        .unwrap();
    assert_eq!(contents(&plain), vec!["apple pie", "apple tart"]);

    let docs = store
        .max_marginal_relevance_search("apple", 2, 3, 0.3, &QueryOptions::new())
        .await
        .unwrap();
    assert_eq!(contents(&docs), vec!["apple pie", "banana bread"]);
    assert!(docs.iter().all(|d| !d.metadata.contains_key(ADDITIONAL_KEY)));
}

#[tokio::test]
async fn mmr_with_lambda_one_matches_plain_ranking() {
    let (_db, store) = store_with(&["apple pie", "apple tart", "banana bread"], None).await;
    let docs = store
        .max_marginal_relevance_search_by_vector(&[1.0, 0.0, 0.0], 3, 3, 1.0, &QueryOptions::new())
        .await
        .unwrap();
    assert_eq!(contents(&docs), vec!["apple pie", "apple tart", "banana bread"]);
}

#[tokio::test]
async fn mmr_keeps_requested_additional_fields() {
    let ids = vec!["p".to_string(), "t".to_string()];
    let (_db, store) = store_with(&["apple pie", "apple tart"], Some(&ids)).await;
    let options = QueryOptions::new().with_additional_field("id");
    let docs = store
        .max_marginal_relevance_search_by_vector(&[1.0, 0.0, 0.0], 1, 2, 0.5, &options)
        .await
        .unwrap();
    assert_eq!(docs[0].metadata[ADDITIONAL_KEY], json!({"id": "p"}));
}

#[tokio::test]
async fn mmr_requires_an_embedder_for_text_queries() {
    let store = WeaviateVectorStore::new(Arc::new(InMemoryVectorDatabase::new()), config("Docs"));
    let err = store
        .max_marginal_relevance_search("apple", 2, 10, 0.5, &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WeaviateError::EmbeddingRequired(_)));
}

#[tokio::test]
async fn mmr_requires_candidate_vectors() {
    let service = Arc::new(CannedService::new(vec![json!({"text": "a", "_additional": {}})]));
    let store = WeaviateVectorStore::new(service.clone(), config("Docs"));
    let err = store
        .max_marginal_relevance_search_by_vector(&[1.0, 0.0], 1, 5, 0.5, &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WeaviateError::EmbeddingRequired(_)));

    let request = service.last_request.lock().await.clone().unwrap();
    assert_eq!(request.limit, 5);
    assert_eq!(request.additional, vec!["vector", "distance"]);
}

#[tokio::test]
async fn mmr_rejects_mismatched_candidate_vectors() {
    let service = Arc::new(CannedService::new(vec![json!({
        "text": "a",
        "_additional": {"vector": [1.0, 0.0, 0.0]}
    })]));
    let store = WeaviateVectorStore::new(service, config("Docs"));
    let err = store
        .max_marginal_relevance_search_by_vector(&[1.0, 0.0], 1, 5, 0.5, &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WeaviateError::DimensionMismatch { expected: 2, actual: 3 }));
}

#[tokio::test]
async fn mmr_rejects_lambda_outside_unit_interval() {
    let (_db, store) = store_with(&["a"], None).await;
    let err = store
        .max_marginal_relevance_search_by_vector(&[1.0, 0.0, 0.0], 1, 5, 1.5, &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WeaviateError::InvalidArgument(_)));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_searches_and_writes_are_independent() {
    let (db, store) = store_with(&["apple pie", "banana bread"], None).await;
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                store.add_texts(&[format!("extra {i}")], None, None).await.map(|_| ())
            } else {
                store
                    .max_marginal_relevance_search("apple", 1, 4, 0.5, &QueryOptions::new())
                    .await
                    .map(|docs| assert_eq!(docs.len(), 1))
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(db.object_count("Docs").await, 6);
}
