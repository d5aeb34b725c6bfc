//! The vector store handle shared by retrieval and ingestion.
//!
//! [`WeaviateVectorStore`] binds one index of a [`VectorDatabase`] to an
//! optional [`EmbeddingProvider`]. Search operations live in
//! [`retrieval`](crate::retrieval), write operations in
//! [`ingestion`](crate::ingestion).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use crate::config::WeaviateConfig;
use crate::document::{Candidate, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, WeaviateError};
use crate::service::{ADDITIONAL_KEY, QueryRequest, ResultRecord, VectorDatabase};

/// Maps a raw service score to a relevance score in `[0, 1]`.
pub type RelevanceScoreFn = Arc<dyn Fn(f32) -> f32 + Send + Sync>;

/// The default relevance mapping: `1 - 1 / (1 + e^score)`.
pub fn default_relevance_score(score: f32) -> f32 {
    1.0 - 1.0 / (1.0 + score.exp())
}

/// A document store backed by one index of an external vector database.
///
/// Cloning is cheap; clones share the service and embedding provider.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use adk_weaviate::{InMemoryVectorDatabase, QueryOptions, WeaviateConfig, WeaviateVectorStore};
///
/// let config = WeaviateConfig::builder().index_name("Articles").build()?;
/// let store = WeaviateVectorStore::new(Arc::new(InMemoryVectorDatabase::new()), config)
///     .with_embedding(Arc::new(my_embedder));
/// let docs = store
///     .max_marginal_relevance_search("rust async", 4, 20, 0.5, &QueryOptions::new())
///     .await?;
/// ```
#[derive(Clone)]
pub struct WeaviateVectorStore {
    pub(crate) service: Arc<dyn VectorDatabase>,
    pub(crate) embedding: Option<Arc<dyn EmbeddingProvider>>,
    pub(crate) config: WeaviateConfig,
    pub(crate) relevance_score_fn: RelevanceScoreFn,
}

impl WeaviateVectorStore {
    /// Bind a store to the index named in `config`.
    ///
    /// The index is not created here; see
    /// [`from_texts`](WeaviateVectorStore::from_texts) or
    /// [`ensure_index`](WeaviateVectorStore::ensure_index).
    pub fn new(service: Arc<dyn VectorDatabase>, config: WeaviateConfig) -> Self {
        Self {
            service,
            embedding: None,
            config,
            relevance_score_fn: Arc::new(default_relevance_score),
        }
    }

    /// Use a client-side embedding provider for texts and queries.
    pub fn with_embedding(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding = Some(provider);
        self
    }

    /// Replace the score mapping used by relevance-scored searches.
    pub fn with_relevance_score_fn(
        mut self,
        f: impl Fn(f32) -> f32 + Send + Sync + 'static,
    ) -> Self {
        self.relevance_score_fn = Arc::new(f);
        self
    }

    /// The configured embedding provider, if any.
    pub fn embeddings(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.embedding.as_ref()
    }

    /// The store configuration.
    pub fn config(&self) -> &WeaviateConfig {
        &self.config
    }

    /// The backing service.
    pub fn service(&self) -> &Arc<dyn VectorDatabase> {
        &self.service
    }

    /// Name of the backing index.
    pub fn index_name(&self) -> &str {
        &self.config.index_name
    }

    pub(crate) async fn execute(&self, request: &QueryRequest) -> Result<Vec<ResultRecord>> {
        debug!(
            index = %request.index,
            limit = request.limit,
            filtered = request.filter.is_some(),
            tenant = request.tenant.as_deref().unwrap_or(""),
            "executing query"
        );
        self.service.query(request).await.map_err(|e| {
            error!(index = %request.index, error = %e, "query failed");
            e
        })
    }

    /// Split a record into content and metadata.
    ///
    /// `_additional` stays in metadata only when `keep_additional` is set.
    pub(crate) fn decode(
        &self,
        mut record: ResultRecord,
        keep_additional: bool,
    ) -> Result<Document> {
        let content = match record.remove(&self.config.text_key) {
            Some(Value::String(text)) => text,
            other => {
                return Err(WeaviateError::service(
                    "decode",
                    format!(
                        "record has no text property '{}' (found {:?})",
                        self.config.text_key, other
                    ),
                ));
            }
        };
        if !keep_additional {
            record.remove(ADDITIONAL_KEY);
        }
        let metadata: HashMap<String, Value> = record.into_iter().collect();
        Ok(Document { content, metadata })
    }

    /// Decode a record fetched for MMR, taking its vector out of `_additional`.
    ///
    /// Only the `_additional` fields listed in `keep` survive in metadata.
    pub(crate) fn decode_candidate(
        &self,
        mut record: ResultRecord,
        keep: &[String],
    ) -> Result<Candidate> {
        let mut additional = match record.remove(ADDITIONAL_KEY) {
            Some(Value::Object(additional)) => additional,
            _ => serde_json::Map::new(),
        };
        let embedding = match additional.get("vector") {
            Some(Value::Array(values)) => parse_vector(values)?,
            _ => {
                return Err(WeaviateError::EmbeddingRequired(
                    "the service returned a candidate without its vector; \
                     max marginal relevance search needs stored vectors"
                        .to_string(),
                ));
            }
        };

        let similarity_score = additional
            .get("score")
            .and_then(as_score)
            .or_else(|| additional.get("distance").and_then(as_score).map(|d| 1.0 - d));

        additional.retain(|field, _| keep.iter().any(|k| k == field));
        if !additional.is_empty() {
            record.insert(ADDITIONAL_KEY.to_string(), Value::Object(additional));
        }
        let document = self.decode(record, true)?;
        Ok(Candidate { document, embedding, similarity_score })
    }
}

impl fmt::Debug for WeaviateVectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeaviateVectorStore")
            .field("config", &self.config)
            .field("has_embedding", &self.embedding.is_some())
            .finish_non_exhaustive()
    }
}

fn parse_vector(values: &[Value]) -> Result<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64().map(|x| x as f32).ok_or_else(|| {
                WeaviateError::service("decode", format!("non-numeric vector component: {v}"))
            })
        })
        .collect()
}

/// Read the service's native score from `_additional`.
///
/// Hybrid queries report `score` (as a string); near-vector and near-text
/// queries report `distance`.
pub(crate) fn extract_score(record: &ResultRecord) -> Result<f32> {
    let additional = record.get(ADDITIONAL_KEY).and_then(Value::as_object);
    let raw = additional
        .and_then(|a| a.get("score").filter(|v| !v.is_null()))
        .or_else(|| additional.and_then(|a| a.get("distance").filter(|v| !v.is_null())));
    raw.and_then(as_score)
        .ok_or_else(|| WeaviateError::service("decode", "record has no score or distance"))
}

/// Hybrid scores arrive as strings, distances as numbers.
fn as_score(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|x| x as f32),
        Value::String(s) => s.parse::<f32>().ok(),
        _ => None,
    }
}
