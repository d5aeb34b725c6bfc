//! In-process stand-in for the vector database service.
//!
//! [`InMemoryVectorDatabase`] keeps indexes in a `HashMap` behind a
//! `tokio::sync::RwLock` and answers queries the way the service does: cosine
//! distance for near-vector queries, a blended score for hybrid queries, tenant
//! partitions and a subset of the where-filter operators. It has no vectorizer,
//! so near-text queries and hybrid queries without a vector fail. It is meant
//! for development and tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, WeaviateError};
use crate::math::{cosine_distance, cosine_similarity};
use crate::service::{
    ADDITIONAL_KEY, DataObject, HybridSearch, IndexSchema, QueryRequest, ResultRecord, SearchMode,
    VectorDatabase,
};

/// Hybrid blend used when a query does not set one.
const DEFAULT_ALPHA: f32 = 0.75;

#[derive(Debug, Clone)]
struct StoredObject {
    id: String,
    properties: Map<String, Value>,
    vector: Option<Vec<f32>>,
    tenant: Option<String>,
}

#[derive(Debug, Default)]
struct Index {
    // Insertion order, so equal scores rank stably.
    objects: Vec<StoredObject>,
}

/// Where a hit's rank came from.
#[derive(Debug, Clone, Copy)]
enum Rank {
    Distance(f32),
    Score(f32),
}

/// An in-memory [`VectorDatabase`].
///
/// # Example
///
/// ```rust,ignore
/// use adk_weaviate::{IndexSchema, InMemoryVectorDatabase, VectorDatabase};
///
/// let db = InMemoryVectorDatabase::new();
/// db.create_index(&IndexSchema::with_text_property("Docs", "text")).await?;
/// assert!(db.index_exists("Docs").await?);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorDatabase {
    indexes: RwLock<HashMap<String, Index>>,
    insert_calls: AtomicUsize,
    query_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryVectorDatabase {
    /// Create a new empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects stored in `index` across all tenants.
    pub async fn object_count(&self, index: &str) -> usize {
        self.indexes.read().await.get(index).map_or(0, |i| i.objects.len())
    }

    /// Number of `insert_objects` calls served so far.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of `query` calls served so far.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of `delete_by_id` calls served so far.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(AtomicOrdering::SeqCst)
    }

    fn missing_index(operation: &str, index: &str) -> WeaviateError {
        WeaviateError::service(operation, format!("class '{index}' does not exist"))
    }
}

#[async_trait]
impl VectorDatabase for InMemoryVectorDatabase {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.indexes.read().await.contains_key(index))
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(&schema.class) {
            return Err(WeaviateError::service(
                "create_index",
                format!("class '{}' already exists", schema.class),
            ));
        }
        indexes.insert(schema.class.clone(), Index::default());
        debug!(index = %schema.class, "created in-memory index");
        Ok(())
    }

    async fn insert_objects(&self, objects: &[DataObject]) -> Result<()> {
        self.insert_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut indexes = self.indexes.write().await;
        for object in objects {
            let index = indexes
                .get_mut(&object.class)
                .ok_or_else(|| Self::missing_index("insert_objects", &object.class))?;
            let stored = StoredObject {
                id: object.id.clone(),
                properties: object.properties.clone(),
                vector: object.vector.clone(),
                tenant: object.tenant.clone(),
            };
            match index
                .objects
                .iter_mut()
                .find(|existing| existing.id == object.id && existing.tenant == object.tenant)
            {
                Some(existing) => *existing = stored,
                None => index.objects.push(stored),
            }
        }
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ResultRecord>> {
        self.query_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let indexes = self.indexes.read().await;
        let index = indexes
            .get(&request.index)
            .ok_or_else(|| Self::missing_index("query", &request.index))?;

        let mut hits: Vec<(&StoredObject, Rank)> = Vec::new();
        for object in &index.objects {
            if object.tenant != request.tenant {
                continue;
            }
            if let Some(filter) = &request.filter {
                if !matches_filter(filter, &object.properties)? {
                    continue;
                }
            }
            if let Some(rank) = rank_object(object, &request.search)? {
                hits.push((object, rank));
            }
        }

        hits.sort_by(|(_, a), (_, b)| match (a, b) {
            (Rank::Distance(a), Rank::Distance(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Rank::Score(a), Rank::Score(b)) => b.partial_cmp(a).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        });
        hits.truncate(request.limit);

        debug!(index = %request.index, hits = hits.len(), "in-memory query");
        Ok(hits.into_iter().map(|(object, rank)| record(object, rank, request)).collect())
    }

    async fn delete_by_id(&self, index: &str, id: &str, tenant: Option<&str>) -> Result<()> {
        self.delete_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut indexes = self.indexes.write().await;
        let stored =
            indexes.get_mut(index).ok_or_else(|| Self::missing_index("delete_by_id", index))?;
        let before = stored.objects.len();
        stored.objects.retain(|o| !(o.id == id && o.tenant.as_deref() == tenant));
        if stored.objects.len() == before {
            return Err(WeaviateError::service(
                "delete_by_id",
                format!("object '{id}' not found in class '{index}'"),
            ));
        }
        Ok(())
    }
}

fn rank_object(object: &StoredObject, search: &SearchMode) -> Result<Option<Rank>> {
    match search {
        SearchMode::NearVector(query) => {
            let Some(vector) = &object.vector else {
                return Ok(None);
            };
            let distance = cosine_distance(query, vector).map_err(service_math_error)?;
            Ok(Some(Rank::Distance(distance)))
        }
        SearchMode::NearText(_) => Err(WeaviateError::service(
            "query",
            "nearText requires a vectorizer module, none is configured",
        )),
        SearchMode::Hybrid(hybrid) => hybrid_score(object, hybrid).map(|s| s.map(Rank::Score)),
    }
}

fn hybrid_score(object: &StoredObject, hybrid: &HybridSearch) -> Result<Option<f32>> {
    let Some(query_vector) = &hybrid.vector else {
        return Err(WeaviateError::service(
            "query",
            "hybrid search without a vector requires a vectorizer module, none is configured",
        ));
    };
    let Some(vector) = &object.vector else {
        return Ok(None);
    };
    let vector_score = cosine_similarity(query_vector, vector).map_err(service_math_error)?;
    let alpha = hybrid.alpha.unwrap_or(DEFAULT_ALPHA);
    Ok(Some(alpha * vector_score + (1.0 - alpha) * keyword_score(object, hybrid)))
}

/// Fraction of query terms present in the searched text properties.
fn keyword_score(object: &StoredObject, hybrid: &HybridSearch) -> f32 {
    let terms: Vec<String> = hybrid.query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return 0.0;
    }
    let haystack: String = object
        .properties
        .iter()
        .filter(|(name, _)| hybrid.properties.is_empty() || hybrid.properties.contains(name))
        .filter_map(|(_, value)| value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let words: Vec<&str> = haystack.split_whitespace().collect();
    let found = terms.iter().filter(|term| words.contains(&term.as_str())).count();
    found as f32 / terms.len() as f32
}

fn service_math_error(e: WeaviateError) -> WeaviateError {
    WeaviateError::service("query", e.to_string())
}

fn record(object: &StoredObject, rank: Rank, request: &QueryRequest) -> ResultRecord {
    let mut record = Map::new();
    for property in &request.properties {
        let value = object.properties.get(property).cloned().unwrap_or(Value::Null);
        record.insert(property.clone(), value);
    }

    if !request.additional.is_empty() {
        let mut additional = Map::new();
        for field in &request.additional {
            let value = match (field.as_str(), rank) {
                ("id", _) => Value::String(object.id.clone()),
                ("vector", _) => {
                    object.vector.as_ref().map_or(Value::Null, |v| Value::from(v.clone()))
                }
                ("distance", Rank::Distance(d)) => Value::from(d),
                ("certainty", Rank::Distance(d)) => Value::from(1.0 - d / 2.0),
                // The service reports hybrid scores as strings.
                ("score", Rank::Score(s)) => Value::String(s.to_string()),
                _ => Value::Null,
            };
            additional.insert(field.clone(), value);
        }
        record.insert(ADDITIONAL_KEY.to_string(), Value::Object(additional));
    }
    record
}

/// Evaluate a where-filter against an object's properties.
///
/// Supports `And`, `Or`, `Equal`, `NotEqual`, `GreaterThan`,
/// `GreaterThanEqual`, `LessThan` and `LessThanEqual` on single-element paths.
fn matches_filter(filter: &Value, properties: &Map<String, Value>) -> Result<bool> {
    let operator = filter.get("operator").and_then(Value::as_str).ok_or_else(|| {
        WeaviateError::service("query", format!("filter without operator: {filter}"))
    })?;

    if operator == "And" || operator == "Or" {
        let operands = filter.get("operands").and_then(Value::as_array).ok_or_else(|| {
            WeaviateError::service("query", format!("{operator} filter without operands"))
        })?;
        let mut results = Vec::with_capacity(operands.len());
        for operand in operands {
            results.push(matches_filter(operand, properties)?);
        }
        return Ok(if operator == "And" {
            results.iter().all(|r| *r)
        } else {
            results.iter().any(|r| *r)
        });
    }

    let path = filter
        .get("path")
        .and_then(Value::as_array)
        .and_then(|p| p.first())
        .and_then(Value::as_str)
        .ok_or_else(|| WeaviateError::service("query", format!("filter without path: {filter}")))?;
    let expected = [
        "valueText",
        "valueString",
        "valueInt",
        "valueNumber",
        "valueBoolean",
        "valueDate",
    ]
    .iter()
    .find_map(|key| filter.get(*key))
    .ok_or_else(|| WeaviateError::service("query", format!("filter without value: {filter}")))?;
    let actual = properties.get(path).unwrap_or(&Value::Null);

    let ordering = compare(actual, expected);
    let matched = match operator {
        "Equal" => ordering == Some(Ordering::Equal),
        "NotEqual" => ordering != Some(Ordering::Equal),
        "GreaterThan" => ordering == Some(Ordering::Greater),
        "GreaterThanEqual" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        "LessThan" => ordering == Some(Ordering::Less),
        "LessThanEqual" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        other => {
            return Err(WeaviateError::service(
                "query",
                format!("unsupported filter operator '{other}'"),
            ));
        }
    };
    Ok(matched)
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
