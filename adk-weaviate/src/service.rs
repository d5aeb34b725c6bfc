//! Boundary to the external vector database.
//!
//! [`VectorDatabase`] is everything the store needs from the service: schema
//! existence/creation, batched object insertion, nearest-neighbour queries and
//! delete-by-id. [`InMemoryVectorDatabase`](crate::InMemoryVectorDatabase) and,
//! with the `http` feature, `WeaviateClient` implement it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Key of the object holding service-computed fields in a result record.
pub const ADDITIONAL_KEY: &str = "_additional";

/// One record returned by a query: requested properties plus `_additional`.
pub type ResultRecord = Map<String, Value>;

/// Schema of an index (a Weaviate class).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexSchema {
    /// The class name.
    pub class: String,
    /// Declared properties.
    pub properties: Vec<PropertySchema>,
}

impl IndexSchema {
    /// The minimal schema: a single text property named `text_key`.
    pub fn with_text_property(class: impl Into<String>, text_key: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            properties: vec![PropertySchema {
                name: text_key.into(),
                data_type: vec!["text".to_string()],
            }],
        }
    }
}

/// A declared property of an [`IndexSchema`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchema {
    /// Property name.
    pub name: String,
    /// Service data type names, e.g. `["text"]`.
    pub data_type: Vec<String>,
}

/// An object to insert. Inserting an existing `id` replaces the stored object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataObject {
    /// UUID of the object.
    pub id: String,
    /// Target index.
    pub class: String,
    /// Property map, including the text property.
    pub properties: Map<String, Value>,
    /// Vector to store; `None` lets the service vectorize the object itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Tenant partition for multi-tenant indexes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// Score fusion strategy for hybrid queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FusionType {
    /// Reciprocal-rank based fusion.
    #[default]
    #[serde(rename = "rankedFusion")]
    Ranked,
    /// Fusion of min-max normalised scores.
    #[serde(rename = "relativeScoreFusion")]
    RelativeScore,
}

impl FusionType {
    /// The service's name for this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ranked => "rankedFusion",
            Self::RelativeScore => "relativeScoreFusion",
        }
    }
}

/// Parameters of a hybrid (vector + keyword) query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HybridSearch {
    /// Keyword query text.
    pub query: String,
    /// Blend between keyword (`0.0`) and vector (`1.0`) ranking.
    pub alpha: Option<f32>,
    /// Vector for the vector half; `None` lets the service vectorize `query`.
    pub vector: Option<Vec<f32>>,
    /// Properties searched by the keyword half; empty means all text properties.
    pub properties: Vec<String>,
    /// Fusion strategy; `None` uses the service default.
    pub fusion_type: Option<FusionType>,
}

/// The single retrieval mode of a [`QueryRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum SearchMode {
    /// Nearest neighbours of a caller-supplied vector.
    NearVector(Vec<f32>),
    /// Nearest neighbours of text vectorized by the service.
    NearText(String),
    /// Weighted fusion of vector and keyword relevance.
    Hybrid(HybridSearch),
}

/// A fully assembled query against one index.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Index to search.
    pub index: String,
    /// Properties to return for each hit.
    pub properties: Vec<String>,
    /// Retrieval mode.
    pub search: SearchMode,
    /// Maximum number of results.
    pub limit: usize,
    /// Where-filter in the service's JSON filter shape, passed through as is.
    pub filter: Option<Value>,
    /// Tenant partition to search.
    pub tenant: Option<String>,
    /// Names of `_additional` fields to return (`id`, `vector`, `score`, ...).
    pub additional: Vec<String>,
}

/// A storage backend reachable over the network (or a stand-in for one).
///
/// Implementations must be safe to call from many tasks at once; ordering
/// across concurrent calls is whatever the service provides.
#[async_trait]
pub trait VectorDatabase: Send + Sync {
    /// Whether an index with this name exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Create an index from a schema.
    async fn create_index(&self, schema: &IndexSchema) -> Result<()>;

    /// Insert a batch of objects in one round trip (upsert by id).
    async fn insert_objects(&self, objects: &[DataObject]) -> Result<()>;

    /// Run a query and return records in the service's ranking order.
    async fn query(&self, request: &QueryRequest) -> Result<Vec<ResultRecord>>;

    /// Delete one object by id.
    async fn delete_by_id(&self, index: &str, id: &str, tenant: Option<&str>) -> Result<()>;
}
