//! Query options and their translation into a [`QueryRequest`].
//!
//! Every recognised option is a field of [`QueryOptions`]. Options are checked
//! when a search runs: a request carries exactly one retrieval mode, and
//! combinations that would describe two different modes are rejected.

use serde_json::Value;

use crate::error::{Result, WeaviateError};
use crate::service::{FusionType, HybridSearch, QueryRequest, SearchMode};

/// Optional modifiers applied uniformly to every search operation.
///
/// # Example
///
/// ```rust
/// use adk_weaviate::{FusionType, QueryOptions};
/// use serde_json::json;
///
/// let options = QueryOptions::new()
///     .with_filter(json!({"path": ["source"], "operator": "Equal", "valueText": "wiki"}))
///     .with_tenant("tenant-a")
///     .with_hybrid_alpha(0.25)
///     .with_hybrid_fusion_type(FusionType::RelativeScore);
/// assert_eq!(options.tenant.as_deref(), Some("tenant-a"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Where-filter in the service's JSON filter shape.
    pub filter: Option<Value>,
    /// Tenant partition to search.
    pub tenant: Option<String>,
    /// Extra `_additional` fields to return, kept in document metadata.
    pub additional_fields: Vec<String>,
    /// Upper bound on the number of results requested from the service.
    pub limit: Option<usize>,
    /// Keyword query for a hybrid search.
    pub hybrid_query: Option<String>,
    /// Hybrid blend between keyword (`0.0`) and vector (`1.0`) ranking.
    pub hybrid_alpha: Option<f32>,
    /// Explicit vector for a hybrid search.
    pub hybrid_vector: Option<Vec<f32>>,
    /// Properties searched by the keyword half of a hybrid search.
    pub hybrid_properties: Vec<String>,
    /// Hybrid fusion strategy.
    pub hybrid_fusion_type: Option<FusionType>,
}

impl QueryOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict results with a where-filter.
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Search within one tenant.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// Return an extra `_additional` field (e.g. `id`, `distance`, `certainty`).
    pub fn with_additional_field(mut self, field: impl Into<String>) -> Self {
        self.additional_fields.push(field.into());
        self
    }

    /// Cap the number of results requested from the service.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the keyword query of a hybrid search.
    pub fn with_hybrid_query(mut self, query: impl Into<String>) -> Self {
        self.hybrid_query = Some(query.into());
        self
    }

    /// Set the hybrid blend coefficient.
    pub fn with_hybrid_alpha(mut self, alpha: f32) -> Self {
        self.hybrid_alpha = Some(alpha);
        self
    }

    /// Set an explicit vector for a hybrid search.
    pub fn with_hybrid_vector(mut self, vector: Vec<f32>) -> Self {
        self.hybrid_vector = Some(vector);
        self
    }

    /// Set the properties searched by the keyword half of a hybrid search.
    pub fn with_hybrid_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hybrid_properties = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Set the hybrid fusion strategy.
    pub fn with_hybrid_fusion_type(mut self, fusion_type: FusionType) -> Self {
        self.hybrid_fusion_type = Some(fusion_type);
        self
    }

    /// The number of results to request for a call that asked for `requested`.
    pub(crate) fn effective_limit(&self, requested: usize) -> usize {
        self.limit.map_or(requested, |limit| requested.min(limit))
    }

    /// Resolve the mode of a text search.
    ///
    /// With an embedding the text and its vector go out as one hybrid query.
    /// Without one the service vectorizes the text (near-text), unless hybrid
    /// options ask for a hybrid query instead.
    pub(crate) fn text_search_mode(
        &self,
        query: &str,
        embedding: Option<Vec<f32>>,
    ) -> Result<SearchMode> {
        self.validate_alpha()?;
        if let Some(hybrid_query) = &self.hybrid_query {
            if hybrid_query != query {
                return Err(WeaviateError::InvalidArgument(format!(
                    "hybrid_query '{hybrid_query}' conflicts with search text '{query}'"
                )));
            }
        }

        match embedding {
            Some(vector) => {
                if self.hybrid_vector.is_some() {
                    return Err(WeaviateError::InvalidArgument(
                        "hybrid_vector cannot be combined with an embedded text query".to_string(),
                    ));
                }
                Ok(SearchMode::Hybrid(self.hybrid(query, Some(vector))))
            }
            None if self.wants_hybrid() => {
                Ok(SearchMode::Hybrid(self.hybrid(query, self.hybrid_vector.clone())))
            }
            None => Ok(SearchMode::NearText(query.to_string())),
        }
    }

    /// Resolve the mode of a search driven by a caller-supplied vector.
    ///
    /// A `hybrid_query` turns it into a hybrid query that uses that vector.
    pub(crate) fn vector_search_mode(&self, embedding: &[f32]) -> Result<SearchMode> {
        self.validate_alpha()?;
        if self.hybrid_vector.is_some() {
            return Err(WeaviateError::InvalidArgument(
                "hybrid_vector cannot be combined with a vector search".to_string(),
            ));
        }

        match &self.hybrid_query {
            Some(query) => Ok(SearchMode::Hybrid(self.hybrid(query, Some(embedding.to_vec())))),
            None if self.has_keyword_tuning() => Err(WeaviateError::InvalidArgument(
                "hybrid_alpha, hybrid_properties and hybrid_fusion_type require hybrid_query"
                    .to_string(),
            )),
            None => Ok(SearchMode::NearVector(embedding.to_vec())),
        }
    }

    /// Assemble a request. `extra_additional` is merged into the caller's fields.
    pub(crate) fn request(
        &self,
        index: &str,
        properties: &[String],
        search: SearchMode,
        limit: usize,
        extra_additional: &[&str],
    ) -> QueryRequest {
        let mut additional = self.additional_fields.clone();
        for field in extra_additional {
            if !additional.iter().any(|f| f == field) {
                additional.push((*field).to_string());
            }
        }

        QueryRequest {
            index: index.to_string(),
            properties: properties.to_vec(),
            search,
            limit,
            filter: self.filter.clone(),
            tenant: self.tenant.clone(),
            additional,
        }
    }

    fn hybrid(&self, query: &str, vector: Option<Vec<f32>>) -> HybridSearch {
        HybridSearch {
            query: query.to_string(),
            alpha: self.hybrid_alpha,
            vector,
            properties: self.hybrid_properties.clone(),
            fusion_type: self.hybrid_fusion_type,
        }
    }

    fn has_keyword_tuning(&self) -> bool {
        self.hybrid_alpha.is_some()
            || !self.hybrid_properties.is_empty()
            || self.hybrid_fusion_type.is_some()
    }

    fn wants_hybrid(&self) -> bool {
        self.hybrid_query.is_some() || self.hybrid_vector.is_some() || self.has_keyword_tuning()
    }

    fn validate_alpha(&self) -> Result<()> {
        match self.hybrid_alpha {
            Some(alpha) if !(0.0..=1.0).contains(&alpha) => Err(WeaviateError::InvalidArgument(
                format!("hybrid_alpha must be within [0, 1], got {alpha}"),
            )),
            _ => Ok(()),
        }
    }
}
