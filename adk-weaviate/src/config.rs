//! Configuration for a [`WeaviateVectorStore`](crate::WeaviateVectorStore).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WeaviateError};

/// The default property holding document text.
pub const DEFAULT_TEXT_KEY: &str = "text";

/// Configuration parameters for a vector store handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeaviateConfig {
    /// Name of the index (Weaviate class) backing the store.
    pub index_name: String,
    /// Property that holds the document text.
    pub text_key: String,
    /// Extra properties returned with every hit.
    pub attributes: Vec<String>,
    /// Allow text searches without an embedder by letting the service vectorize.
    pub by_text: bool,
    /// Flush inserts every `batch_size` objects; `None` sends one batch per call.
    pub batch_size: Option<usize>,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            index_name: generated_index_name(),
            text_key: DEFAULT_TEXT_KEY.to_string(),
            attributes: Vec::new(),
            by_text: true,
            batch_size: None,
        }
    }
}

impl WeaviateConfig {
    /// Create a new builder for constructing a [`WeaviateConfig`].
    pub fn builder() -> WeaviateConfigBuilder {
        WeaviateConfigBuilder::default()
    }

    /// Properties requested for every hit: the text key, then the attributes.
    pub fn query_properties(&self) -> Vec<String> {
        let mut properties = vec![self.text_key.clone()];
        for attribute in &self.attributes {
            if !properties.contains(attribute) {
                properties.push(attribute.clone());
            }
        }
        properties
    }
}

/// A fresh, valid index name of the form `Adk_<uuid>`.
pub fn generated_index_name() -> String {
    format!("Adk_{}", Uuid::new_v4().simple())
}

/// Builder for constructing a validated [`WeaviateConfig`].
#[derive(Debug, Clone, Default)]
pub struct WeaviateConfigBuilder {
    config: WeaviateConfig,
}

impl WeaviateConfigBuilder {
    /// Set the index name.
    pub fn index_name(mut self, name: impl Into<String>) -> Self {
        self.config.index_name = name.into();
        self
    }

    /// Set the property that holds document text.
    pub fn text_key(mut self, key: impl Into<String>) -> Self {
        self.config.text_key = key.into();
        self
    }

    /// Replace the extra properties returned with every hit.
    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Add one extra property returned with every hit.
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.config.attributes.push(attribute.into());
        self
    }

    /// Enable or disable service-side vectorization of text queries.
    pub fn by_text(mut self, by_text: bool) -> Self {
        self.config.by_text = by_text;
        self
    }

    /// Set the insertion batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = Some(size);
        self
    }

    /// Build the [`WeaviateConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`WeaviateError::InvalidConfiguration`] if:
    /// - `index_name` is not a valid class name (`[A-Z][_0-9A-Za-z]*`)
    /// - `text_key` is empty or starts with `_`
    /// - `batch_size == 0`
    pub fn build(self) -> Result<WeaviateConfig> {
        validate_index_name(&self.config.index_name)?;
        if self.config.text_key.is_empty() || self.config.text_key.starts_with('_') {
            return Err(WeaviateError::InvalidConfiguration(format!(
                "text_key '{}' must be non-empty and must not start with '_'",
                self.config.text_key
            )));
        }
        if self.config.batch_size == Some(0) {
            return Err(WeaviateError::InvalidConfiguration(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}

fn validate_index_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(WeaviateError::InvalidConfiguration(format!(
            "index_name '{name}' must match [A-Z][_0-9A-Za-z]*"
        )))
    }
}
