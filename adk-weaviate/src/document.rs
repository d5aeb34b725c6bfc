//! Data types for documents, metadata, and retrieval candidates.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A retrieved document: the stored text plus every other returned property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The text content of the document.
    pub content: String,
    /// Remaining properties returned by the service.
    pub metadata: HashMap<String, Value>,
}

impl Document {
    /// Create a document with the given content and metadata.
    pub fn new(content: impl Into<String>, metadata: HashMap<String, Value>) -> Self {
        Self { content: content.into(), metadata }
    }
}

/// A metadata value supplied by the caller at ingestion time.
///
/// Timestamps are kept typed until they are written, where they become
/// ISO-8601 strings. Everything else is already JSON and passes through.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// Any JSON-compatible value.
    Json(Value),
    /// A timestamp without an offset, written as `YYYY-MM-DDTHH:MM:SS[.fff]`.
    Naive(NaiveDateTime),
    /// A UTC timestamp, written in RFC 3339 form with a `+00:00` offset.
    Utc(DateTime<Utc>),
}

impl MetadataValue {
    /// Serialize this value into the JSON stored as an object property.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Naive(ts) => Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Self::Utc(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        }
    }
}

impl From<Value> for MetadataValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<NaiveDateTime> for MetadataValue {
    fn from(ts: NaiveDateTime) -> Self {
        Self::Naive(ts)
    }
}

impl From<DateTime<Utc>> for MetadataValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Utc(ts)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Json(Value::String(s.to_string()))
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Json(Value::String(s))
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        Self::Json(Value::from(n))
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        Self::Json(Value::from(n))
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Json(Value::Bool(b))
    }
}

/// Caller-side metadata for one text.
pub type Metadata = HashMap<String, MetadataValue>;

/// A retrieved [`Document`] together with the vector MMR needs.
///
/// Lives only for the duration of one retrieval call.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub document: Document,
    pub embedding: Vec<f32>,
    /// Query similarity as reported by the service: the hybrid `score`, or
    /// `1 - distance` for vector queries. `None` when neither came back.
    pub similarity_score: Option<f32>,
}
