//! # adk-weaviate
//!
//! A Weaviate-backed document store for ADK-Rust agents, with client-side
//! maximal marginal relevance (MMR) re-ranking.
//!
//! ## Overview
//!
//! - [`WeaviateVectorStore`] binds one index to an optional [`EmbeddingProvider`]
//!   and exposes similarity, scored, by-vector and MMR searches plus text
//!   ingestion and delete-by-id.
//! - [`VectorDatabase`] is the boundary to the service. [`InMemoryVectorDatabase`]
//!   implements it in-process; `http::WeaviateClient` (feature `http`) talks to
//!   a real instance.
//! - [`maximal_marginal_relevance`] is the selection algorithm on its own.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_weaviate::{InMemoryVectorDatabase, QueryOptions, WeaviateConfig, WeaviateVectorStore};
//!
//! let store = WeaviateVectorStore::from_texts(
//!     Arc::new(InMemoryVectorDatabase::new()),
//!     &["tokio is an async runtime", "serde serializes data"],
//!     Some(Arc::new(my_embedder)),
//!     None,
//!     None,
//!     WeaviateConfig::builder().index_name("Crates").build()?,
//! )
//! .await?;
//!
//! let docs = store
//!     .max_marginal_relevance_search("async", 1, 10, 0.5, &QueryOptions::new())
//!     .await?;
//! ```
//!
//! ## Features
//!
//! - `http`: enables `http::WeaviateClient` (uses `reqwest`).

pub mod batch;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod graphql;
pub mod inmemory;
pub mod ingestion;
pub mod math;
pub mod mmr;
pub mod query;
pub mod retrieval;
pub mod service;
pub mod store;

#[cfg(feature = "http")]
pub mod http;

pub use batch::ObjectBatch;
pub use config::{WeaviateConfig, WeaviateConfigBuilder};
pub use document::{Document, Metadata, MetadataValue};
pub use embedding::EmbeddingProvider;
pub use error::{Result, WeaviateError};
pub use inmemory::InMemoryVectorDatabase;
pub use ingestion::AddTextsOptions;
pub use math::{cosine_distance, cosine_similarity};
pub use mmr::maximal_marginal_relevance;
pub use query::QueryOptions;
pub use service::{
    DataObject, FusionType, HybridSearch, IndexSchema, PropertySchema, QueryRequest, ResultRecord,
    SearchMode, VectorDatabase,
};
pub use store::{RelevanceScoreFn, WeaviateVectorStore, default_relevance_score};
