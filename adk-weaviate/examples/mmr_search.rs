//! # MMR Search Example
//!
//! Ingests a handful of near-duplicate snippets, then compares a plain
//! similarity search with a maximal marginal relevance search over the same
//! query.
//!
//! Uses `InMemoryVectorDatabase` and a deterministic `MockEmbeddingProvider`
//! so it runs with **zero API keys**. Set `WEAVIATE_URL` and enable the
//! `http` feature to run it against a live instance instead.
//!
//! Run: `cargo run -p adk-weaviate --example mmr_search`

use std::sync::Arc;

use adk_weaviate::{
    EmbeddingProvider, InMemoryVectorDatabase, Metadata, MetadataValue, QueryOptions,
    VectorDatabase, WeaviateConfig, WeaviateVectorStore,
};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: bag-of-words embeddings over a tiny vocabulary
// ---------------------------------------------------------------------------

const VOCABULARY: &[&str] =
    &["rust", "memory", "safety", "ownership", "async", "runtime", "tokio", "serde", "json"];

struct MockEmbeddingProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_query(&self, text: &str) -> adk_weaviate::Result<Vec<f32>> {
        let text = text.to_lowercase();
        // One dimension per vocabulary word plus a bias so no vector is zero.
        let mut emb: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| {
                text.split_whitespace().filter(|w| w.trim_matches(',') == *word).count() as f32
            })
            .collect();
        emb.push(0.1);
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        emb.iter_mut().for_each(|x| *x /= norm);
        Ok(emb)
    }
}

fn service() -> anyhow::Result<Arc<dyn VectorDatabase>> {
    #[cfg(feature = "http")]
    {
        if std::env::var("WEAVIATE_URL").is_ok() {
            return Ok(Arc::new(adk_weaviate::http::WeaviateClient::from_env()?));
        }
    }
    Ok(Arc::new(InMemoryVectorDatabase::new()))
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    // -- 1. Ingest ---------------------------------------------------------
    // Three snippets say nearly the same thing about memory safety; the
    // others cover different topics.
    let texts = [
        "rust memory safety through ownership",
        "rust ownership gives memory safety",
        "memory safety in rust comes from ownership",
        "tokio is an async runtime for rust",
        "serde turns rust structs into json",
    ];
    let metadatas: Vec<Metadata> = ["book", "blog", "forum", "docs", "docs"]
        .iter()
        .map(|source| Metadata::from([("source".to_string(), MetadataValue::from(*source))]))
        .collect();

    let config = WeaviateConfig::builder().index_name("RustSnippets").build()?;
    let store = WeaviateVectorStore::from_texts(
        service()?,
        &texts,
        Some(Arc::new(MockEmbeddingProvider)),
        Some(&metadatas),
        None,
        config,
    )
    .await?;
    println!("Ingested {} snippets into {}", texts.len(), store.index_name());

    // -- 2. Compare plain and diversified retrieval ------------------------
    let query = "rust memory safety";
    let options = QueryOptions::new();

    println!("\nSimilarity search: \"{query}\"");
    for (i, (doc, score)) in
        store.similarity_search_with_score(query, 3, &options).await?.iter().enumerate()
    {
        println!("  {}. [score={score:.4}] {} ({})", i + 1, doc.content, doc.metadata["source"]);
    }

    // lambda_mult=0.25 leans towards diversity; fetch_k=5 considers the whole pool.
    println!("\nMMR search: \"{query}\"");
    for (i, doc) in
        store.max_marginal_relevance_search(query, 3, 5, 0.25, &options).await?.iter().enumerate()
    {
        println!("  {}. {} ({})", i + 1, doc.content, doc.metadata["source"]);
    }

    println!("\nDone.");
    Ok(())
}
