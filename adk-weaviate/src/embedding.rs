//! The seam between the store and whatever turns text into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// Embeds queries at search time and documents at ingestion time.
///
/// Queries and documents are separate calls because some models embed them
/// differently. [`embed_documents`](EmbeddingProvider::embed_documents) falls
/// back to one [`embed_query`](EmbeddingProvider::embed_query) call per text.
///
/// # Example
///
/// ```rust,ignore
/// use adk_weaviate::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let vectors = provider.embed_documents(&["first", "second"]).await?;
/// let query = provider.embed_query("hello world").await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of documents, in input order.
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed_query(text).await?);
        }
        Ok(results)
    }
}
