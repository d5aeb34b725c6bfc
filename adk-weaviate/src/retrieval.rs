//! Search operations of [`WeaviateVectorStore`].

use tracing::{debug, info};

use crate::document::Document;
use crate::error::{Result, WeaviateError};
use crate::mmr::maximal_marginal_relevance;
use crate::query::QueryOptions;
use crate::service::{ResultRecord, SearchMode};
use crate::store::{WeaviateVectorStore, extract_score};

impl WeaviateVectorStore {
    /// Return the `k` documents most similar to `query`, in service order.
    ///
    /// # Errors
    ///
    /// Returns [`WeaviateError::EmbeddingRequired`] if no embedding provider is
    /// configured and `by_text` is disabled, [`WeaviateError::InvalidArgument`]
    /// for incoherent options, and any service error verbatim.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        let records = self.perform_search(query, k, options, false).await?;
        let docs = records
            .into_iter()
            .map(|record| self.decode(record, true))
            .collect::<Result<Vec<_>>>()?;
        info!(
            index = %self.config.index_name,
            result_count = docs.len(),
            "similarity search completed"
        );
        Ok(docs)
    }

    /// Like [`similarity_search`](Self::similarity_search), paired with the
    /// service's native score for each hit.
    ///
    /// The score is passed through unmodified: a `score` for hybrid queries, a
    /// cosine `distance` (lower is more similar) otherwise. The `_additional`
    /// object carrying it stays in the document metadata.
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        options: &QueryOptions,
    ) -> Result<Vec<(Document, f32)>> {
        let records = self.perform_search(query, k, options, true).await?;
        let scored = records
            .into_iter()
            .map(|record| {
                let score = extract_score(&record)?;
                Ok((self.decode(record, true)?, score))
            })
            .collect::<Result<Vec<_>>>()?;
        info!(
            index = %self.config.index_name,
            result_count = scored.len(),
            "scored search completed"
        );
        Ok(scored)
    }

    /// Like [`similarity_search_with_score`](Self::similarity_search_with_score),
    /// with each score mapped through the store's relevance function.
    pub async fn similarity_search_with_relevance_scores(
        &self,
        query: &str,
        k: usize,
        options: &QueryOptions,
    ) -> Result<Vec<(Document, f32)>> {
        let scored = self.similarity_search_with_score(query, k, options).await?;
        Ok(scored
            .into_iter()
            .map(|(doc, score)| (doc, (self.relevance_score_fn)(score)))
            .collect())
    }

    /// Return the `k` documents nearest to a caller-supplied vector.
    pub async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        let limit = options.effective_limit(k);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let search = options.vector_search_mode(embedding)?;
        let request = options.request(
            &self.config.index_name,
            &self.config.query_properties(),
            search,
            limit,
            &[],
        );
        let docs = self
            .execute(&request)
            .await?
            .into_iter()
            .map(|record| self.decode(record, true))
            .collect::<Result<Vec<_>>>()?;
        info!(
            index = %self.config.index_name,
            result_count = docs.len(),
            "vector search completed"
        );
        Ok(docs)
    }

    /// Embed `query` and select `k` of `fetch_k` candidates by maximal
    /// marginal relevance.
    ///
    /// `lambda_mult` runs from `0.0` (maximum diversity) to `1.0` (pure
    /// relevance).
    ///
    /// # Errors
    ///
    /// Returns [`WeaviateError::EmbeddingRequired`] if no embedding provider is
    /// configured.
    pub async fn max_marginal_relevance_search(
        &self,
        query: &str,
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        let provider = self.embedding.as_ref().ok_or_else(|| {
            WeaviateError::EmbeddingRequired(
                "max marginal relevance search requires an embedding provider".to_string(),
            )
        })?;
        let embedding = provider.embed_query(query).await?;
        self.max_marginal_relevance_search_by_vector(&embedding, k, fetch_k, lambda_mult, options)
            .await
    }

    /// Fetch `fetch_k` candidates with their vectors and select `k` of them by
    /// maximal marginal relevance, in selection order.
    ///
    /// Candidate vectors are removed from the returned metadata unless the
    /// caller listed `vector` in `additional_fields`.
    ///
    /// # Errors
    ///
    /// Returns [`WeaviateError::EmbeddingRequired`] if the service returns a
    /// candidate without its vector, [`WeaviateError::DimensionMismatch`] if a
    /// candidate vector's length differs from `embedding`'s, and
    /// [`WeaviateError::InvalidArgument`] if `lambda_mult` is outside `[0, 1]`.
    pub async fn max_marginal_relevance_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
        fetch_k: usize,
        lambda_mult: f32,
        options: &QueryOptions,
    ) -> Result<Vec<Document>> {
        if !(0.0..=1.0).contains(&lambda_mult) {
            return Err(WeaviateError::InvalidArgument(format!(
                "lambda_mult must be within [0, 1], got {lambda_mult}"
            )));
        }
        let limit = options.effective_limit(fetch_k);
        if k == 0 || limit == 0 {
            return Ok(Vec::new());
        }

        let search = options.vector_search_mode(embedding)?;
        let score_field = match &search {
            SearchMode::Hybrid(_) => "score",
            _ => "distance",
        };
        let request = options.request(
            &self.config.index_name,
            &self.config.query_properties(),
            search,
            limit,
            &["vector", score_field],
        );
        let candidates = self
            .execute(&request)
            .await?
            .into_iter()
            .map(|record| self.decode_candidate(record, &options.additional_fields))
            .collect::<Result<Vec<_>>>()?;

        let top_similarity =
            candidates.iter().filter_map(|c| c.similarity_score).reduce(f32::max);
        debug!(
            index = %self.config.index_name,
            candidates = candidates.len(),
            top_similarity = ?top_similarity,
            "fetched mmr candidates"
        );

        let (documents, vectors): (Vec<Document>, Vec<Vec<f32>>) =
            candidates.into_iter().map(|c| (c.document, c.embedding)).unzip();
        let selected = maximal_marginal_relevance(embedding, &vectors, k, lambda_mult)?;

        let mut documents: Vec<Option<Document>> = documents.into_iter().map(Some).collect();
        let docs: Vec<Document> =
            selected.into_iter().filter_map(|i| documents[i].take()).collect();
        info!(
            index = %self.config.index_name,
            candidates = documents.len(),
            result_count = docs.len(),
            lambda_mult,
            "mmr search completed"
        );
        Ok(docs)
    }

    /// Embed (or hand to the service) a text query and run it.
    ///
    /// With `with_score`, the native score field for the resolved mode is
    /// requested as well.
    async fn perform_search(
        &self,
        query: &str,
        k: usize,
        options: &QueryOptions,
        with_score: bool,
    ) -> Result<Vec<ResultRecord>> {
        let limit = options.effective_limit(k);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let embedding = match &self.embedding {
            Some(provider) => Some(provider.embed_query(query).await?),
            None if self.config.by_text => None,
            None => {
                return Err(WeaviateError::EmbeddingRequired(
                    "text search requires an embedding provider or by_text mode".to_string(),
                ));
            }
        };
        let search = options.text_search_mode(query, embedding)?;
        let score_field: &[&str] = match (&search, with_score) {
            (_, false) => &[],
            (SearchMode::Hybrid(_), true) => &["score"],
            (_, true) => &["distance"],
        };
        let request = options.request(
            &self.config.index_name,
            &self.config.query_properties(),
            search,
            limit,
            score_field,
        );
        self.execute(&request).await
    }
}
