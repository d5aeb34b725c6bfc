//! Write operations of [`WeaviateVectorStore`].

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::batch::ObjectBatch;
use crate::config::WeaviateConfig;
use crate::document::Metadata;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, WeaviateError};
use crate::service::{DataObject, IndexSchema, VectorDatabase};
use crate::store::WeaviateVectorStore;

/// Optional inputs of [`WeaviateVectorStore::add_texts_with_options`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AddTextsOptions<'a> {
    /// One metadata map per text.
    pub metadatas: Option<&'a [Metadata]>,
    /// One id per text; generated UUIDs are used when absent.
    pub ids: Option<&'a [String]>,
    /// Tenant partition to write into.
    pub tenant: Option<&'a str>,
}

impl WeaviateVectorStore {
    /// Embed (when a provider is configured) and insert `texts`, returning
    /// their ids in input order.
    ///
    /// Inserting an id that already exists replaces the stored object.
    ///
    /// # Errors
    ///
    /// Returns [`WeaviateError::InvalidArgument`] if `metadatas` or `ids` do
    /// not have one entry per text, and propagates embedding and service
    /// errors.
    pub async fn add_texts<S: AsRef<str>>(
        &self,
        texts: &[S],
        metadatas: Option<&[Metadata]>,
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        self.add_texts_with_options(texts, AddTextsOptions { metadatas, ids, tenant: None }).await
    }

    /// [`add_texts`](Self::add_texts) with a tenant.
    pub async fn add_texts_with_options<S: AsRef<str>>(
        &self,
        texts: &[S],
        options: AddTextsOptions<'_>,
    ) -> Result<Vec<String>> {
        check_len("metadatas", options.metadatas.map(<[_]>::len), texts.len())?;
        check_len("ids", options.ids.map(<[_]>::len), texts.len())?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = texts.iter().map(|t| t.as_ref()).collect();
        let embeddings = match &self.embedding {
            Some(provider) => {
                let embeddings = provider.embed_documents(&texts).await.map_err(|e| {
                    error!(
                        index = %self.config.index_name,
                        error = %e,
                        "embedding failed during ingestion"
                    );
                    e
                })?;
                if embeddings.len() != texts.len() {
                    return Err(WeaviateError::EmbeddingError {
                        provider: "embed_documents".to_string(),
                        message: format!(
                            "returned {} embeddings for {} texts",
                            embeddings.len(),
                            texts.len()
                        ),
                    });
                }
                Some(embeddings)
            }
            None => None,
        };

        let ids: Vec<String> = match options.ids {
            Some(ids) => ids.to_vec(),
            None => texts.iter().map(|_| Uuid::new_v4().to_string()).collect(),
        };
        let mut vectors = embeddings.map(Vec::into_iter);
        let mut objects = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let mut properties = Map::new();
            properties.insert(self.config.text_key.clone(), Value::String((*text).to_string()));
            if let Some(metadata) = options.metadatas.map(|m| &m[i]) {
                for (key, value) in metadata {
                    if key == &self.config.text_key {
                        warn!(key = %key, "metadata key shadows the text property, skipping");
                        continue;
                    }
                    properties.insert(key.clone(), value.to_json());
                }
            }

            objects.push(DataObject {
                id: ids[i].clone(),
                class: self.config.index_name.clone(),
                properties,
                vector: vectors.as_mut().and_then(Iterator::next),
                tenant: options.tenant.map(str::to_string),
            });
        }

        let inserted = ObjectBatch::run(
            self.service.as_ref(),
            self.config.batch_size,
            objects.into_iter().map(Ok),
        )
        .await?;

        info!(index = %self.config.index_name, count = inserted, "added texts");
        Ok(ids)
    }

    /// Create the index with the default single-text-property schema if it
    /// does not exist yet. Returns whether it was created.
    pub async fn ensure_index(&self) -> Result<bool> {
        if self.service.index_exists(&self.config.index_name).await? {
            return Ok(false);
        }
        let schema =
            IndexSchema::with_text_property(&self.config.index_name, &self.config.text_key);
        self.service.create_index(&schema).await?;
        info!(index = %self.config.index_name, "created index");
        Ok(true)
    }

    /// Build a store over `config.index_name`, creating the index if needed,
    /// and insert `texts`.
    ///
    /// The keys of the first metadata map are added to the returned
    /// attributes so later searches bring them back.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let store = WeaviateVectorStore::from_texts(
    ///     Arc::new(InMemoryVectorDatabase::new()),
    ///     &["first text", "second text"],
    ///     Some(Arc::new(my_embedder)),
    ///     None,
    ///     None,
    ///     WeaviateConfig::default(),
    /// )
    /// .await?;
    /// ```
    pub async fn from_texts<S: AsRef<str>>(
        service: Arc<dyn VectorDatabase>,
        texts: &[S],
        embedding: Option<Arc<dyn EmbeddingProvider>>,
        metadatas: Option<&[Metadata]>,
        ids: Option<&[String]>,
        mut config: WeaviateConfig,
    ) -> Result<Self> {
        if let Some(first) = metadatas.and_then(|m| m.first()) {
            let mut keys: Vec<&String> = first.keys().collect();
            keys.sort();
            for key in keys {
                if key != &config.text_key && !config.attributes.contains(key) {
                    config.attributes.push(key.clone());
                }
            }
        }

        let mut store = Self::new(service, config);
        if let Some(provider) = embedding {
            store = store.with_embedding(provider);
        }
        store.ensure_index().await?;
        store.add_texts(texts, metadatas, ids).await?;
        Ok(store)
    }

    /// Delete objects by id, one request per id, in order.
    ///
    /// # Errors
    ///
    /// Returns [`WeaviateError::NoIdsProvided`] for an empty slice without
    /// contacting the service. The first failing delete aborts the rest;
    /// earlier deletes are not rolled back.
    pub async fn delete<S: AsRef<str>>(&self, ids: &[S]) -> Result<()> {
        self.delete_with_tenant(ids, None).await
    }

    /// [`delete`](Self::delete) within a tenant partition.
    pub async fn delete_with_tenant<S: AsRef<str>>(
        &self,
        ids: &[S],
        tenant: Option<&str>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Err(WeaviateError::NoIdsProvided);
        }
        for id in ids {
            let id = id.as_ref();
            self.service.delete_by_id(&self.config.index_name, id, tenant).await.map_err(|e| {
                error!(index = %self.config.index_name, id, error = %e, "delete failed");
                e
            })?;
        }
        info!(index = %self.config.index_name, count = ids.len(), "deleted objects");
        Ok(())
    }
}

fn check_len(name: &str, len: Option<usize>, expected: usize) -> Result<()> {
    match len {
        Some(len) if len != expected => Err(WeaviateError::InvalidArgument(format!(
            "{name} has {len} entries for {expected} texts"
        ))),
        _ => Ok(()),
    }
}
