//! Weaviate REST/GraphQL client.
//!
//! This module is only available when the `http` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{Result, WeaviateError};
use crate::graphql::{parse_get_response, render_query};
use crate::service::{DataObject, IndexSchema, QueryRequest, ResultRecord, VectorDatabase};

/// A [`VectorDatabase`] talking to a Weaviate instance over HTTP.
///
/// # Configuration
///
/// - `url` – base URL of the instance, e.g. `http://localhost:8080`.
/// - `api_key` – optional bearer token, from the constructor or `WEAVIATE_API_KEY`.
///
/// # Example
///
/// ```rust,ignore
/// use adk_weaviate::http::WeaviateClient;
///
/// let client = WeaviateClient::new("http://localhost:8080")?.with_api_key("secret");
/// let store = WeaviateVectorStore::new(Arc::new(client), config);
/// ```
#[derive(Debug, Clone)]
pub struct WeaviateClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WeaviateClient {
    /// Create a client for the instance at `url`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::from_client(reqwest::Client::new(), url)
    }

    /// Create a client from `WEAVIATE_URL` and, if set, `WEAVIATE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("WEAVIATE_URL").map_err(|_| {
            WeaviateError::InvalidConfiguration(
                "WEAVIATE_URL environment variable not set".to_string(),
            )
        })?;
        let client = Self::new(url)?;
        Ok(match std::env::var("WEAVIATE_API_KEY") {
            Ok(key) if !key.is_empty() => client.with_api_key(key),
            _ => client,
        })
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn from_client(client: reqwest::Client, url: impl Into<String>) -> Result<Self> {
        let base_url = url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(WeaviateError::InvalidConfiguration("url must not be empty".to_string()));
        }
        Ok(Self { client, base_url, api_key: None })
    }

    /// Authenticate requests with a bearer API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Apply a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            WeaviateError::InvalidConfiguration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(self)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> Result<Response> {
        builder.send().await.map_err(|e| {
            error!(operation, error = %e, "request failed");
            WeaviateError::service(operation, format!("request failed: {e}"))
        })
    }

    async fn check(response: Response, operation: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.error.into_iter().next())
            .map(|e| e.message)
            .unwrap_or(body);
        error!(operation, %status, "API error");
        Err(WeaviateError::service(operation, format!("API returned {status}: {detail}")))
    }

    async fn json<T: for<'de> Deserialize<'de>>(response: Response, operation: &str) -> Result<T> {
        response.json().await.map_err(|e| {
            error!(operation, error = %e, "failed to parse response");
            WeaviateError::service(operation, format!("failed to parse response: {e}"))
        })
    }
}

// ── Weaviate API request/response types ───────────────────────────

#[derive(Serialize)]
struct BatchRequest<'a> {
    objects: &'a [DataObject],
}

#[derive(Deserialize)]
struct BatchObjectResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    result: Option<BatchResultDetail>,
}

#[derive(Deserialize)]
struct BatchResultDetail {
    #[serde(default)]
    errors: Option<ErrorList>,
}

#[derive(Deserialize)]
struct ErrorList {
    #[serde(default)]
    error: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Serialize)]
struct GraphQlRequest {
    query: String,
}

// ── VectorDatabase implementation ─────────────────────────────────

#[async_trait]
impl VectorDatabase for WeaviateClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let builder = self.request(Method::GET, &format!("/v1/schema/{index}"));
        let response = self.send(builder, "index_exists").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response, "index_exists").await?;
        Ok(true)
    }

    async fn create_index(&self, schema: &IndexSchema) -> Result<()> {
        let response =
            self.send(self.request(Method::POST, "/v1/schema").json(schema), "create_index").await?;
        Self::check(response, "create_index").await?;
        debug!(index = %schema.class, "created weaviate class");
        Ok(())
    }

    async fn insert_objects(&self, objects: &[DataObject]) -> Result<()> {
        if objects.is_empty() {
            return Ok(());
        }
        let builder =
            self.request(Method::POST, "/v1/batch/objects").json(&BatchRequest { objects });
        let response = self.send(builder, "insert_objects").await?;
        let response = Self::check(response, "insert_objects").await?;
        let results: Vec<BatchObjectResult> = Self::json(response, "insert_objects").await?;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|r| {
                let messages: Vec<String> = r
                    .result
                    .and_then(|d| d.errors)
                    .map(|e| e.error.into_iter().map(|e| e.message).collect())
                    .unwrap_or_default();
                if messages.is_empty() {
                    None
                } else {
                    Some(format!("{}: {}", r.id.unwrap_or_default(), messages.join("; ")))
                }
            })
            .collect();
        if !failures.is_empty() {
            error!(failed = failures.len(), "batch insertion reported object errors");
            return Err(WeaviateError::service("insert_objects", failures.join(", ")));
        }
        debug!(count = objects.len(), "inserted objects");
        Ok(())
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<ResultRecord>> {
        let query = render_query(request);
        debug!(index = %request.index, query_len = query.len(), "graphql query");
        let builder = self.request(Method::POST, "/v1/graphql").json(&GraphQlRequest { query });
        let response = Self::check(self.send(builder, "query").await?, "query").await?;
        let body: Value = Self::json(response, "query").await?;
        parse_get_response(&request.index, body)
    }

    async fn delete_by_id(&self, index: &str, id: &str, tenant: Option<&str>) -> Result<()> {
        let mut builder = self.request(Method::DELETE, &format!("/v1/objects/{index}/{id}"));
        if let Some(tenant) = tenant {
            builder = builder.query(&[("tenant", tenant)]);
        }
        let response = self.send(builder, "delete_by_id").await?;
        Self::check(response, "delete_by_id").await?;
        debug!(index, id, "deleted object");
        Ok(())
    }
}
