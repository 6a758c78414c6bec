use crate::error::{ApiError, Result};
use crate::ml::Embedding;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const API_VERSION: &str = "2024-07";

/// One hit from a similarity query.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Nearest-neighbour lookup over the product index.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Up to `top_k` matches, best first. No matches is an empty vec, not an error.
    async fn query(&self, vector: &Embedding, top_k: usize) -> Result<Vec<QueryMatch>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub dimension: usize,
    #[serde(default)]
    pub total_vector_count: usize,
    #[serde(default)]
    pub namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    pub vector_count: usize,
}

#[derive(Debug, Clone)]
pub struct PineconeClient {
    client: Client,
    index_name: String,
    base_url: String,
}

impl PineconeClient {
    /// Client for an index whose data-plane host is already known.
    pub fn with_host(api_key: &str, index_name: &str, host: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| ApiError::InvalidInput("Pinecone API key is not a valid header".into()))?;
        headers.insert("Api-Key", key);
        headers.insert("X-Pinecone-API-Version", HeaderValue::from_static(API_VERSION));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            index_name: index_name.to_string(),
            base_url: data_plane_url(host),
        })
    }

    /// Resolve the index host through the control plane and verify the
    /// connection with a stats call.
    pub async fn connect(
        api_key: &str,
        index_name: &str,
        control_plane_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let control = Self::with_host(api_key, index_name, control_plane_url, timeout)?;

        let response = control
            .client
            .get(format!("{}/indexes/{}", control.base_url, index_name))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Pinecone describe index '{}' failed ({}): {}",
                index_name, status, error_text
            )));
        }

        let description: IndexDescription = response.json().await?;
        debug!("Resolved Pinecone index {} to host {}", index_name, description.host);

        let client = Self {
            client: control.client,
            index_name: index_name.to_string(),
            base_url: data_plane_url(&description.host),
        };

        let stats = client.describe_index_stats().await?;
        info!(
            "Connected to Pinecone index {} (vectors: {}, dimension: {})",
            client.index_name, stats.total_vector_count, stats.dimension
        );

        Ok(client)
    }

    pub async fn describe_index_stats(&self) -> Result<IndexStats> {
        let response = self
            .client
            .post(format!("{}/describe_index_stats", self.base_url))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Pinecone describe index stats failed: {}",
                error_text
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VectorSearch for PineconeClient {
    async fn query(&self, vector: &Embedding, top_k: usize) -> Result<Vec<QueryMatch>> {
        let request = QueryRequest {
            vector: vector.to_vec(),
            top_k,
            include_values: false,
            include_metadata: true,
        };

        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Pinecone query failed ({}): {}",
                status, error_text
            )));
        }

        let QueryResponse { mut matches } = response.json().await?;
        matches.truncate(top_k);
        debug!("Pinecone returned {} matches", matches.len());
        Ok(matches)
    }
}

fn data_plane_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
