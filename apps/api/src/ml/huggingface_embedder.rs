use crate::error::{ApiError, Result};
use crate::ml::{normalize, Embedding, QueryEmbedder, EMBEDDING_DIMENSION};
use async_trait::async_trait;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, Axis};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_PROBE_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const PROBE_TEXT: &str = "A comfortable fabric sofa for a small living room.";

// Text processing limits
const MAX_TEXT_PREVIEW_LENGTH: usize = 100;

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a str,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Options {
    wait_for_model: bool,
}

/// The inference API answers with a pooled vector, a single-row matrix or
/// one row per token depending on the model's pipeline.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtraction {
    Vector(Vec<f32>),
    Matrix(Vec<Vec<f32>>),
    Batch(Vec<Vec<Vec<f32>>>),
}

/// Query embedder backed by the HuggingFace feature-extraction inference API.
#[derive(Clone)]
pub struct HuggingFaceEmbedder {
    client: Client,
    api_key: Option<String>,
    model_url: String,
    model_name: String,
    probe_attempts: u32,
}

impl HuggingFaceEmbedder {
    pub fn new(
        base_url: &str,
        model_name: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(15)))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        let model_url = format!(
            "{}/models/{}/pipeline/feature-extraction",
            base_url.trim_end_matches('/'),
            model_name
        );

        Ok(Self {
            client,
            api_key: api_key.map(str::to_string),
            model_url,
            model_name: model_name.to_string(),
            probe_attempts: DEFAULT_PROBE_ATTEMPTS,
        })
    }

    pub fn with_probe_attempts(mut self, attempts: u32) -> Self {
        self.probe_attempts = attempts.max(1);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Build the client and run a probe embedding so a broken model or
    /// endpoint is detected at startup rather than on the first request.
    pub async fn load(
        base_url: &str,
        model_name: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        Self::new(base_url, model_name, api_key, timeout)?.probe().await
    }

    async fn probe(self) -> Result<Self> {
        info!("Probing embedding model {}", self.model_name);

        for attempt in 1..=self.probe_attempts {
            let result = self.encode(PROBE_TEXT).await;
            match result {
                Ok(embedding) => {
                    info!(
                        "Embedding model ready on attempt {} (dimension: {})",
                        attempt,
                        embedding.len()
                    );
                    return Ok(self);
                }
                Err(e) if attempt < self.probe_attempts => {
                    let delay_ms = DEFAULT_RETRY_DELAY_MS * 2u64.pow(attempt - 1);
                    warn!(
                        "Embedding probe attempt {}/{} failed: {}. Retrying in {}ms",
                        attempt, self.probe_attempts, e, delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ApiError::ModelInferenceError(
            "All embedding probe attempts failed".to_string(),
        ))
    }

    /// Encodes a single text into a normalized 384-dimensional embedding.
    pub async fn encode(&self, text: &str) -> Result<Embedding> {
        let input = text.trim();
        debug!(
            "Encoding text (length: {}): {}{}",
            input.len(),
            input.chars().take(MAX_TEXT_PREVIEW_LENGTH).collect::<String>(),
            if input.chars().count() > MAX_TEXT_PREVIEW_LENGTH {
                "..."
            } else {
                ""
            }
        );

        let request = FeatureExtractionRequest {
            inputs: input,
            options: Options {
                wait_for_model: true,
            },
        };

        let mut builder = self.client.post(&self.model_url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            ApiError::ExternalServiceError(format!("Embedding request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND => ApiError::ExternalServiceError(format!(
                    "Model not found: {}",
                    self.model_name
                )),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ApiError::ExternalServiceError(
                        "Authentication failed. Please check your HuggingFace API key."
                            .to_string(),
                    )
                }
                StatusCode::TOO_MANY_REQUESTS => ApiError::ExternalServiceError(
                    "HuggingFace rate limit exceeded".to_string(),
                ),
                _ => ApiError::ExternalServiceError(format!(
                    "HuggingFace API returned {}: {}",
                    status, text
                )),
            });
        }

        let output: FeatureExtraction = response.json().await.map_err(|e| {
            ApiError::SerializationError(format!("Failed to parse embedding response: {}", e))
        })?;

        let embedding = pool(output)?;
        if embedding.len() != EMBEDDING_DIMENSION {
            return Err(ApiError::ModelInferenceError(format!(
                "Expected {}-dimensional embedding, got {}",
                EMBEDDING_DIMENSION,
                embedding.len()
            )));
        }

        Ok(normalize(embedding))
    }
}

#[async_trait]
impl QueryEmbedder for HuggingFaceEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.encode(text).await
    }
}

/// Collapse the API output to a single vector, mean-pooling token rows.
fn pool(output: FeatureExtraction) -> Result<Array1<f32>> {
    let rows = match output {
        FeatureExtraction::Vector(vector) => {
            if vector.is_empty() {
                return Err(ApiError::ModelInferenceError(
                    "Received empty embedding from model".to_string(),
                ));
            }
            return Ok(Array1::from(vector));
        }
        FeatureExtraction::Matrix(rows) => rows,
        FeatureExtraction::Batch(batch) => batch.into_iter().next().unwrap_or_default(),
    };

    let n_rows = rows.len();
    let dim = rows.first().map(Vec::len).unwrap_or(0);
    if n_rows == 0 || dim == 0 {
        return Err(ApiError::ModelInferenceError(
            "Received empty embedding from model".to_string(),
        ));
    }

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    let matrix = Array2::from_shape_vec((n_rows, dim), flat)?;
    matrix.mean_axis(Axis(0)).ok_or_else(|| {
        ApiError::ModelInferenceError("Cannot pool an empty token matrix".to_string())
    })
}
