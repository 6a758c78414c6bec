use crate::error::{ApiError, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub const DATASET_FILE_NAME: &str = "furniture_dataset.csv";

/// Runtime configuration, read from the process environment (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,

    pub pinecone_api_key: Option<String>,
    pub pinecone_index: String,
    pub pinecone_control_plane_url: String,

    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,

    pub huggingface_api_key: Option<String>,
    pub huggingface_base_url: String,
    pub embedding_model: String,

    pub dataset_path: Option<PathBuf>,

    pub upstream_timeout_secs: u64,
    pub description_concurrency: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let settings = ::config::Config::builder()
            .set_default("host", "0.0.0.0")
            .and_then(|b| b.set_default("port", 8000))
            .and_then(|b| b.set_default("pinecone_index", "furniture-recommender"))
            .and_then(|b| b.set_default("pinecone_control_plane_url", "https://api.pinecone.io"))
            .and_then(|b| b.set_default("gemini_model", "gemini-1.5-flash"))
            .and_then(|b| {
                b.set_default(
                    "gemini_base_url",
                    "https://generativelanguage.googleapis.com",
                )
            })
            .and_then(|b| {
                b.set_default(
                    "huggingface_base_url",
                    "https://router.huggingface.co/hf-inference",
                )
            })
            .and_then(|b| {
                b.set_default("embedding_model", "sentence-transformers/all-MiniLM-L6-v2")
            })
            .and_then(|b| b.set_default("upstream_timeout_secs", 30))
            .and_then(|b| b.set_default("description_concurrency", 4))
            .map_err(|e| ApiError::InternalError(format!("Invalid configuration defaults: {}", e)))?
            .add_source(::config::Environment::default())
            .build()
            .map_err(|e| ApiError::InternalError(format!("Failed to read configuration: {}", e)))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| ApiError::InternalError(format!("Invalid configuration: {}", e)))?;

        Ok(config.normalized())
    }

    /// Blank credentials count as absent.
    fn normalized(mut self) -> Self {
        self.pinecone_api_key = non_blank(self.pinecone_api_key);
        self.google_api_key = non_blank(self.google_api_key);
        self.huggingface_api_key = non_blank(self.huggingface_api_key);
        self.description_concurrency = self.description_concurrency.max(1);
        self
    }

    /// Explicit `DATASET_PATH`, or the dataset file next to the running executable.
    pub fn resolve_dataset_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.dataset_path {
            return Ok(path.clone());
        }

        let exe = std::env::current_exe()?;
        let dir = exe.parent().ok_or_else(|| {
            ApiError::InternalError(format!("Executable {} has no parent directory", exe.display()))
        })?;
        Ok(dir.join(DATASET_FILE_NAME))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            pinecone_api_key: None,
            pinecone_index: "furniture-recommender".to_string(),
            pinecone_control_plane_url: "https://api.pinecone.io".to_string(),
            google_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com".to_string(),
            huggingface_api_key: None,
            huggingface_base_url: "https://router.huggingface.co/hf-inference".to_string(),
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dataset_path: None,
            upstream_timeout_secs: 30,
            description_concurrency: 4,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
