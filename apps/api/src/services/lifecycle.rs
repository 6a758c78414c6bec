//! One-shot startup: bring up each upstream dependency, record the outcome,
//! and hand the immutable result to the HTTP layer.

use crate::config::Config;
use crate::ml::{HuggingFaceEmbedder, QueryEmbedder};
use crate::models::ServiceAvailability;
use crate::services::analytics::{AnalyticsService, ProductDataset};
use crate::services::descriptor::DescriptorGenerator;
use crate::services::gemini::{GeminiClient, TextGenerator};
use crate::services::pinecone::{PineconeClient, VectorSearch};
use crate::services::recommendation::RecommendationService;
use anyhow::Context;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Outcome of bringing up one upstream dependency.
#[derive(Clone)]
pub enum ServiceStatus<T> {
    /// No credential was configured, so no attempt was made.
    Unconfigured,
    Ready(T),
    Failed(String),
}

impl<T> ServiceStatus<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ServiceStatus::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ServiceStatus::Ready(value) => Some(value),
            _ => None,
        }
    }

    fn from_attempt(name: &str, attempt: anyhow::Result<T>) -> Self {
        match attempt {
            Ok(value) => ServiceStatus::Ready(value),
            Err(e) => {
                error!("{} unavailable: {:#}", name, e);
                ServiceStatus::Failed(format!("{:#}", e))
            }
        }
    }
}

impl<T> fmt::Debug for ServiceStatus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Unconfigured => f.write_str("Unconfigured"),
            ServiceStatus::Ready(_) => f.write_str("Ready"),
            ServiceStatus::Failed(reason) => f.debug_tuple("Failed").field(reason).finish(),
        }
    }
}

/// Everything the request handlers need. Built once, never mutated.
#[derive(Clone)]
pub struct Services {
    pub recommendation: RecommendationService,
    pub analytics: AnalyticsService,
}

impl Services {
    pub fn new(recommendation: RecommendationService, analytics: AnalyticsService) -> Self {
        Self {
            recommendation,
            analytics,
        }
    }

    pub fn availability(&self) -> ServiceAvailability {
        ServiceAvailability {
            embedding_model: self.recommendation.embedder_ready(),
            pinecone: self.recommendation.index_ready(),
            gemini_ai: self.recommendation.descriptor_ready(),
            dataset: self.analytics.dataset_loaded(),
        }
    }
}

/// Attempt every startup step in order. A failing step is logged and
/// recorded; it never stops later steps or the process.
pub async fn initialize(config: &Config) -> Services {
    let timeout = Duration::from_secs(config.upstream_timeout_secs);

    info!("{}", "=".repeat(80));
    info!("Starting Furniture Recommendation API...");
    info!("{}", "=".repeat(80));

    info!("[1/4] Loading sentence transformer model...");
    let embedder = load_embedder(config, timeout).await;

    info!("[2/4] Connecting to Pinecone...");
    let index = connect_index(config, timeout).await;

    info!("[3/4] Initializing Google Gemini AI...");
    let generator = init_generator(config, timeout);

    info!("[4/4] Loading dataset for analytics...");
    let dataset = load_dataset(config).await;

    let services = Services::new(
        RecommendationService::new(
            embedder,
            index,
            DescriptorGenerator::new(generator, timeout),
            timeout,
            config.description_concurrency,
        ),
        AnalyticsService::new(dataset),
    );

    let availability = services.availability();
    info!("{}", "=".repeat(80));
    if availability.all_ready() {
        info!("API Server Ready");
    } else {
        warn!("API Server Ready (degraded): {:?}", availability);
    }
    info!("{}", "=".repeat(80));

    services
}

async fn load_embedder(config: &Config, timeout: Duration) -> ServiceStatus<Arc<dyn QueryEmbedder>> {
    let attempt = HuggingFaceEmbedder::load(
        &config.huggingface_base_url,
        &config.embedding_model,
        config.huggingface_api_key.as_deref(),
        timeout,
    )
    .await
    .with_context(|| format!("Error loading embedding model {}", config.embedding_model))
    .map(|embedder| {
        info!("Embedding model loaded ({})", embedder.model_name());
        Arc::new(embedder) as Arc<dyn QueryEmbedder>
    });

    ServiceStatus::from_attempt("embedding model", attempt)
}

async fn connect_index(config: &Config, timeout: Duration) -> ServiceStatus<Arc<dyn VectorSearch>> {
    let Some(api_key) = config.pinecone_api_key.as_deref() else {
        warn!("PINECONE_API_KEY not set; recommendations are disabled");
        return ServiceStatus::Unconfigured;
    };

    let attempt = PineconeClient::connect(
        api_key,
        &config.pinecone_index,
        &config.pinecone_control_plane_url,
        timeout,
    )
    .await
    .with_context(|| format!("Error connecting to Pinecone index {}", config.pinecone_index))
    .map(|client| {
        info!("Connected to Pinecone");
        Arc::new(client) as Arc<dyn VectorSearch>
    });

    ServiceStatus::from_attempt("Pinecone", attempt)
}

fn init_generator(config: &Config, timeout: Duration) -> ServiceStatus<Arc<dyn TextGenerator>> {
    let Some(api_key) = config.google_api_key.as_deref() else {
        warn!("GOOGLE_API_KEY not set; using template descriptions");
        return ServiceStatus::Unconfigured;
    };

    let attempt = GeminiClient::new(api_key, &config.gemini_model, &config.gemini_base_url, timeout)
        .context("Error initializing Gemini")
        .map(|client| {
            info!("Gemini AI initialized ({})", config.gemini_model);
            Arc::new(client) as Arc<dyn TextGenerator>
        });

    ServiceStatus::from_attempt("Gemini", attempt)
}

async fn load_dataset(config: &Config) -> ServiceStatus<Arc<ProductDataset>> {
    let attempt = async {
        let path = config.resolve_dataset_path()?;
        let display = path.display().to_string();
        let dataset = tokio::task::spawn_blocking(move || ProductDataset::load(path))
            .await
            .context("Dataset loader task panicked")?
            .with_context(|| format!("Error loading dataset from {}", display))?;
        info!("Dataset loaded ({} products)", dataset.len());
        Ok::<_, anyhow::Error>(Arc::new(dataset))
    }
    .await;

    ServiceStatus::from_attempt("dataset", attempt)
}
