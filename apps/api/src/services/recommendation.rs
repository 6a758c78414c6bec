use crate::error::{ApiError, Result};
use crate::ml::QueryEmbedder;
use crate::models::{Product, ProductMetadata, RecommendationRequest, RecommendationResponse};
use crate::services::descriptor::DescriptorGenerator;
use crate::services::lifecycle::ServiceStatus;
use crate::services::pinecone::{QueryMatch, VectorSearch};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info};

/// Embed → similarity search → per-product description → response.
#[derive(Clone)]
pub struct RecommendationService {
    embedder: ServiceStatus<Arc<dyn QueryEmbedder>>,
    index: ServiceStatus<Arc<dyn VectorSearch>>,
    descriptor: DescriptorGenerator,
    upstream_timeout: Duration,
    description_concurrency: usize,
}

impl RecommendationService {
    pub fn new(
        embedder: ServiceStatus<Arc<dyn QueryEmbedder>>,
        index: ServiceStatus<Arc<dyn VectorSearch>>,
        descriptor: DescriptorGenerator,
        upstream_timeout: Duration,
        description_concurrency: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            descriptor,
            upstream_timeout,
            description_concurrency: description_concurrency.max(1),
        }
    }

    pub fn embedder_ready(&self) -> bool {
        self.embedder.is_ready()
    }

    pub fn index_ready(&self) -> bool {
        self.index.is_ready()
    }

    pub fn descriptor_ready(&self) -> bool {
        self.descriptor.is_ready()
    }

    pub async fn recommend(&self, request: &RecommendationRequest) -> Result<RecommendationResponse> {
        let embedder = self.embedder.ready().ok_or_else(|| {
            ApiError::ServiceUnavailable(
                "Embedding model not initialized. Check server logs.".to_string(),
            )
        })?;
        let index = self.index.ready().ok_or_else(|| {
            ApiError::ServiceUnavailable(
                "Pinecone connection not established. Check PINECONE_API_KEY.".to_string(),
            )
        })?;

        let started = Instant::now();
        let response = self
            .run_pipeline(embedder.as_ref(), index.as_ref(), request)
            .await
            .map_err(|e| {
                ApiError::InternalError(format!("Error generating recommendations: {}", e))
            })?;

        info!(
            "Recommended {} products for query '{}' in {:?}",
            response.count,
            request.query,
            started.elapsed()
        );
        Ok(response)
    }

    async fn run_pipeline(
        &self,
        embedder: &dyn QueryEmbedder,
        index: &dyn VectorSearch,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse> {
        let embedding = timeout(self.upstream_timeout, embedder.embed(&request.query)).await??;
        debug!("Embedded query into {} dimensions", embedding.len());

        let matches = timeout(self.upstream_timeout, index.query(&embedding, request.top_k)).await??;
        if matches.is_empty() {
            debug!("No matches for query '{}'", request.query);
            return Ok(RecommendationResponse::empty(request.query.clone()));
        }

        let entries = matches
            .into_iter()
            .map(|QueryMatch { id, score, metadata }| -> Result<_> {
                Ok((id, score, ProductMetadata::from_value(metadata)?))
            })
            .collect::<Result<Vec<_>>>()?;

        // `buffered` yields in input order regardless of completion order.
        let descriptions: Vec<String> = stream::iter(entries.iter().map(|(_, _, metadata)| {
            self.descriptor
                .describe(metadata.title(), metadata.brand(), metadata.price())
        }))
        .buffered(self.description_concurrency)
        .collect()
        .await;

        let products = entries
            .into_iter()
            .zip(descriptions)
            .map(|((id, score, metadata), creative_description)| Product {
                title: metadata.title().to_string(),
                brand: metadata.brand().to_string(),
                price: metadata.price(),
                uniq_id: metadata.uniq_id.unwrap_or(id),
                images: metadata.images,
                creative_description,
                similarity_score: score,
            })
            .collect();

        Ok(RecommendationResponse::new(request.query.clone(), products))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{Embedding, EMBEDDING_DIMENSION};
    use crate::services::gemini::TextGenerator;
    use async_trait::async_trait;
    use ndarray::Array1;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl QueryEmbedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::ExternalServiceError("model offline".into()));
            }
            Ok(Array1::from_elem(EMBEDDING_DIMENSION, 1.0 / (EMBEDDING_DIMENSION as f32).sqrt()))
        }
    }

    #[derive(Default)]
    struct FakeIndex {
        calls: AtomicUsize,
        matches: Vec<QueryMatch>,
        fail: bool,
    }

    #[async_trait]
    impl VectorSearch for FakeIndex {
        async fn query(&self, _vector: &Embedding, top_k: usize) -> Result<Vec<QueryMatch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ApiError::ExternalServiceError("unauthorized".into()));
            }
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }
    }

    /// Later products finish first, to check ordering survives the fan-out.
    struct ReverseDelayGenerator;

    #[async_trait]
    impl TextGenerator for ReverseDelayGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            let title_line = prompt
                .lines()
                .find(|l| l.starts_with("Product: "))
                .unwrap_or_default()
                .to_string();
            let n: u64 = title_line
                .trim_start_matches("Product: Item ")
                .parse()
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(50 - n * 10)).await;
            Ok(format!("Generated for {}", title_line))
        }
    }

    fn product_match(id: &str, score: f64, metadata: serde_json::Value) -> QueryMatch {
        QueryMatch {
            id: id.to_string(),
            score,
            metadata: Some(metadata),
        }
    }

    fn service(
        embedder: ServiceStatus<Arc<dyn QueryEmbedder>>,
        index: ServiceStatus<Arc<dyn VectorSearch>>,
        descriptor: DescriptorGenerator,
    ) -> RecommendationService {
        RecommendationService::new(embedder, index, descriptor, Duration::from_secs(2), 4)
    }

    fn ready<T: ?Sized>(value: Arc<T>) -> ServiceStatus<Arc<T>> {
        ServiceStatus::Ready(value)
    }

    #[tokio::test]
    async fn test_unavailable_index_skips_embedding_and_search() {
        let embedder = Arc::new(CountingEmbedder::default());
        let svc = service(
            ready(embedder.clone() as Arc<dyn QueryEmbedder>),
            ServiceStatus::Unconfigured,
            DescriptorGenerator::template_only(),
        );

        let result = svc.recommend(&RecommendationRequest::new("sofa", 8)).await;

        match result {
            Err(ApiError::ServiceUnavailable(msg)) => assert!(msg.contains("Pinecone")),
            other => panic!("expected service unavailable, got {:?}", other.map(|r| r.count)),
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_embedder_is_service_unavailable() {
        let index = Arc::new(FakeIndex::default());
        let svc = service(
            ServiceStatus::Failed("download failed".into()),
            ready(index.clone() as Arc<dyn VectorSearch>),
            DescriptorGenerator::template_only(),
        );

        let result = svc.recommend(&RecommendationRequest::new("sofa", 8)).await;

        match result {
            Err(ApiError::ServiceUnavailable(msg)) => assert!(msg.contains("Embedding model")),
            other => panic!("expected service unavailable, got {:?}", other.map(|r| r.count)),
        }
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_matches_is_empty_success() {
        let svc = service(
            ready(Arc::new(CountingEmbedder::default()) as Arc<dyn QueryEmbedder>),
            ready(Arc::new(FakeIndex::default()) as Arc<dyn VectorSearch>),
            DescriptorGenerator::template_only(),
        );

        let response = svc
            .recommend(&RecommendationRequest::new("floating bookshelf", 8))
            .await
            .unwrap();

        assert_eq!(response.query, "floating bookshelf");
        assert!(response.products.is_empty());
        assert_eq!(response.count, 0);
    }

    #[tokio::test]
    async fn test_products_follow_index_order_with_defaults() {
        let index = FakeIndex {
            matches: vec![
                product_match(
                    "vec-1",
                    0.92,
                    json!({"uniq_id": "p-1", "title": "Oak Chair", "brand": "Acme", "price": 49.99, "images": "https://img/oak.jpg"}),
                ),
                product_match("vec-2", 0.81, json!({"price": "$120.00"})),
                product_match("vec-3", 0.40, json!({"title": "Lamp", "brand": "Glow"})),
            ],
            ..FakeIndex::default()
        };
        let svc = service(
            ready(Arc::new(CountingEmbedder::default()) as Arc<dyn QueryEmbedder>),
            ready(Arc::new(index) as Arc<dyn VectorSearch>),
            DescriptorGenerator::template_only(),
        );

        let response = svc.recommend(&RecommendationRequest::new("chair", 8)).await.unwrap();

        assert_eq!(response.count, 3);
        assert_eq!(response.products.len(), response.count);

        let first = &response.products[0];
        assert_eq!(first.uniq_id, "p-1");
        assert_eq!(first.price, 49.99);
        assert_eq!(first.images.as_deref(), Some("https://img/oak.jpg"));
        assert_eq!(
            first.creative_description,
            "Discover the Oak Chair by Acme, expertly crafted to enhance your living space with style and functionality."
        );

        let second = &response.products[1];
        assert_eq!(second.uniq_id, "vec-2");
        assert_eq!(second.title, "Untitled Product");
        assert_eq!(second.brand, "Unknown");
        assert_eq!(second.price, 120.0);
        assert!(second.creative_description.contains("Untitled Product by Unknown"));

        let scores: Vec<f64> = response.products.iter().map(|p| p.similarity_score).collect();
        assert_eq!(scores, vec![0.92, 0.81, 0.40]);
    }

    #[tokio::test]
    async fn test_count_is_bounded_by_top_k() {
        let index = FakeIndex {
            matches: (0..10)
                .map(|i| product_match(&format!("v{}", i), 1.0 - i as f64 * 0.05, json!({})))
                .collect(),
            ..FakeIndex::default()
        };
        let svc = service(
            ready(Arc::new(CountingEmbedder::default()) as Arc<dyn QueryEmbedder>),
            ready(Arc::new(index) as Arc<dyn VectorSearch>),
            DescriptorGenerator::template_only(),
        );

        let response = svc.recommend(&RecommendationRequest::new("desk", 3)).await.unwrap();
        assert_eq!(response.count, 3);
        assert_eq!(response.products.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_descriptions_keep_order() {
        let index = FakeIndex {
            matches: (0..5)
                .map(|i| {
                    product_match(
                        &format!("v{}", i),
                        1.0 - i as f64 * 0.1,
                        json!({"title": format!("Item {}", i), "brand": "Acme"}),
                    )
                })
                .collect(),
            ..FakeIndex::default()
        };
        let generator: Arc<dyn TextGenerator> = Arc::new(ReverseDelayGenerator);
        let svc = service(
            ready(Arc::new(CountingEmbedder::default()) as Arc<dyn QueryEmbedder>),
            ready(Arc::new(index) as Arc<dyn VectorSearch>),
            DescriptorGenerator::new(ServiceStatus::Ready(generator), Duration::from_secs(2)),
        );

        let response = svc.recommend(&RecommendationRequest::new("anything", 8)).await.unwrap();

        for (i, product) in response.products.iter().enumerate() {
            assert_eq!(product.title, format!("Item {}", i));
            assert_eq!(
                product.creative_description,
                format!("Generated for Product: Item {}", i)
            );
        }
    }

    #[tokio::test]
    async fn test_embedding_failure_is_internal_error() {
        let svc = service(
            ready(Arc::new(CountingEmbedder {
                fail: true,
                ..CountingEmbedder::default()
            }) as Arc<dyn QueryEmbedder>),
            ready(Arc::new(FakeIndex::default()) as Arc<dyn VectorSearch>),
            DescriptorGenerator::template_only(),
        );

        let result = svc.recommend(&RecommendationRequest::new("sofa", 8)).await;
        match result {
            Err(ApiError::InternalError(msg)) => {
                assert!(msg.starts_with("Error generating recommendations:"));
                assert!(msg.contains("model offline"));
            }
            other => panic!("expected internal error, got {:?}", other.map(|r| r.count)),
        }
    }

    #[tokio::test]
    async fn test_search_failure_is_internal_error() {
        let svc = service(
            ready(Arc::new(CountingEmbedder::default()) as Arc<dyn QueryEmbedder>),
            ready(Arc::new(FakeIndex {
                fail: true,
                ..FakeIndex::default()
            }) as Arc<dyn VectorSearch>),
            DescriptorGenerator::template_only(),
        );

        let result = svc.recommend(&RecommendationRequest::new("sofa", 8)).await;
        assert!(matches!(result, Err(ApiError::InternalError(_))));
    }
}
