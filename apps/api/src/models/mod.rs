use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

pub use product::{parse_price, Product, ProductMetadata};

mod product;

/// Request structure for furniture recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// Free-text description of what the user is looking for
    pub query: String,
    /// Number of products to return (default: 8)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl RecommendationRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
        }
    }
}

fn default_top_k() -> usize {
    8
}

/// Response structure for furniture recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub query: String,
    /// Products in descending similarity order
    pub products: Vec<Product>,
    pub count: usize,
}

impl RecommendationResponse {
    pub fn new(query: String, products: Vec<Product>) -> Self {
        let count = products.len();
        Self {
            query,
            products,
            count,
        }
    }

    pub fn empty(query: String) -> Self {
        Self::new(query, Vec::new())
    }
}

/// Value counts in ranking order, serialized as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedCounts(pub Vec<(String, usize)>);

impl RankedCounts {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<usize> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, count)| *count)
    }
}

impl Serialize for RankedCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, count) in &self.0 {
            map.serialize_entry(key, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
}

/// Descriptive statistics over the product dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsResponse {
    pub total_products: usize,
    pub top_brands: RankedCounts,
    pub top_categories: RankedCounts,
    pub price_stats: PriceStats,
}

/// Which upstream dependencies came up at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAvailability {
    pub embedding_model: bool,
    pub pinecone: bool,
    pub gemini_ai: bool,
    pub dataset: bool,
}

impl ServiceAvailability {
    pub fn all_ready(&self) -> bool {
        self.embedding_model && self.pinecone && self.gemini_ai && self.dataset
    }
}

/// Health check response structure
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `healthy` when every dependency is up, `degraded` otherwise
    pub status: &'static str,
    /// Current timestamp in RFC3339 format
    pub timestamp: String,
    pub services: ServiceAvailability,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_top_k() {
        let request: RecommendationRequest =
            serde_json::from_str(r#"{"query": "mid-century sofa"}"#).unwrap();
        assert_eq!(request.top_k, 8);
    }

    #[test]
    fn test_request_rejects_negative_top_k() {
        let result = serde_json::from_str::<RecommendationRequest>(r#"{"query": "x", "top_k": -1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_ranked_counts_keep_order() {
        let counts = RankedCounts(vec![
            ("Zinus".to_string(), 5),
            ("Acme".to_string(), 3),
            ("Bolt".to_string(), 3),
        ]);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"Zinus":5,"Acme":3,"Bolt":3}"#);
        assert_eq!(counts.get("Acme"), Some(3));
        assert_eq!(counts.get("Nope"), None);
    }

    #[test]
    fn test_empty_response_has_zero_count() {
        let response = RecommendationResponse::empty("lamp".to_string());
        assert_eq!(response.count, 0);
        assert!(response.products.is_empty());
    }
}
