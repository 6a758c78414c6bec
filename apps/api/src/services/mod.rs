pub mod analytics;
pub mod descriptor;
pub mod gemini;
pub mod lifecycle;
pub mod pinecone;
pub mod recommendation;

// Re-export public types
pub use analytics::{AnalyticsService, ProductDataset};
pub use descriptor::DescriptorGenerator;
pub use gemini::{GeminiClient, TextGenerator};
pub use lifecycle::{initialize, ServiceStatus, Services};
pub use pinecone::{PineconeClient, QueryMatch, VectorSearch};
pub use recommendation::RecommendationService;
