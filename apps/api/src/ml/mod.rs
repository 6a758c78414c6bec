pub mod huggingface_embedder;

use crate::error::Result;
use async_trait::async_trait;
use ndarray::Array1;

pub use huggingface_embedder::HuggingFaceEmbedder;

/// Output size of all-MiniLM-L6-v2
pub const EMBEDDING_DIMENSION: usize = 384;

pub type Embedding = Array1<f32>;

/// Turns query text into a unit-length vector of `EMBEDDING_DIMENSION` floats.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize(vector: Embedding) -> Embedding {
    let magnitude = vector.dot(&vector).sqrt();
    if magnitude > 0.0 {
        vector / magnitude
    } else {
        vector
    }
}
