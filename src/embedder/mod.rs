//! Text embedding clients.

pub mod openai;

use crate::error::EmbeddingError;

pub use openai::OpenAiEmbedder;

/// Converts text into fixed-length vectors.
pub trait Embedder: Send + Sync {
    /// Model identifier sent with each request.
    fn model_name(&self) -> &str;

    /// Embeds several inputs, preserving order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a single input.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".to_string()))
    }
}
