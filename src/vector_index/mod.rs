//! Vector index clients.

pub mod pinecone;

use serde_json::{Map, Value};

use crate::error::VectorIndexError;
use crate::snippet::VectorRecord;

pub use pinecone::PineconeIndex;

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// Stored record identifier.
    pub id: String,
    /// Similarity score reported by the index.
    pub score: f32,
    /// Stored metadata; empty when not requested.
    pub metadata: Map<String, Value>,
}

impl VectorMatch {
    /// String metadata field, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

/// Bulk writer and similarity search over stored vectors.
pub trait VectorIndex: Send + Sync {
    /// Writes or replaces the given records in one call.
    fn upsert(&self, records: &[VectorRecord]) -> Result<(), VectorIndexError>;

    /// Returns up to `top_k` matches ranked by similarity.
    fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<VectorMatch>, VectorIndexError>;
}
