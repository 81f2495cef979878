//! Similarity search over stored snippets.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

use crate::embedder::Embedder;
use crate::error::RetrievalError;
use crate::vector_index::{VectorIndex, VectorMatch};

/// Snippet returned for a query, ranked by similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedSnippet {
    /// Vector record identifier (document-store id).
    pub id: String,
    /// Stored metadata text, empty when absent.
    pub text: String,
    /// Comma-joined tags, empty when absent.
    pub tags: String,
    /// Similarity score.
    pub score: f32,
}

impl From<VectorMatch> for RetrievedSnippet {
    fn from(hit: VectorMatch) -> Self {
        Self {
            text: hit.metadata_str("text").unwrap_or_default().to_string(),
            tags: hit.metadata_str("tags").unwrap_or_default().to_string(),
            id: hit.id,
            score: hit.score,
        }
    }
}

/// Embeds queries and looks up the nearest snippets.
pub struct SnippetRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
}

impl SnippetRetriever {
    /// Builds a retriever; `cache_size` of 0 disables the query-embedding cache.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        cache_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            cache: NonZeroUsize::new(cache_size).map(|capacity| Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Up to `k` snippets most similar to `query`.
    pub fn relevant(&self, query: &str, k: usize) -> Result<Vec<RetrievedSnippet>, RetrievalError> {
        let embedding = self.embed_query(query)?;
        let matches = self.index.query(&embedding, k, true)?;
        debug!(hits = matches.len(), k, "retrieved snippets");
        Ok(matches.into_iter().map(RetrievedSnippet::from).collect())
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                if let Some(hit) = guard.get(query) {
                    return Ok(hit.clone());
                }
            }
        }

        let embedding = self.embedder.embed(query)?;

        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                guard.put(query.to_string(), embedding.clone());
            }
        }
        Ok(embedding)
    }
}
