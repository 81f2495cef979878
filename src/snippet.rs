//! Records flowing through the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback model label written to vector metadata, which cannot hold nulls.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Role-tagged message inside a dataset record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Speaker role (`user`, `assistant`, `system`).
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    /// Raw message text.
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

impl Message {
    /// Builds a message from its parts.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// One dataset entry: a conversation plus quality flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Conversation in order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<Message>,
    /// Curated as a good example upstream.
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommended: bool,
    /// Received an upvote upstream.
    #[serde(default, deserialize_with = "null_as_default")]
    pub upvoted: bool,
    /// Model that produced the assistant turns.
    #[serde(default)]
    pub model: Option<String>,
}

impl SourceRecord {
    /// Model name when present and non-empty.
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().filter(|name| !name.trim().is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Code example persisted in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// Full example text.
    pub text: String,
    /// Descriptive tags, `react` first.
    pub tags: Vec<String>,
    /// Dataset the snippet came from (`manual` for user submissions).
    pub source_dataset: String,
    /// Generating model, when known.
    pub model: Option<String>,
    /// Upstream recommendation flag.
    pub recommended: bool,
    /// Upstream upvote flag.
    pub upvoted: bool,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp; equal to `created_at` in this pipeline.
    pub updated_at: DateTime<Utc>,
}

impl Snippet {
    /// Builds a snippet from a dataset record's message text.
    pub fn from_record(
        text: &str,
        tags: Vec<String>,
        record: &SourceRecord,
        source_dataset: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            text: text.to_string(),
            tags,
            source_dataset: source_dataset.to_string(),
            model: record.model_name().map(str::to_string),
            recommended: record.recommended,
            upvoted: record.upvoted,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds a user-submitted snippet without dataset flags.
    pub fn manual(text: &str, tags: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            text: text.to_string(),
            tags,
            source_dataset: "manual".to_string(),
            model: None,
            recommended: false,
            upvoted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builds the vector-index entry for this snippet.
    pub fn vector_record(
        &self,
        id: String,
        vector: Vec<f32>,
        metadata_text_max_chars: usize,
    ) -> VectorRecord {
        VectorRecord {
            id,
            vector,
            metadata: VectorMetadata {
                text: truncate_chars(&self.text, metadata_text_max_chars).to_string(),
                tags: self.tags.join(","),
                recommended: self.recommended,
                upvoted: self.upvoted,
                model: self
                    .model
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
                dataset: self.source_dataset.clone(),
            },
        }
    }
}

/// Metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    /// Leading slice of the snippet text.
    pub text: String,
    /// Comma-joined tags.
    pub tags: String,
    /// Upstream recommendation flag.
    pub recommended: bool,
    /// Upstream upvote flag.
    pub upvoted: bool,
    /// Generating model or `unknown`.
    pub model: String,
    /// Source dataset identifier.
    pub dataset: String,
}

/// Entry written to the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Document-store identifier of the snippet.
    pub id: String,
    /// Embedding of the truncated snippet text.
    pub vector: Vec<f32>,
    /// Searchable metadata.
    pub metadata: VectorMetadata,
}

/// Returns at most `max_chars` leading characters of `text`, never splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
