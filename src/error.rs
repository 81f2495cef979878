//! Error types shared by the ingestion and chat pipelines.
//!
//! Each external collaborator gets its own narrow error so callers can decide
//! which failures are recoverable per item and which end a run.

use thiserror::Error;

/// Failures while opening or reading a dataset stream.
#[derive(Error, Debug)]
pub enum DatasetError {
    /// Dataset host could not be reached or answered with an error status.
    #[error("dataset unavailable: {0}")]
    Unavailable(String),

    /// A record could not be decoded.
    #[error("invalid record at {position}: {reason}")]
    InvalidRecord {
        /// Row index or line number of the offending record.
        position: usize,
        /// Decoder message.
        reason: String,
    },

    /// Local file access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by the document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Connection or schema preparation failed.
    #[error("document store connection failed: {0}")]
    Connection(String),

    /// Insert was rejected.
    #[error("insert failed: {0}")]
    Insert(String),

    /// Lookup or delete query failed.
    #[error("query failed: {0}")]
    Query(String),
}

/// Failures reported by the embedding service.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Transport-level failure (timeout, connect, body).
    #[error("embedding request failed: {0}")]
    Request(String),

    /// Non-success status after retries were exhausted.
    #[error("embedding service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, or a placeholder when unreadable.
        body: String,
    },

    /// Response could not be parsed or was incomplete.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Vector length differs from the configured dimension.
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Returned dimension.
        actual: usize,
    },
}

/// Failures reported by the vector index.
#[derive(Error, Debug)]
pub enum VectorIndexError {
    /// Transport-level failure.
    #[error("vector index request failed: {0}")]
    Request(String),

    /// Non-success status after retries were exhausted.
    #[error("vector index returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, or a placeholder when unreadable.
        body: String,
    },

    /// Response could not be parsed.
    #[error("invalid vector index response: {0}")]
    InvalidResponse(String),
}

/// Failures reported by a chat completion provider.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure.
    #[error("completion request failed: {0}")]
    Request(String),

    /// Non-success status.
    #[error("completion service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, or a placeholder when unreadable.
        body: String,
    },

    /// Response had no usable content.
    #[error("empty completion response")]
    EmptyResponse,

    /// Response could not be parsed.
    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

/// Failures while retrieving context snippets for a query.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The query could not be embedded.
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The similarity search failed.
    #[error("similarity search failed: {0}")]
    VectorIndex(#[from] VectorIndexError),
}

/// Failures while downloading a mockup image.
#[derive(Error, Debug)]
pub enum ImageFetchError {
    /// The URL is malformed or not http(s).
    #[error("invalid image url: {0}")]
    InvalidUrl(String),

    /// Transport-level failure.
    #[error("image download failed: {0}")]
    Request(String),

    /// Non-success status.
    #[error("image host returned {0}")]
    Status(u16),
}

/// Errors that end an ingestion run.
///
/// Per-item store and embedding failures never appear here; the orchestrator
/// logs and skips them.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The dataset could not be opened or read.
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// A batch flush to the vector index failed.
    #[error("vector index flush failed: {0}")]
    VectorIndex(#[from] VectorIndexError),
}

/// Errors surfaced by the chat service.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Neither a message nor an image URL was supplied.
    #[error("No message or image provided")]
    EmptyRequest,

    /// Persisting the user message failed.
    #[error("Failed to save user message: {0}")]
    SaveUserMessage(DocumentStoreError),

    /// Persisting the assistant reply failed.
    #[error("Failed to save assistant message: {0}")]
    SaveAssistantMessage(DocumentStoreError),

    /// A history lookup or delete failed.
    #[error("session query failed: {0}")]
    Session(DocumentStoreError),

    /// Storing a manual snippet failed.
    #[error("snippet store failed: {0}")]
    SnippetStore(DocumentStoreError),

    /// Embedding a manual snippet failed.
    #[error("snippet embedding failed: {0}")]
    SnippetEmbedding(#[from] EmbeddingError),

    /// Upserting a manual snippet failed.
    #[error("snippet upsert failed: {0}")]
    SnippetIndex(#[from] VectorIndexError),
}
