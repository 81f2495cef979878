#![warn(missing_docs)]
//! Core library entry points for the React snippet RAG service.

pub mod chat;
pub mod config;
pub mod dataset;
pub mod embedder;
pub mod error;
pub mod filter;
pub mod http;
pub mod ingest;
pub mod rag;
pub mod server;
pub mod snippet;
pub mod store;
pub mod tags;
pub mod vector_index;

pub use chat::{ChatReply, ChatService, HttpImageFetcher, ImageFetcher, NewChatRequest};
pub use config::IngestLimits;
pub use dataset::{DatasetSource, HfRowsDataset, JsonlDataset, VecDataset};
pub use embedder::{Embedder, OpenAiEmbedder};
pub use error::{
    ChatError, DatasetError, DocumentStoreError, EmbeddingError, ImageFetchError, IngestError,
    LlmError, RetrievalError, VectorIndexError,
};
pub use filter::{is_candidate, ContentFilter};
pub use ingest::{IngestReport, SnippetIngestor};
pub use rag::{LlmProvider, OpenAiChat, ReactAssistant, SnippetRetriever};
pub use snippet::{Message, Snippet, SourceRecord, VectorRecord};
pub use store::{DocumentStore, MemoryDocumentStore, PgDocumentStore, TableName};
pub use tags::derive_tags;
pub use vector_index::{PineconeIndex, VectorIndex, VectorMatch};
