//! Tunable ingestion limits and CLI argument groups shared by the binaries.

use std::time::Duration;

use clap::Args;

use crate::dataset::HfRowsDataset;
use crate::embedder::OpenAiEmbedder;
use crate::store::PgDocumentStore;
use crate::vector_index::PineconeIndex;

/// Minimum character count for a message to be considered code.
pub const MIN_CONTENT_CHARS: usize = 50;
/// Characters of snippet text submitted to the embedding model.
pub const EMBED_TEXT_MAX_CHARS: usize = 8000;
/// Characters of snippet text copied into vector metadata.
pub const METADATA_TEXT_MAX_CHARS: usize = 1000;
/// Vector records accumulated before a bulk upsert.
pub const UPSERT_BATCH_SIZE: usize = 100;
/// Snippets loaded before a run stops scanning.
pub const LOAD_CAP: usize = 1000;
/// Dataset ingested by default.
pub const DEFAULT_DATASET: &str = "cfahlgren1/react-code-instructions";
/// Dimension of `text-embedding-ada-002` vectors.
pub const EMBEDDING_DIMENSIONS: usize = 1536;

/// Knobs that bound an ingestion run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestLimits {
    min_content_chars: usize,
    embed_text_max_chars: usize,
    metadata_text_max_chars: usize,
    batch_size: usize,
    load_cap: usize,
}

impl IngestLimits {
    /// Builds a new set of limits; batch size and cap are clamped to at least one.
    pub fn new(
        min_content_chars: usize,
        embed_text_max_chars: usize,
        metadata_text_max_chars: usize,
        batch_size: usize,
        load_cap: usize,
    ) -> Self {
        Self {
            min_content_chars,
            embed_text_max_chars,
            metadata_text_max_chars,
            batch_size: batch_size.max(1),
            load_cap: load_cap.max(1),
        }
    }

    /// Minimum message length accepted by the content filter.
    pub fn min_content_chars(&self) -> usize {
        self.min_content_chars
    }

    /// Truncation applied before embedding.
    pub fn embed_text_max_chars(&self) -> usize {
        self.embed_text_max_chars
    }

    /// Truncation applied to metadata text.
    pub fn metadata_text_max_chars(&self) -> usize {
        self.metadata_text_max_chars
    }

    /// Records per bulk upsert.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Maximum snippets loaded per run.
    pub fn load_cap(&self) -> usize {
        self.load_cap
    }
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self::new(
            MIN_CONTENT_CHARS,
            EMBED_TEXT_MAX_CHARS,
            METADATA_TEXT_MAX_CHARS,
            UPSERT_BATCH_SIZE,
            LOAD_CAP,
        )
    }
}

/// Ingestion limit overrides.
#[derive(Args, Debug, Clone)]
pub struct LimitArgs {
    /// Minimum characters for an assistant message to qualify
    #[arg(long, env = "REACT_RAG_MIN_CONTENT_CHARS", default_value_t = MIN_CONTENT_CHARS)]
    pub min_content_chars: usize,

    /// Characters of snippet text sent to the embedding model
    #[arg(long, env = "REACT_RAG_EMBED_MAX_CHARS", default_value_t = EMBED_TEXT_MAX_CHARS)]
    pub embed_max_chars: usize,

    /// Characters of snippet text stored in vector metadata
    #[arg(long, env = "REACT_RAG_METADATA_MAX_CHARS", default_value_t = METADATA_TEXT_MAX_CHARS)]
    pub metadata_max_chars: usize,

    /// Vector records per bulk upsert
    #[arg(long, env = "REACT_RAG_UPSERT_BATCH", default_value_t = UPSERT_BATCH_SIZE)]
    pub upsert_batch: usize,

    /// Stop after this many snippets are loaded
    #[arg(long, env = "REACT_RAG_LOAD_CAP", default_value_t = LOAD_CAP)]
    pub load_cap: usize,
}

impl LimitArgs {
    /// Converts CLI values into validated limits.
    pub fn limits(&self) -> IngestLimits {
        IngestLimits::new(
            self.min_content_chars,
            self.embed_max_chars,
            self.metadata_max_chars,
            self.upsert_batch,
            self.load_cap,
        )
    }
}

/// OpenAI-compatible endpoint settings for embeddings and completions.
#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: String,

    /// Base URL for the OpenAI-compatible API
    #[arg(
        long,
        env = "REACT_RAG_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Embedding model identifier
    #[arg(
        long,
        env = "REACT_RAG_EMBED_MODEL",
        default_value = "text-embedding-ada-002"
    )]
    pub embedding_model: String,

    /// Expected embedding dimension (0 skips the check)
    #[arg(long, env = "REACT_RAG_EMBED_DIMENSIONS", default_value_t = EMBEDDING_DIMENSIONS)]
    pub embedding_dimensions: usize,

    /// Seconds before an embedding request times out
    #[arg(long, env = "REACT_RAG_EMBED_TIMEOUT_SECS", default_value_t = 30)]
    pub embedding_timeout_secs: u64,

    /// Attempts for rate limits or transient errors
    #[arg(long, env = "REACT_RAG_EMBED_MAX_RETRIES", default_value_t = 3)]
    pub embedding_max_retries: usize,
}

impl OpenAiArgs {
    /// Embedding request timeout.
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs.max(1))
    }

    /// Dimension check, disabled when zero.
    pub fn expected_dimensions(&self) -> Option<usize> {
        (self.embedding_dimensions > 0).then_some(self.embedding_dimensions)
    }

    /// Embedding client for these settings.
    pub fn embedder(&self) -> anyhow::Result<OpenAiEmbedder> {
        OpenAiEmbedder::new(
            &self.openai_api_key,
            &self.openai_base_url,
            self.embedding_model.clone(),
            self.expected_dimensions(),
            self.embedding_timeout(),
            self.embedding_max_retries,
        )
    }
}

/// Pinecone index location.
#[derive(Args, Debug, Clone)]
pub struct PineconeArgs {
    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY")]
    pub pinecone_api_key: String,

    /// Index name, resolved to a data-plane host when --pinecone-host is absent
    #[arg(long, env = "PINECONE_INDEX", default_value = "ironhack-final-project")]
    pub pinecone_index: String,

    /// Data-plane host of the index (skips name resolution)
    #[arg(long, env = "PINECONE_INDEX_HOST")]
    pub pinecone_host: Option<String>,

    /// Namespace used for upserts and queries
    #[arg(long, env = "PINECONE_NAMESPACE")]
    pub pinecone_namespace: Option<String>,

    /// Seconds before a Pinecone request times out
    #[arg(long, env = "PINECONE_TIMEOUT_SECS", default_value_t = 30)]
    pub pinecone_timeout_secs: u64,

    /// Attempts for rate limits or transient errors
    #[arg(long, env = "PINECONE_MAX_RETRIES", default_value_t = 3)]
    pub pinecone_max_retries: usize,
}

impl PineconeArgs {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.pinecone_timeout_secs.max(1))
    }

    /// Index client, resolving the host from the index name when needed.
    pub fn open(&self) -> anyhow::Result<PineconeIndex> {
        match &self.pinecone_host {
            Some(host) => PineconeIndex::new(
                &self.pinecone_api_key,
                host,
                self.pinecone_namespace.clone(),
                self.timeout(),
                self.pinecone_max_retries,
            ),
            None => PineconeIndex::connect(
                &self.pinecone_api_key,
                &self.pinecone_index,
                self.pinecone_namespace.clone(),
                self.timeout(),
                self.pinecone_max_retries,
            ),
        }
    }
}

/// Postgres document store location.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Postgres connection string (postgres://...)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Schema holding the snippet and message tables
    #[arg(long, env = "REACT_RAG_SCHEMA", default_value = "public")]
    pub schema: String,

    /// Create tables automatically if missing
    #[arg(
        long,
        env = "REACT_RAG_PREPARE_TABLES",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub prepare_tables: bool,
}

impl StoreArgs {
    /// Connects the Postgres document store.
    pub fn connect(&self) -> anyhow::Result<PgDocumentStore> {
        PgDocumentStore::connect(&self.database_url, &self.schema, self.prepare_tables)
    }
}

/// Dataset source selection.
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Hugging Face dataset identifier
    #[arg(long, env = "REACT_RAG_DATASET", default_value = DEFAULT_DATASET)]
    pub dataset: String,

    /// Dataset config name
    #[arg(long, env = "REACT_RAG_DATASET_CONFIG", default_value = "default")]
    pub dataset_config: String,

    /// Dataset split to read
    #[arg(long, env = "REACT_RAG_DATASET_SPLIT", default_value = "train")]
    pub dataset_split: String,

    /// Base URL of the datasets-server rows API
    #[arg(
        long,
        env = "REACT_RAG_DATASETS_SERVER",
        default_value = "https://datasets-server.huggingface.co"
    )]
    pub datasets_server: String,

    /// Seconds before a dataset page request times out
    #[arg(long, env = "REACT_RAG_DATASET_TIMEOUT_SECS", default_value_t = 60)]
    pub dataset_timeout_secs: u64,
}

impl DatasetArgs {
    /// Page request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.dataset_timeout_secs.max(1))
    }

    /// Rows-API reader for the configured dataset.
    pub fn source(&self) -> anyhow::Result<HfRowsDataset> {
        HfRowsDataset::new(
            &self.datasets_server,
            self.dataset.clone(),
            self.dataset_split.clone(),
            self.timeout(),
        )
        .map(|source| source.with_config(self.dataset_config.clone()))
    }
}
