//! Dataset sources yielding conversation records for ingestion.

pub mod huggingface;
pub mod jsonl;

use crate::error::DatasetError;
use crate::snippet::SourceRecord;

pub use huggingface::HfRowsDataset;
pub use jsonl::JsonlDataset;

/// Lazily decoded record stream. `InvalidRecord` items are skipped; any other `Err` ends the run.
pub type RecordStream<'a> = Box<dyn Iterator<Item = Result<SourceRecord, DatasetError>> + 'a>;

/// Finite source of conversation records.
pub trait DatasetSource: Send + Sync {
    /// Identifier recorded on every snippet loaded from this source.
    fn name(&self) -> &str;

    /// Opens the stream. Fails when the source is unreachable.
    fn records(&self) -> Result<RecordStream<'_>, DatasetError>;
}

/// In-memory source, handy for tests and small fixtures.
#[derive(Debug, Clone, Default)]
pub struct VecDataset {
    name: String,
    records: Vec<SourceRecord>,
}

impl VecDataset {
    /// Wraps already-decoded records.
    pub fn new(name: impl Into<String>, records: Vec<SourceRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

impl DatasetSource for VecDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn records(&self) -> Result<RecordStream<'_>, DatasetError> {
        Ok(Box::new(self.records.iter().cloned().map(Ok)))
    }
}
