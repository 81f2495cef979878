//! Snippet ingestion: dataset records in, document rows and vectors out.
//!
//! Each candidate message is stored first, then embedded, then buffered for a
//! bulk upsert. Undecodable records, store failures and embedding failures skip
//! the item; a failed flush or an unreadable dataset ends the run.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::IngestLimits;
use crate::dataset::DatasetSource;
use crate::embedder::Embedder;
use crate::error::{DatasetError, IngestError};
use crate::filter::ContentFilter;
use crate::snippet::{truncate_chars, Message, Snippet, SourceRecord, VectorRecord};
use crate::store::DocumentStore;
use crate::tags::derive_tags;
use crate::vector_index::VectorIndex;

const PROGRESS_EVERY: usize = 100;

/// Counters describing one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Messages examined, whether or not they passed the filter.
    pub processed: usize,
    /// Vector records buffered for upsert.
    pub loaded: usize,
    /// Bulk upserts issued.
    pub batches_flushed: usize,
    /// Candidates dropped because the document insert failed.
    pub store_failures: usize,
    /// Stored snippets left without a vector because embedding failed.
    pub embedding_failures: usize,
    /// Dataset records skipped because they could not be decoded.
    pub invalid_records: usize,
}

/// Vector records waiting for the next bulk upsert.
struct Batch {
    records: Vec<VectorRecord>,
    capacity: usize,
}

impl Batch {
    fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, record: VectorRecord) {
        self.records.push(record);
    }

    fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn flush(
        &mut self,
        index: &dyn VectorIndex,
        report: &mut IngestReport,
    ) -> Result<(), IngestError> {
        let size = self.records.len();
        if let Err(err) = index.upsert(&self.records) {
            error!(size, error = %err, "vector upsert failed");
            return Err(err.into());
        }
        self.records.clear();
        report.batches_flushed += 1;
        info!(size, batches = report.batches_flushed, "flushed vector batch");
        Ok(())
    }
}

/// Orchestrates a full ingestion run over injected collaborators.
pub struct SnippetIngestor {
    store: Arc<dyn DocumentStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    limits: IngestLimits,
    filter: ContentFilter,
}

impl SnippetIngestor {
    /// Builds an ingestor with the given limits.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        limits: IngestLimits,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            filter: ContentFilter::new(limits.min_content_chars()),
            limits,
        }
    }

    /// Streams `source` through filter, store, embedder and index.
    pub fn run(&self, source: &dyn DatasetSource) -> Result<IngestReport, IngestError> {
        let records = source.records().map_err(|err| {
            error!(dataset = source.name(), error = %err, "failed to open dataset");
            err
        })?;
        info!(
            dataset = source.name(),
            embedding_model = self.embedder.model_name(),
            batch_size = self.limits.batch_size(),
            load_cap = self.limits.load_cap(),
            "starting ingestion"
        );

        let mut report = IngestReport::default();
        let mut batch = Batch::new(self.limits.batch_size());

        'records: for record in records {
            let record = match record {
                Ok(record) => record,
                Err(err @ DatasetError::InvalidRecord { .. }) => {
                    report.invalid_records += 1;
                    warn!(dataset = source.name(), error = %err, "skipping undecodable record");
                    continue;
                }
                Err(err) => {
                    error!(dataset = source.name(), error = %err, "dataset stream failed");
                    return Err(err.into());
                }
            };
            for message in &record.messages {
                report.processed += 1;
                if report.processed % PROGRESS_EVERY == 0 {
                    info!(
                        processed = report.processed,
                        loaded = report.loaded,
                        "ingestion progress"
                    );
                }
                if !self.filter.is_candidate(message) {
                    continue;
                }
                let Some(vector_record) =
                    self.prepare(message, &record, source.name(), &mut report)
                else {
                    continue;
                };
                batch.push(vector_record);
                report.loaded += 1;

                if batch.is_full() {
                    batch.flush(self.index.as_ref(), &mut report)?;
                }
                if report.loaded >= self.limits.load_cap() {
                    info!(loaded = report.loaded, "load cap reached");
                    break 'records;
                }
            }
        }

        if !batch.is_empty() {
            batch.flush(self.index.as_ref(), &mut report)?;
        }

        info!(
            processed = report.processed,
            loaded = report.loaded,
            batches = report.batches_flushed,
            store_failures = report.store_failures,
            embedding_failures = report.embedding_failures,
            invalid_records = report.invalid_records,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Stores and embeds one candidate; `None` means it was skipped.
    fn prepare(
        &self,
        message: &Message,
        record: &SourceRecord,
        dataset: &str,
        report: &mut IngestReport,
    ) -> Option<VectorRecord> {
        let snippet = Snippet::from_record(&message.content, derive_tags(record), record, dataset);
        let id = match self.store.insert_snippet(&snippet) {
            Ok(id) => id,
            Err(err) => {
                report.store_failures += 1;
                warn!(processed = report.processed, error = %err, "failed to store snippet");
                return None;
            }
        };

        let input = truncate_chars(&snippet.text, self.limits.embed_text_max_chars());
        let vector = match self.embedder.embed(input) {
            Ok(vector) => vector,
            Err(err) => {
                report.embedding_failures += 1;
                warn!(snippet_id = %id, error = %err, "failed to embed snippet");
                return None;
            }
        };
        debug!(snippet_id = %id, dims = vector.len(), "embedded snippet");
        Some(snippet.vector_record(id, vector, self.limits.metadata_text_max_chars()))
    }
}
