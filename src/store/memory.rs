//! In-process document store used by tests and dry runs.

use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{ChatMessage, DocumentStore, StoredMessage};
use crate::error::DocumentStoreError;
use crate::snippet::Snippet;

#[derive(Default)]
struct Inner {
    snippets: Vec<(String, Snippet)>,
    messages: Vec<StoredMessage>,
}

/// Document store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl MemoryDocumentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored snippets with their ids, in insert order.
    pub fn snippets(&self) -> Vec<(String, Snippet)> {
        self.lock()
            .map(|inner| inner.snippets.clone())
            .unwrap_or_default()
    }

    /// Number of stored chat messages across all sessions.
    pub fn message_count(&self) -> usize {
        self.lock().map(|inner| inner.messages.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, DocumentStoreError> {
        self.inner
            .lock()
            .map_err(|_| DocumentStoreError::Connection("memory store lock poisoned".into()))
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn insert_snippet(&self, snippet: &Snippet) -> Result<String, DocumentStoreError> {
        let id = Uuid::new_v4().to_string();
        self.lock()?.snippets.push((id.clone(), snippet.clone()));
        Ok(id)
    }

    fn insert_message(&self, message: &ChatMessage) -> Result<String, DocumentStoreError> {
        let id = Uuid::new_v4().to_string();
        self.lock()?.messages.push(StoredMessage {
            id: id.clone(),
            message: message.clone(),
        });
        Ok(id)
    }

    fn session_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, DocumentStoreError> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .filter(|stored| stored.message.session_id == session_id)
            .cloned()
            .collect())
    }

    fn delete_session(&self, session_id: &str) -> Result<u64, DocumentStoreError> {
        let mut inner = self.lock()?;
        let before = inner.messages.len();
        inner
            .messages
            .retain(|stored| stored.message.session_id != session_id);
        Ok((before - inner.messages.len()) as u64)
    }
}
