//! PostgreSQL-backed document store.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use postgres::{Client, NoTls, Row};
use tracing::info;

use super::{ChatMessage, ChatRole, DocumentStore, StoredMessage, TableName};
use crate::error::DocumentStoreError;
use crate::snippet::Snippet;

const SNIPPETS_TABLE: &str = "snippets";
const MESSAGES_TABLE: &str = "messages";

/// Snippets and chat messages kept in two Postgres tables.
pub struct PgDocumentStore {
    client: Mutex<Client>,
    snippets: TableName,
    messages: TableName,
}

impl PgDocumentStore {
    /// Connects to `database_url` and optionally creates the tables.
    pub fn connect(database_url: &str, schema: &str, prepare_tables: bool) -> Result<Self> {
        anyhow::ensure!(!database_url.trim().is_empty(), "missing database URL");
        let snippets = TableName::new(schema, SNIPPETS_TABLE)?;
        let messages = TableName::new(schema, MESSAGES_TABLE)?;
        let mut client =
            Client::connect(database_url, NoTls).context("failed to connect to Postgres")?;
        if prepare_tables {
            ensure_snippets_table(&mut client, &snippets)?;
            ensure_messages_table(&mut client, &messages)?;
            info!(
                snippets = %snippets.qualified(),
                messages = %messages.qualified(),
                "document tables ready"
            );
        }
        Ok(Self {
            client: Mutex::new(client),
            snippets,
            messages,
        })
    }

    fn client(&self) -> Result<MutexGuard<'_, Client>, DocumentStoreError> {
        self.client
            .lock()
            .map_err(|_| DocumentStoreError::Connection("postgres client lock poisoned".into()))
    }
}

fn ensure_snippets_table(client: &mut Client, table: &TableName) -> Result<()> {
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            text TEXT NOT NULL,
            tags TEXT[] NOT NULL,
            source_dataset TEXT NOT NULL,
            model TEXT,
            recommended BOOLEAN NOT NULL DEFAULT FALSE,
            upvoted BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )",
        table.qualified()
    );
    client
        .batch_execute(&ddl)
        .context("failed to create snippets table")?;
    Ok(())
}

fn ensure_messages_table(client: &mut Client, table: &TableName) -> Result<()> {
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            session_id TEXT NOT NULL,
            role TEXT NOT NULL,
            message TEXT NOT NULL,
            has_image BOOLEAN,
            image_url TEXT,
            references_image TEXT,
            created_at TIMESTAMPTZ NOT NULL
        )",
        table.qualified()
    );
    client
        .batch_execute(&ddl)
        .context("failed to create messages table")?;
    let index = format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} (session_id, created_at)",
        table.index_name("session_id"),
        table.qualified()
    );
    client
        .batch_execute(&index)
        .context("failed to ensure session_id index")?;
    Ok(())
}

impl DocumentStore for PgDocumentStore {
    fn insert_snippet(&self, snippet: &Snippet) -> Result<String, DocumentStoreError> {
        let sql = format!(
            "INSERT INTO {} \
                (text, tags, source_dataset, model, recommended, upvoted, created_at, updated_at) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id::text",
            self.snippets.qualified()
        );
        let row = self
            .client()?
            .query_one(
                &sql,
                &[
                    &snippet.text,
                    &snippet.tags,
                    &snippet.source_dataset,
                    &snippet.model,
                    &snippet.recommended,
                    &snippet.upvoted,
                    &snippet.created_at,
                    &snippet.updated_at,
                ],
            )
            .map_err(|err| DocumentStoreError::Insert(err.to_string()))?;
        row.try_get(0)
            .map_err(|err| DocumentStoreError::Insert(err.to_string()))
    }

    fn insert_message(&self, message: &ChatMessage) -> Result<String, DocumentStoreError> {
        let sql = format!(
            "INSERT INTO {} \
                (session_id, role, message, has_image, image_url, references_image, created_at) \
                VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id::text",
            self.messages.qualified()
        );
        let row = self
            .client()?
            .query_one(
                &sql,
                &[
                    &message.session_id,
                    &message.role.as_str(),
                    &message.message,
                    &message.has_image,
                    &message.image_url,
                    &message.references_image,
                    &message.created_at,
                ],
            )
            .map_err(|err| DocumentStoreError::Insert(err.to_string()))?;
        row.try_get(0)
            .map_err(|err| DocumentStoreError::Insert(err.to_string()))
    }

    fn session_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, DocumentStoreError> {
        let sql = format!(
            "SELECT id::text, session_id, role, message, has_image, image_url, references_image, created_at \
                FROM {} WHERE session_id = $1 ORDER BY created_at ASC, id ASC",
            self.messages.qualified()
        );
        let rows = self
            .client()?
            .query(&sql, &[&session_id])
            .map_err(|err| DocumentStoreError::Query(err.to_string()))?;
        rows.iter().map(stored_message_from_row).collect()
    }

    fn delete_session(&self, session_id: &str) -> Result<u64, DocumentStoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE session_id = $1",
            self.messages.qualified()
        );
        self.client()?
            .execute(&sql, &[&session_id])
            .map_err(|err| DocumentStoreError::Query(err.to_string()))
    }
}

fn stored_message_from_row(row: &Row) -> Result<StoredMessage, DocumentStoreError> {
    let decode = |err: postgres::Error| DocumentStoreError::Query(err.to_string());
    let role_label: String = row.try_get("role").map_err(decode)?;
    let role = ChatRole::parse(&role_label).ok_or_else(|| {
        DocumentStoreError::Query(format!("unknown message role `{role_label}`"))
    })?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
    Ok(StoredMessage {
        id: row.try_get("id").map_err(decode)?,
        message: ChatMessage {
            session_id: row.try_get("session_id").map_err(decode)?,
            role,
            message: row.try_get("message").map_err(decode)?,
            has_image: row.try_get("has_image").map_err(decode)?,
            image_url: row.try_get("image_url").map_err(decode)?,
            references_image: row.try_get("references_image").map_err(decode)?,
            created_at,
        },
    })
}
