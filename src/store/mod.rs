//! Document store for snippets and chat history.

pub mod memory;
pub mod postgres;
pub mod table;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreError;
use crate::snippet::Snippet;

pub use memory::MemoryDocumentStore;
pub use self::postgres::PgDocumentStore;
pub use table::TableName;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Human request.
    User,
    /// Generated reply.
    Assistant,
}

impl ChatRole {
    /// Lowercase wire label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    /// Parses a stored label.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// Chat turn awaiting persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Conversation identifier.
    pub session_id: String,
    /// Speaker.
    pub role: ChatRole,
    /// Message body.
    pub message: String,
    /// Set on user turns: whether an image accompanied the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_image: Option<bool>,
    /// Set on user turns: the attached image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Set on assistant turns answering an image request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references_image: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// User turn, recording whether an image was attached.
    pub fn user(session_id: &str, message: &str, image_url: Option<&str>) -> Self {
        Self {
            session_id: session_id.to_string(),
            role: ChatRole::User,
            message: message.to_string(),
            has_image: Some(image_url.is_some()),
            image_url: image_url.map(str::to_string),
            references_image: None,
            created_at: Utc::now(),
        }
    }

    /// Assistant turn, optionally pointing back at the analysed image.
    pub fn assistant(session_id: &str, message: &str, references_image: Option<&str>) -> Self {
        Self {
            session_id: session_id.to_string(),
            role: ChatRole::Assistant,
            message: message.to_string(),
            has_image: None,
            image_url: None,
            references_image: references_image.map(str::to_string),
            created_at: Utc::now(),
        }
    }
}

/// Chat turn with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Identifier assigned on insert.
    #[serde(rename = "_id")]
    pub id: String,
    /// Persisted fields.
    #[serde(flatten)]
    pub message: ChatMessage,
}

/// Persistence for snippets and chat sessions.
pub trait DocumentStore: Send + Sync {
    /// Stores a snippet and returns its generated identifier.
    fn insert_snippet(&self, snippet: &Snippet) -> Result<String, DocumentStoreError>;

    /// Stores a chat turn and returns its generated identifier.
    fn insert_message(&self, message: &ChatMessage) -> Result<String, DocumentStoreError>;

    /// All turns of a session, oldest first.
    fn session_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, DocumentStoreError>;

    /// Removes every turn of a session, returning how many were deleted.
    fn delete_session(&self, session_id: &str) -> Result<u64, DocumentStoreError>;
}
