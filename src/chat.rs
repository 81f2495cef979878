//! Chat sessions: request handling, persistence and fallbacks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::IngestLimits;
use crate::embedder::Embedder;
use crate::error::{ChatError, ImageFetchError};
use crate::rag::ReactAssistant;
use crate::snippet::{truncate_chars, Snippet};
use crate::store::{ChatMessage, ChatRole, DocumentStore, StoredMessage};
use crate::vector_index::VectorIndex;

/// Timeout applied to mockup downloads.
pub const IMAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Phrases that mark a request for a whole project scaffold.
pub const BOILERPLATE_KEYWORDS: &[&str] = &[
    "boilerplate",
    "starter",
    "template",
    "scaffold",
    "setup",
    "initial project",
    "project setup",
    "create project",
    "new project",
    "bootstrap",
    "kickstart",
    "foundation",
];

/// Reply sent instead of generated code for scaffold requests.
pub const BOILERPLATE_REPLY: &str = "🚀 **For complete project setup, check out my CLI tool:**

```bash
npx @julseb-lib/julseb-cli
```

This CLI provides ready-to-use project templates and boilerplates for React, Express, and more!

📦 **Package:** https://www.npmjs.com/package/@julseb-lib/julseb-cli";

/// Reply used when code generation fails.
pub const FALLBACK_COMPONENT: &str = "```tsx
import React from 'react';

const Button = () => {
    return (
        <button className=\"px-4 py-2 bg-blue-500 text-white rounded hover:bg-blue-600\">
            Click me
        </button>
    );
};

export default Button;
```";

const IMAGE_PROCESSING_FAILED: &str = "Image processing failed";
const IMAGE_ANALYSIS_FAILED: &str = "Image analysis failed";
const DEFAULT_PROMPT: &str = "Generate a React component";

/// Body of a new-chat request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewChatRequest {
    /// Free-text request.
    #[serde(default)]
    pub message: Option<String>,
    /// Existing session to append to; a new one is created when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Mockup image to analyse.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Assistant turn returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    /// Stored message identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Session the turn belongs to.
    pub session_id: String,
    /// Always `assistant`.
    pub role: ChatRole,
    /// Generated reply.
    pub message: String,
    /// Reply timestamp.
    pub created_at: DateTime<Utc>,
}

/// Downloads mockup images.
pub trait ImageFetcher: Send + Sync {
    /// Raw bytes behind `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageFetchError>;
}

/// Blocking HTTP image downloader.
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    /// Builds a downloader with the given timeout.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build image HTTP client")?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageFetchError> {
        let parsed = Url::parse(url).map_err(|err| ImageFetchError::InvalidUrl(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImageFetchError::InvalidUrl(format!(
                "unsupported scheme `{}`",
                parsed.scheme()
            )));
        }
        let resp = self
            .client
            .get(parsed)
            .send()
            .map_err(|err| ImageFetchError::Request(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ImageFetchError::Status(status.as_u16()));
        }
        resp.bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| ImageFetchError::Request(err.to_string()))
    }
}

/// True when the request asks for a project scaffold.
pub fn is_boilerplate_request(message: &str) -> bool {
    let lowered = message.to_lowercase();
    BOILERPLATE_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Builds the text handed to code generation.
fn ai_input(user_input: &str, image_description: Option<&str>) -> String {
    match image_description {
        Some(description) if !user_input.is_empty() => {
            format!("{user_input}\n\nUI Analysis: {description}")
        }
        Some(description) => format!("Generate React code for this UI: {description}"),
        None if !user_input.is_empty() => user_input.to_string(),
        None => DEFAULT_PROMPT.to_string(),
    }
}

/// Chat request handling over injected collaborators.
pub struct ChatService {
    store: Arc<dyn DocumentStore>,
    assistant: Arc<ReactAssistant>,
    images: Arc<dyn ImageFetcher>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    limits: IngestLimits,
}

impl ChatService {
    /// Wires the service.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        assistant: Arc<ReactAssistant>,
        images: Arc<dyn ImageFetcher>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        limits: IngestLimits,
    ) -> Self {
        Self {
            store,
            assistant,
            images,
            embedder,
            index,
            limits,
        }
    }

    /// Answers one chat request and persists both turns.
    pub fn new_chat(&self, request: NewChatRequest) -> Result<ChatReply, ChatError> {
        let user_input = request.message.unwrap_or_default();
        let image_url = request.image_url.filter(|url| !url.trim().is_empty());
        let session_id = request
            .session_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if user_input.is_empty() && image_url.is_none() {
            return Err(ChatError::EmptyRequest);
        }

        let boilerplate = is_boilerplate_request(&user_input);
        let description = image_url
            .as_deref()
            .map(|url| self.describe_image(url))
            .filter(|desc| !desc.is_empty() && !desc.to_lowercase().contains("failed"));
        let prompt = ai_input(&user_input, description.as_deref());

        self.store
            .insert_message(&ChatMessage::user(
                &session_id,
                &user_input,
                image_url.as_deref(),
            ))
            .map_err(ChatError::SaveUserMessage)?;

        let reply = if boilerplate {
            BOILERPLATE_REPLY.to_string()
        } else {
            match self.assistant.generate_code(&prompt, None) {
                Ok(code) => code,
                Err(err) => {
                    warn!(session_id = %session_id, error = %err, "code generation failed, using fallback");
                    FALLBACK_COMPONENT.to_string()
                }
            }
        };

        let assistant_message =
            ChatMessage::assistant(&session_id, &reply, image_url.as_deref());
        let id = self
            .store
            .insert_message(&assistant_message)
            .map_err(ChatError::SaveAssistantMessage)?;
        info!(session_id = %session_id, boilerplate, has_image = image_url.is_some(), "chat turn stored");

        Ok(ChatReply {
            id,
            session_id,
            role: ChatRole::Assistant,
            message: reply,
            created_at: assistant_message.created_at,
        })
    }

    /// Full history of a session, oldest first.
    pub fn session_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, ChatError> {
        self.store
            .session_messages(session_id)
            .map_err(ChatError::Session)
    }

    /// Deletes a session's messages, returning how many were removed.
    pub fn delete_session(&self, session_id: &str) -> Result<u64, ChatError> {
        let removed = self
            .store
            .delete_session(session_id)
            .map_err(ChatError::Session)?;
        info!(session_id, removed, "session deleted");
        Ok(removed)
    }

    /// Stores a user-supplied snippet and indexes it, returning its id.
    pub fn add_snippet(&self, text: &str, tags: Vec<String>) -> Result<String, ChatError> {
        let snippet = Snippet::manual(text, tags);
        let id = self
            .store
            .insert_snippet(&snippet)
            .map_err(ChatError::SnippetStore)?;
        let vector = self
            .embedder
            .embed(truncate_chars(&snippet.text, self.limits.embed_text_max_chars()))?;
        let record = snippet.vector_record(id.clone(), vector, self.limits.metadata_text_max_chars());
        self.index.upsert(std::slice::from_ref(&record))?;
        info!(snippet_id = %id, "manual snippet added");
        Ok(id)
    }

    fn describe_image(&self, url: &str) -> String {
        let bytes = match self.images.fetch(url) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(url, error = %err, "image download failed");
                return IMAGE_PROCESSING_FAILED.to_string();
            }
        };
        match self.assistant.analyze_image(&STANDARD.encode(bytes)) {
            Ok(description) => description,
            Err(err) => {
                warn!(url, error = %err, "image analysis failed");
                IMAGE_ANALYSIS_FAILED.to_string()
            }
        }
    }
}
