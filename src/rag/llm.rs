//! Chat-completion providers.

use std::thread;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;
use crate::http::{is_transient, retry_backoff, should_retry};

/// Request envelope shared by providers.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// User prompt text.
    pub prompt: &'a str,
    /// Optional image attached as an `image_url` part (`data:` URLs allowed).
    pub image_url: Option<&'a str>,
}

impl<'a> CompletionRequest<'a> {
    /// Text-only request.
    pub fn text(prompt: &'a str) -> Self {
        Self {
            prompt,
            image_url: None,
        }
    }

    /// Request carrying one image next to the prompt.
    pub fn with_image(prompt: &'a str, image_url: &'a str) -> Self {
        Self {
            prompt,
            image_url: Some(image_url),
        }
    }
}

/// Trait implemented by concrete LLM providers.
pub trait LlmProvider: Send + Sync {
    /// Returns the assistant reply for a single-turn request.
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError>;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_retries: usize,
}

impl OpenAiChat {
    /// Builds a client with a fixed model, temperature and timeout.
    ///
    /// `max_retries` counts total attempts; values below 1 are raised to 1.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
        max_retries: usize,
    ) -> anyhow::Result<Self> {
        let model = model.into();
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing OpenAI chat model");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            temperature,
            max_retries: max_retries.max(1),
        })
    }

    /// Model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl LlmProvider for OpenAiChat {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, LlmError> {
        let content = match request.image_url {
            None => Content::Text(request.prompt),
            Some(url) => Content::Parts(vec![
                ContentPart::Text {
                    text: request.prompt,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ]),
        };
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatTurn {
                role: "user",
                content,
            }],
        };

        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&body).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: ChatResponse = resp.json().map_err(|err| {
                            LlmError::InvalidResponse(format!(
                                "failed to parse OpenAI chat response: {err}"
                            ))
                        })?;
                        return parsed
                            .choices
                            .into_iter()
                            .find_map(|choice| choice.message.content)
                            .filter(|answer| !answer.trim().is_empty())
                            .ok_or(LlmError::EmptyResponse);
                    }
                    let text = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        debug!(%status, attempt, "retrying chat completion");
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(LlmError::Status {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Err(err) => {
                    if is_transient(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(LlmError::Request(err.to_string()));
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatTurn<'a>>,
}

#[derive(Serialize)]
struct ChatTurn<'a> {
    role: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Content<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
