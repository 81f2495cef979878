//! HTTP surface: chat, snippet and ingestion routes under `/api`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::chat::{ChatReply, ChatService, NewChatRequest};
use crate::dataset::DatasetSource;
use crate::error::ChatError;
use crate::ingest::SnippetIngestor;
use crate::store::StoredMessage;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatService>,
    ingestor: Arc<SnippetIngestor>,
    dataset: Arc<dyn DatasetSource>,
}

impl AppState {
    /// Bundles the chat service, the ingestor and the dataset it loads from.
    pub fn new(
        chat: Arc<ChatService>,
        ingestor: Arc<SnippetIngestor>,
        dataset: Arc<dyn DatasetSource>,
    ) -> Self {
        Self {
            chat,
            ingestor,
            dataset,
        }
    }
}

/// JSON error payload.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Debug, Deserialize)]
struct AddSnippetRequest {
    text: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct PopulateBody {
    status: &'static str,
    loaded: usize,
    processed: usize,
    pinecone_populated: bool,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/", get(hello))
        .route("/api/chat/new-chat", post(new_chat))
        .route("/api/chat/messages/{session_id}", get(session_messages))
        .route("/api/chat/delete-session/{session_id}", delete(delete_session))
        .route("/api/chat/add-snippet", post(add_snippet))
        .route("/api/populate/populate-from-hf", post(populate_from_hf))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn hello() -> &'static str {
    "Hello World"
}

async fn new_chat(
    State(state): State<AppState>,
    payload: Result<Json<NewChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatReply>), ApiError> {
    let Json(request) =
        payload.map_err(|err| bad_request(format!("Invalid JSON: {}", err.body_text())))?;
    let chat = state.chat.clone();
    let reply = blocking(move || chat.new_chat(request))
        .await?
        .map_err(chat_error)?;
    Ok((StatusCode::CREATED, Json(reply)))
}

async fn session_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    let chat = state.chat.clone();
    let messages = blocking(move || chat.session_messages(&session_id))
        .await?
        .map_err(chat_error)?;
    Ok(Json(messages))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<&'static str, ApiError> {
    let chat = state.chat.clone();
    blocking(move || chat.delete_session(&session_id))
        .await?
        .map_err(chat_error)?;
    Ok("Your session has been deleted!")
}

async fn add_snippet(
    State(state): State<AppState>,
    payload: Result<Json<AddSnippetRequest>, JsonRejection>,
) -> Result<Json<StatusBody>, ApiError> {
    let Json(request) =
        payload.map_err(|err| bad_request(format!("Invalid JSON: {}", err.body_text())))?;
    let chat = state.chat.clone();
    blocking(move || chat.add_snippet(&request.text, request.tags))
        .await?
        .map_err(chat_error)?;
    Ok(Json(StatusBody { status: "added" }))
}

async fn populate_from_hf(State(state): State<AppState>) -> Result<Json<PopulateBody>, ApiError> {
    let ingestor = state.ingestor.clone();
    let dataset = state.dataset.clone();
    let report = blocking(move || ingestor.run(dataset.as_ref()))
        .await?
        .map_err(|err| {
            error!(error = %err, "populate run failed");
            internal_error(err.to_string())
        })?;
    Ok(Json(PopulateBody {
        status: "success",
        loaded: report.loaded,
        processed: report.processed,
        pinecone_populated: true,
    }))
}

async fn blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| internal_error(format!("worker task failed: {err}")))
}

fn chat_error(err: ChatError) -> ApiError {
    match err {
        ChatError::EmptyRequest => bad_request(err.to_string()),
        other => {
            error!(error = %other, "chat request failed");
            internal_error(other.to_string())
        }
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn internal_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}
