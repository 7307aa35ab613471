// ABOUTME: List operation handlers: append, get, remove, and size.
// ABOUTME: Maps ListError variants to HTTP status codes and runs journaled store calls off the async runtime.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use listd_core::ListError;
use listd_store::ListService;
use serde::{Deserialize, Serialize};

use crate::app_state::SharedState;

/// Request body for appending a value.
#[derive(Debug, Deserialize, Serialize)]
pub struct AppendRequest {
    pub value: i64,
}

fn status_for(err: &ListError) -> StatusCode {
    match err {
        ListError::ListNotFound(_) => StatusCode::NOT_FOUND,
        ListError::IndexOutOfRange { .. } => StatusCode::BAD_REQUEST,
        ListError::EmptyList(_) => StatusCode::CONFLICT,
        ListError::InvalidListId(_) => StatusCode::BAD_REQUEST,
    }
}

fn error_response(err: ListError) -> Response {
    (
        status_for(&err),
        Json(serde_json::json!({ "error": err.to_string(), "kind": err.kind() })),
    )
        .into_response()
}

/// Run a journaled service call on the blocking pool; every call may fsync.
async fn run<T, F>(state: &SharedState, op: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce(&ListService) -> Result<T, ListError> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || op(&service)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(error_response(e)),
        Err(e) => {
            tracing::error!("list operation task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal error" })),
            )
                .into_response())
        }
    }
}

/// POST /api/lists/{id}/append - Append a value, creating the list if needed.
pub async fn append(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<AppendRequest>,
) -> Response {
    match run(&state, move |svc| svc.append(&id, req.value)).await {
        Ok(ok) => Json(serde_json::json!({ "ok": ok })).into_response(),
        Err(resp) => resp,
    }
}

/// GET /api/lists/{id}/items/{index} - Read one element.
pub async fn get_item(
    State(state): State<SharedState>,
    Path((id, index)): Path<(String, i64)>,
) -> Response {
    match run(&state, move |svc| svc.get(&id, index)).await {
        Ok(value) => Json(serde_json::json!({ "value": value })).into_response(),
        Err(resp) => resp,
    }
}

/// POST /api/lists/{id}/remove - Pop the last element.
pub async fn remove(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match run(&state, move |svc| svc.remove(&id)).await {
        Ok(value) => Json(serde_json::json!({ "value": value })).into_response(),
        Err(resp) => resp,
    }
}

/// GET /api/lists/{id}/size - Number of elements.
pub async fn size(State(state): State<SharedState>, Path(id): Path<String>) -> Response {
    match run(&state, move |svc| svc.size(&id)).await {
        Ok(size) => Json(serde_json::json!({ "size": size })).into_response(),
        Err(resp) => resp,
    }
}
