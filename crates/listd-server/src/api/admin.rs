// ABOUTME: Administrative handlers that act on the store as a whole.
// ABOUTME: Currently an on-demand snapshot, useful before planned restarts.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::app_state::SharedState;

/// POST /api/snapshot - Persist the current store immediately.
pub async fn snapshot(State(state): State<SharedState>) -> Response {
    let service = Arc::clone(&state.service);
    let snapshots = state.snapshots.clone();
    let result = tokio::task::spawn_blocking(move || service.snapshot(&snapshots)).await;

    match result {
        Ok(Ok(watermark)) => Json(serde_json::json!({ "watermark": watermark.to_rfc3339() })).into_response(),
        Ok(Err(e)) => {
            tracing::warn!("on-demand snapshot failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("snapshot failed: {}", e) })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!("snapshot task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}
