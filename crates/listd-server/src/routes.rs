// ABOUTME: Route definitions for the listd HTTP API.
// ABOUTME: Assembles list and admin routes into a single Axum Router with shared state and request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/lists/{id}/append", post(api::lists::append))
        .route("/api/lists/{id}/items/{index}", get(api::lists::get_item))
        .route("/api/lists/{id}/remove", post(api::lists::remove))
        .route("/api/lists/{id}/size", get(api::lists::size))
        .route("/api/snapshot", post(api::admin::snapshot))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::AppState;
    use axum::body::Body;
    use http::Request;
    use listd_store::StorageLayout;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(dir: &tempfile::TempDir) -> SharedState {
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let (service, _) = layout.open_service().unwrap();
        Arc::new(AppState::new(Arc::new(service), layout.snapshots()))
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = create_router(test_state(&dir));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn snapshot_endpoint_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = test_state(&dir);
        state.service.append("a", 1).unwrap();

        let resp = create_router(Arc::clone(&state))
            .oneshot(Request::post("/api/snapshot").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert!(state.snapshots.path().exists());
    }
}
