// ABOUTME: Shared application state for the listd HTTP server.
// ABOUTME: Holds the live ListService and the snapshot store used by the on-demand snapshot endpoint.

use std::sync::Arc;

use listd_store::{ListService, SnapshotStore};

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub service: Arc<ListService>,
    pub snapshots: SnapshotStore,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(service: Arc<ListService>, snapshots: SnapshotStore) -> Self {
        Self { service, snapshots }
    }
}
