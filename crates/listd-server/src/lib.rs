// ABOUTME: HTTP server for listd, exposing the durable list operations as a small REST API.
// ABOUTME: Uses Axum with a shared ListService; all store calls run on the blocking pool.

pub mod api;
pub mod app_state;
pub mod config;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, ListdConfig};
pub use routes::create_router;
