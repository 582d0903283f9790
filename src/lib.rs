pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formatter;
pub mod handlers;
pub mod models;
pub mod secrets;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

use state::AppState;

pub use extract::{extract_json, extract_json_as, extract_json_from_value, extract_json_opt, Extraction};

/// Build the application router with the given state.
/// Kept out of `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(handlers::health))
        .route("/api/health/ready", get(handlers::readiness))
        // Utilities
        .route("/api/extract", post(handlers::extract))
        .route("/api/fetch", post(handlers::fetch))
        .route("/api/format", post(handlers::format))
        .route("/api/secrets/{secret_id}", get(handlers::secret_check))
        .with_state(state)
}
