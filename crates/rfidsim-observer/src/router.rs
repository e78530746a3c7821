//! Axum router construction for the control API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS and HTTP tracing middleware.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the control API.
///
/// The router includes:
/// - `GET /ws/tags` -- `WebSocket` tag stream
/// - `POST /api/start_simulation` -- start emitting payloads
/// - `POST /api/stop_simulation` -- stop emitting payloads
/// - `GET /api/simulation_status` -- current run status
/// - `GET /health` -- liveness probe
///
/// CORS allows the origins listed in [`AppState::allowed_origins`], or any
/// origin when that list is empty.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&state.allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // WebSocket
        .route("/ws/tags", get(ws::ws_tags))
        // Control API
        .route("/api/start_simulation", post(handlers::start_simulation))
        .route("/api/stop_simulation", post(handlers::stop_simulation))
        .route("/api/simulation_status", get(handlers::simulation_status))
        .route("/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() {
        return AllowOrigin::any();
    }
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = origin.as_str(), error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(values)
}
