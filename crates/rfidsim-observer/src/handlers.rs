//! REST handlers for simulation control.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/start_simulation` | Start emitting payloads |
//! | `POST` | `/api/stop_simulation` | Stop the running simulation |
//! | `GET` | `/api/simulation_status` | Current run and subscriber count |
//! | `GET` | `/health` | Liveness probe |
//!
//! Start and stop are idempotent: repeating either one answers `200` with
//! a status string describing what happened.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use reqwest::Url;
use rfidsim_core::config::RunConfig;
use rfidsim_core::controller::{RunStatus, StartOutcome, StopOutcome};
use rfidsim_core::sink::{BroadcastSink, WebhookSink};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/start_simulation`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartRequest {
    /// Tag reads per payload.
    #[validate(range(min = 1))]
    pub tag_count: usize,
    /// Seconds between payloads.
    #[validate(range(exclusive_min = 0.0))]
    pub interval: f64,
    /// Optional `http`/`https` URL receiving a copy of every payload.
    /// An empty string counts as absent.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl StartRequest {
    /// Validate the body and turn it into a [`RunConfig`] allowing at most
    /// `max_tag_count` reads per payload.
    ///
    /// # Errors
    ///
    /// Returns [`ObserverError::InvalidRequest`] for range or URL
    /// violations and [`ObserverError::RunConfig`] for a `tag_count` over
    /// the limit or an interval that does not fit a
    /// [`Duration`](std::time::Duration).
    pub fn into_run_config(self, max_tag_count: usize) -> Result<RunConfig, ObserverError> {
        self.validate()?;
        let webhook_url = self
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(parse_webhook_url)
            .transpose()?;
        Ok(RunConfig::from_secs_f64(
            self.tag_count,
            self.interval,
            webhook_url,
            max_tag_count,
        )?)
    }
}

/// Body of the start and stop responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// Human-readable outcome.
    pub status: String,
}

impl ControlResponse {
    fn new(status: &str) -> Json<Self> {
        Json(Self {
            status: status.to_owned(),
        })
    }
}

/// Body of `GET /api/simulation_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatus {
    /// The controller's view of the current run.
    #[serde(flatten)]
    pub run: RunStatus,
    /// Connected `WebSocket` subscribers.
    pub subscribers: usize,
}

fn parse_webhook_url(raw: &str) -> Result<Url, ObserverError> {
    let url = Url::parse(raw)
        .map_err(|e| ObserverError::InvalidRequest(format!("webhook_url: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ObserverError::InvalidRequest(format!(
            "webhook_url: unsupported scheme {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// POST /api/start_simulation
// ---------------------------------------------------------------------------

/// Start the simulation, or report that it is already running.
pub async fn start_simulation(
    State(state): State<Arc<AppState>>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ObserverError> {
    let Json(request) = body?;
    let config = request.into_run_config(state.max_tag_count)?;

    let mut sink = BroadcastSink::new(Arc::clone(&state.registry));
    if let Some(url) = config.webhook_url() {
        let webhook = WebhookSink::new(url.clone(), state.webhook_timeout)
            .map_err(|e| ObserverError::Internal(e.to_string()))?;
        sink = sink.with_webhook(webhook);
    }

    let response = match state.controller.start(config, sink).await {
        StartOutcome::Started => ControlResponse::new("Simulation started"),
        StartOutcome::AlreadyRunning => {
            info!("Start requested while running");
            ControlResponse::new("Simulation already running")
        }
    };
    Ok(response)
}

// ---------------------------------------------------------------------------
// POST /api/stop_simulation
// ---------------------------------------------------------------------------

/// Stop the simulation and wait for its loop to exit.
pub async fn stop_simulation(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.controller.stop().await {
        StopOutcome::Stopped { .. } => ControlResponse::new("Simulation stopped"),
        StopOutcome::NotRunning => ControlResponse::new("Simulation not running"),
    }
}

// ---------------------------------------------------------------------------
// GET /api/simulation_status
// ---------------------------------------------------------------------------

/// Report whether a run is active, its parameters, and the subscriber count.
pub async fn simulation_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let run = state.controller.status().await;
    Json(SimulationStatus {
        run,
        subscribers: state.registry.len(),
    })
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
