//! Integration tests for the control API endpoints.
//!
//! Most tests drive the Axum `Router` directly via `tower::ServiceExt`
//! without starting a TCP server. One test spawns the real server on an
//! ephemeral port.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use rfidsim_core::config::ServerConfig;
use rfidsim_core::controller::SimulationController;
use rfidsim_core::generator::{PayloadGenerator, SimulatedReader};
use rfidsim_core::registry::SubscriberRegistry;
use rfidsim_observer::router::build_router;
use rfidsim_observer::state::AppState;
use rfidsim_observer::startup::spawn_observer;
use rfidsim_types::ReaderPayload;
use serde_json::{Value, json};
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    let registry = Arc::new(SubscriberRegistry::new());
    let generator: Arc<dyn PayloadGenerator> = Arc::new(SimulatedReader::default());
    let controller = Arc::new(SimulationController::new(generator));
    Arc::new(AppState::new(registry, controller).with_webhook_timeout(Duration::from_millis(200)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = build_router(make_test_state());
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let state = make_test_state();
    let app = build_router(Arc::clone(&state));
    let start = json!({ "tag_count": 2, "interval": 0.05 });

    let (status, body) = send(&app, post_json("/api/start_simulation", &start)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Simulation started");

    let (status, body) = send(&app, post_json("/api/start_simulation", &start)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Simulation already running");

    let (status, body) = send(&app, post_empty("/api/stop_simulation")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Simulation stopped");

    let (status, body) = send(&app, post_empty("/api/stop_simulation")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Simulation not running");

    assert!(!state.controller.is_running().await);
}

#[tokio::test]
async fn subscribers_receive_payloads_after_start() {
    let state = make_test_state();
    let app = build_router(Arc::clone(&state));
    let (_id, mut rx) = state.registry.connect();

    let start = json!({ "tag_count": 4, "interval": 0.01, "webhook_url": null });
    let (status, _) = send(&app, post_json("/api/start_simulation", &start)).await;
    assert_eq!(status, StatusCode::OK);

    let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let payload: ReaderPayload = serde_json::from_str(&message).unwrap();
    assert_eq!(payload.len(), 4);

    send(&app, post_empty("/api/stop_simulation")).await;
}

#[tokio::test]
async fn invalid_start_bodies_are_rejected() {
    let state = make_test_state();
    let app = build_router(Arc::clone(&state));

    for body in [
        json!({ "tag_count": 0, "interval": 1.0 }),
        json!({ "tag_count": 1, "interval": 0 }),
        json!({ "tag_count": 1, "interval": -0.5 }),
        json!({ "tag_count": 1, "interval": 1.0, "webhook_url": "not a url" }),
    ] {
        let (status, response) = send(&app, post_json("/api/start_simulation", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(response["status"], 400);
        assert!(response["error"].is_string());
    }

    assert!(!state.controller.is_running().await);
}

#[tokio::test]
async fn tag_count_over_limit_is_rejected() {
    let registry = Arc::new(SubscriberRegistry::new());
    let generator: Arc<dyn PayloadGenerator> = Arc::new(SimulatedReader::default());
    let controller = Arc::new(SimulationController::new(generator));
    let state = Arc::new(AppState::new(registry, controller).with_max_tag_count(10));
    let app = build_router(Arc::clone(&state));

    let body = json!({ "tag_count": 11, "interval": 1.0 });
    let (status, response) = send(&app, post_json("/api/start_simulation", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["status"], 400);
    assert!(response["error"].as_str().unwrap().contains("limit of 10"));
    assert!(!state.controller.is_running().await);

    // The default limit applies when none is configured.
    let app = build_router(make_test_state());
    let body = json!({ "tag_count": 10_001, "interval": 1.0 });
    let (status, _) = send(&app, post_json("/api/start_simulation", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = json!({ "tag_count": 10, "interval": 1.0 });
    let (status, _) = send(&app, post_json("/api/start_simulation", &body)).await;
    assert_eq!(status, StatusCode::OK);
    send(&app, post_empty("/api/stop_simulation")).await;
}

#[tokio::test]
async fn malformed_json_is_a_client_error() {
    let app = build_router(make_test_state());

    let request = Request::post("/api/start_simulation")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ tag_count: "))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert!(status.is_client_error());
    assert_eq!(body["status"], status.as_u16());

    let (status, _) = send(
        &app,
        post_json("/api/start_simulation", &json!({ "interval": 1.0 })),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn empty_webhook_url_is_treated_as_absent() {
    let state = make_test_state();
    let app = build_router(Arc::clone(&state));

    let start = json!({ "tag_count": 1, "interval": 1.0, "webhook_url": "" });
    let (status, _) = send(&app, post_json("/api/start_simulation", &start)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/api/simulation_status")).await;
    assert_eq!(body["running"], true);
    assert_eq!(body["webhook_url"], Value::Null);

    send(&app, post_empty("/api/stop_simulation")).await;
}

#[tokio::test]
async fn status_reports_run_and_subscribers() {
    let state = make_test_state();
    let app = build_router(Arc::clone(&state));

    let (_, idle) = send(&app, get("/api/simulation_status")).await;
    assert_eq!(idle["running"], false);
    assert_eq!(idle["subscribers"], 0);

    let (_a, _rx_a) = state.registry.connect();
    let (_b, _rx_b) = state.registry.connect();
    let start = json!({
        "tag_count": 5,
        "interval": 2.0,
        "webhook_url": "http://127.0.0.1:1/hook",
    });
    send(&app, post_json("/api/start_simulation", &start)).await;

    let (status, running) = send(&app, get("/api/simulation_status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(running["running"], true);
    assert_eq!(running["tag_count"], 5);
    assert_eq!(running["interval_seconds"], 2.0);
    assert_eq!(running["webhook_url"], "http://127.0.0.1:1/hook");
    assert_eq!(running["subscribers"], 2);

    send(&app, post_empty("/api/stop_simulation")).await;
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = build_router(make_test_state());
    let response = app.oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn spawned_server_answers_over_tcp() {
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
        ..ServerConfig::default()
    };
    let server = spawn_observer(&config, make_test_state()).await.unwrap();

    let body: Value = reqwest::get(format!("http://{}/health", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    server.handle.abort();
}
