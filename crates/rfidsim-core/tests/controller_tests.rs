//! Integration tests for the simulation lifecycle.
//!
//! Runs use real timers with short intervals. Webhook delivery is checked
//! against a throwaway Axum listener bound to `127.0.0.1:0`.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::post;
use reqwest::Url;
use rfidsim_core::config::RunConfig;
use rfidsim_core::controller::{SimulationController, StartOutcome, StopOutcome};
use rfidsim_core::generator::{PayloadGenerator, SimulatedReader};
use rfidsim_core::registry::SubscriberRegistry;
use rfidsim_core::sink::{BroadcastSink, WebhookSink};
use serde_json::Value;
use tokio::sync::mpsc;

fn controller() -> SimulationController {
    SimulationController::new(Arc::new(SimulatedReader::default()) as Arc<dyn PayloadGenerator>)
}

fn run(tag_count: usize, interval_ms: u64) -> RunConfig {
    RunConfig::new(tag_count, Duration::from_millis(interval_ms), None).unwrap()
}

/// Bind a listener that accepts connections and never answers them.
async fn spawn_silent_listener() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    Url::parse(&format!("http://{addr}/hook")).unwrap()
}

/// Bind a local webhook receiver that forwards every body to a channel.
async fn spawn_webhook_receiver() -> (Url, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let app = Router::new().route(
        "/hook",
        post(move |body: String| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(body);
                "ok"
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let url = Url::parse(&format!("http://{addr}/hook")).unwrap();
    (url, rx)
}

#[tokio::test]
async fn subscriber_receives_payloads_while_running() {
    let registry = Arc::new(SubscriberRegistry::new());
    let (_id, mut rx) = registry.connect();
    let controller = controller();

    let outcome = controller
        .start(run(3, 10), BroadcastSink::new(Arc::clone(&registry)))
        .await;
    assert_eq!(outcome, StartOutcome::Started);

    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.stop().await;

    let mut received = Vec::new();
    while let Ok(message) = rx.try_recv() {
        received.push(message);
    }
    assert!(received.len() >= 3, "only {} payloads", received.len());

    let payload: Value = serde_json::from_str(&received[0]).unwrap();
    assert_eq!(payload["reader_name"], "FX9600FB37EE FX9600 RFID Reader");
    assert_eq!(payload["mac_address"], "84:24:8D:EF:B2:F6");
    assert_eq!(payload["tag_reads"].as_array().unwrap().len(), 3);
    assert_eq!(payload["tag_reads"][0]["isHeartBeat"], "false");
}

#[tokio::test]
async fn double_start_creates_one_loop() {
    let registry = Arc::new(SubscriberRegistry::new());
    let (_id, mut rx) = registry.connect();
    let controller = controller();

    let first = controller
        .start(run(1, 50), BroadcastSink::new(Arc::clone(&registry)))
        .await;
    let second = controller
        .start(run(1, 50), BroadcastSink::new(Arc::clone(&registry)))
        .await;
    assert_eq!(first, StartOutcome::Started);
    assert_eq!(second, StartOutcome::AlreadyRunning);

    // One loop at 50ms over ~120ms emits about 3 payloads; two loops would
    // roughly double that.
    tokio::time::sleep(Duration::from_millis(120)).await;
    let StopOutcome::Stopped { ticks } = controller.stop().await else {
        panic!("expected a running simulation");
    };

    let mut received = 0_u64;
    while rx.try_recv().is_ok() {
        received += 1;
    }
    assert_eq!(received, ticks);
    assert!((1..=4).contains(&ticks), "unexpected tick count {ticks}");
}

#[tokio::test]
async fn stop_when_idle_reports_not_running() {
    let controller = controller();
    assert_eq!(controller.stop().await, StopOutcome::NotRunning);
}

#[tokio::test]
async fn stop_then_start_runs_again() {
    let registry = Arc::new(SubscriberRegistry::new());
    let controller = controller();

    controller
        .start(run(1, 10), BroadcastSink::new(Arc::clone(&registry)))
        .await;
    assert!(matches!(controller.stop().await, StopOutcome::Stopped { .. }));

    let (_id, mut rx) = registry.connect();
    let outcome = controller
        .start(run(2, 10), BroadcastSink::new(Arc::clone(&registry)))
        .await;
    assert_eq!(outcome, StartOutcome::Started);

    let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let payload: Value = serde_json::from_str(&message).unwrap();
    assert_eq!(payload["tag_reads"].as_array().unwrap().len(), 2);

    controller.shutdown().await;
    assert!(!controller.is_running().await);
}

#[tokio::test]
async fn nothing_is_emitted_after_stop() {
    let registry = Arc::new(SubscriberRegistry::new());
    let (_id, mut rx) = registry.connect();
    let controller = controller();

    controller
        .start(run(1, 5), BroadcastSink::new(Arc::clone(&registry)))
        .await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    controller.stop().await;

    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn webhook_receives_same_payload_as_subscribers() {
    let (url, mut hook_rx) = spawn_webhook_receiver().await;
    let registry = Arc::new(SubscriberRegistry::new());
    let (_id, mut sub_rx) = registry.connect();

    let sink = BroadcastSink::new(Arc::clone(&registry))
        .with_webhook(WebhookSink::new(url, Duration::from_secs(2)).unwrap());
    let controller = controller();
    controller.start(run(2, 1_000), sink).await;

    let posted = tokio::time::timeout(Duration::from_secs(2), hook_rx.recv())
        .await
        .unwrap()
        .unwrap();
    controller.stop().await;

    let pushed = sub_rx.try_recv().unwrap();
    assert_eq!(posted, &*pushed);
    let payload: Value = serde_json::from_str(&posted).unwrap();
    assert_eq!(payload["tag_reads"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unreachable_webhook_does_not_stall_subscribers() {
    let registry = Arc::new(SubscriberRegistry::new());
    let (_id, mut rx) = registry.connect();
    let webhook = WebhookSink::new(
        Url::parse("http://127.0.0.1:1/hook").unwrap(),
        Duration::from_millis(200),
    )
    .unwrap();

    let controller = controller();
    controller
        .start(
            run(1, 10),
            BroadcastSink::new(Arc::clone(&registry)).with_webhook(webhook),
        )
        .await;

    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
    }
    assert!(controller.is_running().await);
    controller.stop().await;
}

#[tokio::test]
async fn silent_webhook_is_cut_off_by_timeout() {
    let registry = Arc::new(SubscriberRegistry::new());
    let (_id, mut rx) = registry.connect();
    let timeout = Duration::from_millis(100);
    let webhook = WebhookSink::new(spawn_silent_listener().await, timeout).unwrap();

    let controller = controller();
    controller
        .start(
            run(1, 10),
            BroadcastSink::new(Arc::clone(&registry)).with_webhook(webhook),
        )
        .await;

    // Each tick waits out the webhook timeout before sleeping its interval.
    let mut arrivals = Vec::new();
    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        arrivals.push(tokio::time::Instant::now());
    }
    let spread = arrivals[2] - arrivals[0];
    assert!(spread >= Duration::from_millis(150), "ticks too fast: {spread:?}");
    assert!(spread < Duration::from_secs(2), "ticks stalled: {spread:?}");
    assert!(controller.is_running().await);

    // A stop issued mid-post returns once the in-flight request times out.
    let outcome = tokio::time::timeout(timeout * 4, controller.stop())
        .await
        .unwrap();
    assert!(matches!(outcome, StopOutcome::Stopped { .. }));
}
