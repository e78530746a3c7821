//! Simulation lifecycle: at most one emission loop at a time.
//!
//! [`SimulationController`] owns the `Idle`/`Running` state machine. On
//! start it spawns one Tokio task that, until stopped, generates a payload,
//! serializes it once, hands it to the [`BroadcastSink`], and waits for the
//! configured interval.
//!
//! # Stop semantics
//!
//! [`stop`](SimulationController::stop) raises the run's stop flag, wakes
//! the loop out of its interval sleep, and awaits the task before returning.
//! The controller lock stays held for the whole stop, so a `start` issued
//! concurrently waits for the old loop to exit and can never create a
//! second one.
//!
//! Nothing that happens inside a tick ends the loop. Serialization and
//! delivery failures are logged and the loop carries on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::generator::PayloadGenerator;
use crate::registry::Message;
use crate::sink::BroadcastSink;

/// Result of a [`SimulationController::start`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new loop was spawned.
    Started,
    /// A loop was already running; the request was ignored.
    AlreadyRunning,
}

/// Result of a [`SimulationController::stop`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The running loop exited after emitting `ticks` payloads.
    Stopped {
        /// Payloads emitted by the run.
        ticks: u64,
    },
    /// Nothing was running.
    NotRunning,
}

/// JSON-serializable view of the controller for the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Whether a loop is currently active.
    pub running: bool,
    /// Tag reads per payload of the active run.
    pub tag_count: Option<usize>,
    /// Interval of the active run in seconds.
    pub interval_seconds: Option<f64>,
    /// Webhook of the active run.
    pub webhook_url: Option<String>,
    /// Payloads emitted by the active (or most recent) run.
    pub ticks_emitted: u64,
}

/// Control block shared between the controller and one loop task.
#[derive(Debug, Default)]
struct RunControl {
    /// Set once by `stop`.
    stop_requested: AtomicBool,
    /// Wakes the loop out of its interval sleep.
    wake: Notify,
    /// Completed ticks.
    ticks: AtomicU64,
}

impl RunControl {
    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        // notify_one stores a permit if the loop is not parked yet.
        self.wake.notify_one();
    }

    fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    async fn wait_for_stop(&self) {
        while !self.is_stop_requested() {
            self.wake.notified().await;
        }
    }

    fn record_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }
}

/// The active run.
#[derive(Debug)]
struct ActiveRun {
    config: RunConfig,
    control: Arc<RunControl>,
    handle: JoinHandle<()>,
}

/// Owner of the simulation state machine.
///
/// Construct one per process and share it via [`Arc`].
pub struct SimulationController {
    generator: Arc<dyn PayloadGenerator>,
    run: Mutex<Option<ActiveRun>>,
    last_ticks: AtomicU64,
}

impl std::fmt::Debug for SimulationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationController")
            .field("last_ticks", &self.last_ticks)
            .finish_non_exhaustive()
    }
}

impl SimulationController {
    /// Create an idle controller that will use `generator` for every run.
    pub fn new(generator: Arc<dyn PayloadGenerator>) -> Self {
        Self {
            generator,
            run: Mutex::new(None),
            last_ticks: AtomicU64::new(0),
        }
    }

    /// Start a run unless one is already active.
    ///
    /// Returns immediately; the loop runs on its own task. Must be called
    /// from within a Tokio runtime.
    pub async fn start(&self, config: RunConfig, sink: BroadcastSink) -> StartOutcome {
        let mut guard = self.run.lock().await;

        if guard.as_ref().is_some_and(|run| !run.handle.is_finished()) {
            debug!("Start ignored, simulation already running");
            return StartOutcome::AlreadyRunning;
        }
        // A finished handle without a stop means the task died abnormally.
        if let Some(dead) = guard.take() {
            self.reap(dead).await;
        }

        let control = Arc::new(RunControl::default());
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.generator),
            config.clone(),
            sink,
            Arc::clone(&control),
        ));

        info!(
            tag_count = config.tag_count(),
            interval_ms = u64::try_from(config.interval().as_millis()).unwrap_or(u64::MAX),
            webhook = config.webhook_url().map(reqwest::Url::as_str),
            "Simulation started"
        );

        *guard = Some(ActiveRun {
            config,
            control,
            handle,
        });
        StartOutcome::Started
    }

    /// Stop the active run and wait for its task to exit.
    ///
    /// A no-op returning [`StopOutcome::NotRunning`] when idle.
    pub async fn stop(&self) -> StopOutcome {
        let mut guard = self.run.lock().await;
        let Some(run) = guard.take() else {
            debug!("Stop ignored, simulation not running");
            return StopOutcome::NotRunning;
        };

        run.control.request_stop();
        let ticks = self.reap(run).await;
        info!(ticks, "Simulation stopped");
        StopOutcome::Stopped { ticks }
    }

    /// Stop any active run. Used on process shutdown.
    pub async fn shutdown(&self) {
        if let StopOutcome::Stopped { ticks } = self.stop().await {
            info!(ticks, "Active simulation stopped for shutdown");
        }
    }

    /// Whether a loop is currently active.
    pub async fn is_running(&self) -> bool {
        self.run
            .lock()
            .await
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Snapshot of the current state.
    pub async fn status(&self) -> RunStatus {
        let guard = self.run.lock().await;
        match guard.as_ref() {
            Some(run) if !run.handle.is_finished() => RunStatus {
                running: true,
                tag_count: Some(run.config.tag_count()),
                interval_seconds: Some(run.config.interval().as_secs_f64()),
                webhook_url: run.config.webhook_url().map(ToString::to_string),
                ticks_emitted: run.control.ticks(),
            },
            Some(run) => RunStatus {
                running: false,
                tag_count: None,
                interval_seconds: None,
                webhook_url: None,
                ticks_emitted: run.control.ticks(),
            },
            None => RunStatus {
                running: false,
                tag_count: None,
                interval_seconds: None,
                webhook_url: None,
                ticks_emitted: self.last_ticks.load(Ordering::Acquire),
            },
        }
    }

    /// Await a run's task and record its tick count.
    async fn reap(&self, run: ActiveRun) -> u64 {
        if let Err(e) = run.handle.await {
            warn!(error = %e, "Simulation task terminated abnormally");
        }
        let ticks = run.control.ticks();
        self.last_ticks.store(ticks, Ordering::Release);
        ticks
    }
}

/// The emission loop of one run.
async fn run_loop(
    generator: Arc<dyn PayloadGenerator>,
    config: RunConfig,
    sink: BroadcastSink,
    control: Arc<RunControl>,
) {
    let interval: Duration = config.interval();

    while !control.is_stop_requested() {
        let payload = generator.generate(config.tag_count());

        match serde_json::to_string(&payload) {
            Ok(json) => {
                let message: Message = Arc::from(json);
                let summary = sink.deliver(&message).await;
                let tick = control.record_tick();
                debug!(
                    tick,
                    tag_reads = payload.len(),
                    sinks_ok = summary.succeeded,
                    sinks_failed = summary.failed,
                    "Tick emitted"
                );
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize reader payload, skipping tick");
            }
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = control.wait_for_stop() => {}
        }
    }

    debug!(ticks = control.ticks(), "Simulation loop exited");
}
