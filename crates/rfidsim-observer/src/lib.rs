//! Control API server for the RFID reader simulator.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/tags`) streaming every reader payload
//!   to connected clients via the core [`SubscriberRegistry`]
//! - **Control endpoints** to start, stop, and inspect the simulation
//! - **Health endpoint** (`/health`) for liveness probes
//!
//! Handlers never touch simulation internals directly: start and stop go
//! through the shared [`SimulationController`], and `WebSocket`
//! connections register and unregister themselves with the registry.
//!
//! [`SubscriberRegistry`]: rfidsim_core::registry::SubscriberRegistry
//! [`SimulationController`]: rfidsim_core::controller::SimulationController

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::ServerError;
pub use startup::{RunningServer, StartupError, spawn_observer};
pub use state::AppState;
