//! Payload generation, subscriber fan-out, and simulation lifecycle for the
//! RFID reader simulator.
//!
//! One simulation run is a loop that, every interval, asks a generator for
//! a reader payload and hands the serialized JSON to a broadcast sink. The
//! sink pushes it to every connected subscriber and, optionally, to a
//! webhook.
//!
//! # Modules
//!
//! - [`config`] -- Loading `rfidsim-config.yaml` plus the per-run
//!   [`RunConfig`](config::RunConfig).
//! - [`generator`] -- [`PayloadGenerator`] trait and the built-in
//!   [`SimulatedReader`].
//! - [`registry`] -- [`SubscriberRegistry`], the thread-safe set of live
//!   connections.
//! - [`sink`] -- [`BroadcastSink`]: subscribers plus an optional webhook.
//! - [`controller`] -- [`SimulationController`], the idle/running state
//!   machine.
//!
//! [`PayloadGenerator`]: generator::PayloadGenerator
//! [`SimulatedReader`]: generator::SimulatedReader
//! [`SubscriberRegistry`]: registry::SubscriberRegistry
//! [`BroadcastSink`]: sink::BroadcastSink
//! [`SimulationController`]: controller::SimulationController

pub mod config;
pub mod controller;
pub mod generator;
pub mod registry;
pub mod sink;
