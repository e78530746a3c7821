//! Shared type definitions for the RFID reader simulator.
//!
//! This crate is the single source of truth for the payloads the simulated
//! reader emits. The same JSON produced from these types is pushed to
//! `WebSocket` subscribers and POSTed to the optional webhook.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for identifiers
//! - [`payload`] -- [`ReaderPayload`] and [`TagRead`] with the device's wire encoding
//! - [`timestamp`] -- [`ReadTimestamp`], the reader's `D/M/YYYY H:M:S:mmm` clock format

pub mod ids;
pub mod payload;
pub mod timestamp;

mod wire;

// Re-export all public types at crate root for convenience.
pub use ids::SubscriberId;
pub use payload::{ReaderPayload, TagRead};
pub use timestamp::{ReadTimestamp, TimestampParseError};
