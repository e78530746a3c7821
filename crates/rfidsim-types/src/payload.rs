//! Reader payloads as they appear on the wire.
//!
//! A [`ReaderPayload`] is one batch of tag reads emitted per simulation
//! tick. It is serialized once and the identical JSON text goes to every
//! `WebSocket` subscriber and to the webhook.
//!
//! Tag-read fields keep their native Rust types but serialize the way the
//! simulated device reports them: camel-case keys with every value rendered
//! as a JSON string.

use serde::{Deserialize, Serialize};

use crate::timestamp::ReadTimestamp;

/// One batch of simulated tag reads from a single reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderPayload {
    /// Human-readable reader name (e.g. `FX9600FB37EE FX9600 RFID Reader`).
    pub reader_name: String,
    /// Reader hardware address (e.g. `84:24:8D:EF:B2:F6`).
    pub mac_address: String,
    /// Tag reads in generation order.
    pub tag_reads: Vec<TagRead>,
}

impl ReaderPayload {
    /// Number of tag reads in this batch.
    pub fn len(&self) -> usize {
        self.tag_reads.len()
    }

    /// Whether this batch carries no tag reads.
    pub fn is_empty(&self) -> bool {
        self.tag_reads.is_empty()
    }
}

/// A single simulated detection of a tag by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRead {
    /// Electronic Product Code, 24 upper-case hex digits.
    pub epc: String,
    /// Protocol-control word reported by the reader.
    pub pc: String,
    /// Antenna port that saw the tag.
    #[serde(with = "crate::wire::as_string")]
    pub antenna_port: u8,
    /// Peak received signal strength in dBm.
    #[serde(with = "crate::wire::as_string")]
    pub peak_rssi: i32,
    /// How many times the tag was seen in this read cycle.
    #[serde(with = "crate::wire::as_string")]
    pub seen_count: u32,
    /// Local time of the read.
    #[serde(rename = "timeStamp")]
    pub timestamp: ReadTimestamp,
    /// RF phase angle, always `0.00` on this reader model.
    pub phase: String,
    /// Channel index the read happened on.
    #[serde(with = "crate::wire::as_string")]
    pub channel_index: u8,
    /// Whether this entry is a heartbeat rather than a real read.
    #[serde(rename = "isHeartBeat", with = "crate::wire::as_string")]
    pub is_heartbeat: bool,
}
