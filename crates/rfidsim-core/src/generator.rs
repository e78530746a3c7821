//! Synthetic tag-read generation.
//!
//! The simulation loop asks a [`PayloadGenerator`] for one
//! [`ReaderPayload`] per tick. [`SimulatedReader`] is the built-in
//! implementation: it reports a fixed reader identity and draws every tag
//! field uniformly from the configured [`TagRangesConfig`].

use rand::Rng;
use rand::distr::uniform::SampleUniform;
use rfidsim_types::{ReadTimestamp, ReaderPayload, TagRead};

use crate::config::{FieldRange, ReaderConfig, SimulatorConfig, TagRangesConfig};

/// Largest EPC value: 24 hex digits, 96 bits.
const EPC_MAX: u128 = (1_u128 << 96) - 1;

/// Phase angle reported by the FX9600 for every read.
const PHASE: &str = "0.00";

/// A source of reader payloads.
///
/// Implementations must be cheap to call once per tick and produce exactly
/// `tag_count` reads. Generation cannot fail.
pub trait PayloadGenerator: Send + Sync {
    /// Produce one payload carrying `tag_count` tag reads.
    fn generate(&self, tag_count: usize) -> ReaderPayload;
}

/// Identity pair stamped on every payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderIdentity {
    /// Reader display name.
    pub reader_name: String,
    /// Reader hardware address.
    pub mac_address: String,
}

impl From<&ReaderConfig> for ReaderIdentity {
    fn from(config: &ReaderConfig) -> Self {
        Self {
            reader_name: config.reader_name.clone(),
            mac_address: config.mac_address.clone(),
        }
    }
}

impl Default for ReaderIdentity {
    fn default() -> Self {
        Self::from(&ReaderConfig::default())
    }
}

/// The built-in simulated reader.
#[derive(Debug, Clone, Default)]
pub struct SimulatedReader {
    identity: ReaderIdentity,
    ranges: TagRangesConfig,
}

impl SimulatedReader {
    /// Create a reader with the given identity and field ranges.
    pub const fn new(identity: ReaderIdentity, ranges: TagRangesConfig) -> Self {
        Self { identity, ranges }
    }

    /// Create a reader from the `reader` and `tags` config sections.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        Self::new(ReaderIdentity::from(&config.reader), config.tags.clone())
    }

    /// The identity this reader reports.
    pub const fn identity(&self) -> &ReaderIdentity {
        &self.identity
    }

    /// Generate a payload using the supplied random source.
    pub fn generate_with<R: Rng + ?Sized>(&self, tag_count: usize, rng: &mut R) -> ReaderPayload {
        let tag_reads = (0..tag_count).map(|_| self.tag_read(rng)).collect();
        ReaderPayload {
            reader_name: self.identity.reader_name.clone(),
            mac_address: self.identity.mac_address.clone(),
            tag_reads,
        }
    }

    /// Generate a single tag read.
    pub fn tag_read<R: Rng + ?Sized>(&self, rng: &mut R) -> TagRead {
        TagRead {
            epc: random_epc(rng),
            pc: self.ranges.pc.clone(),
            antenna_port: sample(self.ranges.antenna_port, rng),
            peak_rssi: sample(self.ranges.peak_rssi, rng),
            seen_count: sample(self.ranges.seen_count, rng),
            timestamp: ReadTimestamp::now(),
            phase: PHASE.to_owned(),
            channel_index: sample(self.ranges.channel_index, rng),
            is_heartbeat: false,
        }
    }
}

impl PayloadGenerator for SimulatedReader {
    fn generate(&self, tag_count: usize) -> ReaderPayload {
        let mut rng = rand::rng();
        self.generate_with(tag_count, &mut rng)
    }
}

/// Draw uniformly from `range`, tolerating inverted bounds.
fn sample<T, R>(range: FieldRange<T>, rng: &mut R) -> T
where
    T: SampleUniform + PartialOrd + Copy,
    R: Rng + ?Sized,
{
    let (low, high) = if range.is_ordered() {
        (range.min, range.max)
    } else {
        (range.max, range.min)
    };
    rng.random_range(low..=high)
}

/// A uniformly random 96-bit EPC as 24 upper-case hex digits.
fn random_epc<R: Rng + ?Sized>(rng: &mut R) -> String {
    let value: u128 = rng.random_range(0..=EPC_MAX);
    format!("{value:024X}")
}
