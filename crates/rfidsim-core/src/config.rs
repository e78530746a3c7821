//! Configuration loading and typed config structures for the simulator.
//!
//! Two kinds of configuration live here:
//!
//! - [`SimulatorConfig`] mirrors `rfidsim-config.yaml` and is loaded once at
//!   process start (server address, reader identity, tag field ranges,
//!   webhook timeout, logging).
//! - [`RunConfig`] is the per-run configuration supplied with each start
//!   request. It is validated on construction and immutable afterwards.

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

/// Default upper bound on tag reads per payload.
pub const DEFAULT_MAX_TAG_COUNT: usize = 10_000;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A tag field range has `min` greater than `max`.
    #[error("invalid range for tags.{field}: min {min} > max {max}")]
    InvalidRange {
        /// The offending field name.
        field: &'static str,
        /// Configured lower bound.
        min: i64,
        /// Configured upper bound.
        max: i64,
    },

    /// `tags.max_tag_count` was zero.
    #[error("tags.max_tag_count must be at least 1")]
    ZeroTagLimit,

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv {
        /// Environment variable name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulator configuration.
///
/// Mirrors the structure of `rfidsim-config.yaml`. Every section and field
/// has a default, so an empty file (or no file) is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulatorConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity the simulated reader reports.
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Value ranges for generated tag fields.
    #[serde(default)]
    pub tags: TagRangesConfig,

    /// Webhook delivery settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulatorConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `RFIDSIM_HOST` overrides `server.host`
    /// - `RFIDSIM_PORT` overrides `server.port`
    /// - `RFIDSIM_WEBHOOK_TIMEOUT_MS` overrides `webhook.timeout_ms`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, and
    /// [`ConfigError::InvalidRange`] / [`ConfigError::InvalidEnv`] if the
    /// resulting values are unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// See [`from_file`](Self::from_file).
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for when no file exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if an override does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse("")
    }

    /// Parse a YAML string without consulting the environment.
    ///
    /// An empty document yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides using `lookup` to resolve variable names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if a numeric override does not
    /// parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("RFIDSIM_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("RFIDSIM_PORT") {
            self.server.port = port.parse().map_err(|_parse_err| ConfigError::InvalidEnv {
                name: "RFIDSIM_PORT",
                value: port.clone(),
            })?;
        }
        if let Some(ms) = lookup("RFIDSIM_WEBHOOK_TIMEOUT_MS") {
            self.webhook.timeout_ms =
                ms.parse().map_err(|_parse_err| ConfigError::InvalidEnv {
                    name: "RFIDSIM_WEBHOOK_TIMEOUT_MS",
                    value: ms.clone(),
                })?;
        }
        Ok(())
    }

    /// Check cross-field invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRange`] for the first inverted range and
    /// [`ConfigError::ZeroTagLimit`] for a zero `tags.max_tag_count`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tags.validate()
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed to call the API from a browser.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Identity the simulated reader reports in every payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReaderConfig {
    /// Reader display name.
    #[serde(default = "default_reader_name")]
    pub reader_name: String,

    /// Reader hardware address.
    #[serde(default = "default_mac_address")]
    pub mac_address: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            reader_name: default_reader_name(),
            mac_address: default_mac_address(),
        }
    }
}

/// Inclusive `min..=max` range for a generated tag field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FieldRange<T> {
    /// Smallest value generated.
    pub min: T,
    /// Largest value generated.
    pub max: T,
}

impl<T: PartialOrd + Copy> FieldRange<T> {
    /// Create a range from its bounds.
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Whether `min <= max`.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// Value ranges for the generated tag fields.
///
/// Defaults reproduce the FX9600 reader the simulator imitates.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagRangesConfig {
    /// Protocol-control word reported with every read.
    #[serde(default = "default_pc")]
    pub pc: String,

    /// Antenna port numbers.
    #[serde(default = "default_antenna_port")]
    pub antenna_port: FieldRange<u8>,

    /// Peak RSSI in dBm.
    #[serde(default = "default_peak_rssi")]
    pub peak_rssi: FieldRange<i32>,

    /// Seen count per read.
    #[serde(default = "default_seen_count")]
    pub seen_count: FieldRange<u32>,

    /// Channel index.
    #[serde(default = "default_channel_index")]
    pub channel_index: FieldRange<u8>,

    /// Largest `tag_count` a start request may ask for.
    #[serde(default = "default_max_tag_count")]
    pub max_tag_count: usize,
}

impl TagRangesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_range("antenna_port", self.antenna_port)?;
        check_range("peak_rssi", self.peak_rssi)?;
        check_range("seen_count", self.seen_count)?;
        check_range("channel_index", self.channel_index)?;
        if self.max_tag_count == 0 {
            return Err(ConfigError::ZeroTagLimit);
        }
        Ok(())
    }
}

fn check_range<T>(field: &'static str, range: FieldRange<T>) -> Result<(), ConfigError>
where
    T: PartialOrd + Copy + Into<i64>,
{
    if range.is_ordered() {
        Ok(())
    } else {
        Err(ConfigError::InvalidRange {
            field,
            min: range.min.into(),
            max: range.max.into(),
        })
    }
}

impl Default for TagRangesConfig {
    fn default() -> Self {
        Self {
            pc: default_pc(),
            antenna_port: default_antenna_port(),
            peak_rssi: default_peak_rssi(),
            seen_count: default_seen_count(),
            channel_index: default_channel_index(),
            max_tag_count: default_max_tag_count(),
        }
    }
}

/// Webhook delivery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookConfig {
    /// Hard timeout for one webhook POST, in milliseconds.
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
}

impl WebhookConfig {
    /// The timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_webhook_timeout_ms(),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-run configuration
// ---------------------------------------------------------------------------

/// Reasons a [`RunConfig`] cannot be built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RunConfigError {
    /// `tag_count` was zero.
    #[error("tag_count must be at least 1")]
    ZeroTagCount,

    /// The interval was zero.
    #[error("interval must be greater than zero")]
    ZeroInterval,

    /// `tag_count` exceeded the configured limit.
    #[error("tag_count {tag_count} exceeds the limit of {max}")]
    TagCountTooLarge {
        /// The requested count.
        tag_count: usize,
        /// The limit in force.
        max: usize,
    },

    /// The interval in seconds was negative, NaN, infinite or too large.
    #[error("interval {seconds} is not a valid number of seconds")]
    InvalidInterval {
        /// The rejected value.
        seconds: f64,
    },
}

/// Configuration for one simulation run.
///
/// Invariants `1 <= tag_count <= max_tag_count` and `interval > 0` hold
/// for every value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    tag_count: usize,
    interval: Duration,
    webhook_url: Option<Url>,
}

impl RunConfig {
    /// Build a run configuration capped at [`DEFAULT_MAX_TAG_COUNT`] reads.
    ///
    /// # Errors
    ///
    /// See [`bounded`](Self::bounded).
    pub fn new(
        tag_count: usize,
        interval: Duration,
        webhook_url: Option<Url>,
    ) -> Result<Self, RunConfigError> {
        Self::bounded(tag_count, interval, webhook_url, DEFAULT_MAX_TAG_COUNT)
    }

    /// Build a run configuration with an explicit tag-count limit.
    ///
    /// # Errors
    ///
    /// Returns [`RunConfigError::ZeroTagCount`],
    /// [`RunConfigError::TagCountTooLarge`] or
    /// [`RunConfigError::ZeroInterval`] if an invariant is violated.
    pub fn bounded(
        tag_count: usize,
        interval: Duration,
        webhook_url: Option<Url>,
        max_tag_count: usize,
    ) -> Result<Self, RunConfigError> {
        if tag_count == 0 {
            return Err(RunConfigError::ZeroTagCount);
        }
        if tag_count > max_tag_count {
            return Err(RunConfigError::TagCountTooLarge {
                tag_count,
                max: max_tag_count,
            });
        }
        if interval.is_zero() {
            return Err(RunConfigError::ZeroInterval);
        }
        Ok(Self {
            tag_count,
            interval,
            webhook_url,
        })
    }

    /// Build a run configuration from an interval in (fractional) seconds.
    ///
    /// # Errors
    ///
    /// Returns [`RunConfigError::InvalidInterval`] when `interval_secs` is
    /// not a finite non-negative number, plus the errors of
    /// [`bounded`](Self::bounded).
    pub fn from_secs_f64(
        tag_count: usize,
        interval_secs: f64,
        webhook_url: Option<Url>,
        max_tag_count: usize,
    ) -> Result<Self, RunConfigError> {
        let interval = Duration::try_from_secs_f64(interval_secs).map_err(|_range_err| {
            RunConfigError::InvalidInterval {
                seconds: interval_secs,
            }
        })?;
        Self::bounded(tag_count, interval, webhook_url, max_tag_count)
    }

    /// Number of tag reads generated per tick.
    pub const fn tag_count(&self) -> usize {
        self.tag_count
    }

    /// Wait between ticks.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Optional webhook receiving a copy of every payload.
    pub const fn webhook_url(&self) -> Option<&Url> {
        self.webhook_url.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        String::from("http://localhost:3000"),
        String::from("http://localhost:5173"),
    ]
}

fn default_reader_name() -> String {
    String::from("FX9600FB37EE FX9600 RFID Reader")
}

fn default_mac_address() -> String {
    String::from("84:24:8D:EF:B2:F6")
}

fn default_pc() -> String {
    String::from("3000")
}

const fn default_antenna_port() -> FieldRange<u8> {
    FieldRange::new(1, 4)
}

const fn default_peak_rssi() -> FieldRange<i32> {
    FieldRange::new(-70, -40)
}

const fn default_seen_count() -> FieldRange<u32> {
    FieldRange::new(1, 5)
}

const fn default_channel_index() -> FieldRange<u8> {
    FieldRange::new(1, 4)
}

const fn default_max_tag_count() -> usize {
    DEFAULT_MAX_TAG_COUNT
}

const fn default_webhook_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    String::from("info")
}
