//! Delivery sinks for serialized reader payloads.
//!
//! A [`BroadcastSink`] is an ordered list of [`Sink`]s composed when a run
//! starts: the subscriber registry always comes first, followed by at most
//! one webhook. Each sink is independent; a failure is logged and the next
//! sink still runs.
//!
//! Sinks use enum dispatch rather than trait objects so that the async
//! webhook call needs no boxing.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::registry::{BroadcastReport, Message, SubscriberRegistry};

/// Errors from a single sink delivery. Always logged, never propagated
/// past [`BroadcastSink::deliver`].
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The HTTP client could not be constructed.
    #[error("failed to build webhook client: {source}")]
    ClientBuild {
        /// The underlying reqwest error.
        source: reqwest::Error,
    },

    /// The request failed before a response arrived (connect, timeout, ...).
    #[error("webhook POST to {url} failed: {source}")]
    Transport {
        /// The webhook URL.
        url: Url,
        /// The underlying reqwest error.
        source: reqwest::Error,
    },

    /// The webhook answered with a non-success status.
    #[error("webhook {url} returned {status}")]
    Status {
        /// The webhook URL.
        url: Url,
        /// The HTTP status code.
        status: u16,
    },
}

/// Best-effort HTTP POST of every message to one URL.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
}

impl WebhookSink {
    /// Create a webhook sink whose requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::ClientBuild`] if the TLS backend cannot be
    /// initialized.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| DeliveryError::ClientBuild { source })?;
        Ok(Self { client, url })
    }

    /// The target URL.
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// POST `message` as a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Transport`] on connection failure or
    /// timeout, [`DeliveryError::Status`] on a non-2xx response.
    pub async fn post(&self, message: &Message) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(message.to_string())
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// One delivery target.
#[derive(Debug, Clone)]
pub enum Sink {
    /// Fan-out to every live `WebSocket` subscriber.
    Subscribers(Arc<SubscriberRegistry>),
    /// Copy to an external HTTP endpoint.
    Webhook(WebhookSink),
}

impl Sink {
    /// Deliver `message` to this sink.
    ///
    /// # Errors
    ///
    /// Only the webhook sink can fail; see [`WebhookSink::post`].
    pub async fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        match self {
            Self::Subscribers(registry) => {
                let BroadcastReport {
                    delivered,
                    lagged,
                    pruned,
                } = registry.broadcast(message);
                debug!(delivered, lagged, pruned, "Payload fanned out to subscribers");
                Ok(())
            }
            Self::Webhook(webhook) => webhook.post(message).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Subscribers(_) => "subscribers",
            Self::Webhook(_) => "webhook",
        }
    }
}

/// Result of one [`BroadcastSink::deliver`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Sinks that accepted the message.
    pub succeeded: usize,
    /// Sinks that failed (already logged).
    pub failed: usize,
}

/// Ordered list of sinks that together form one delivery.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sinks: Vec<Sink>,
}

impl BroadcastSink {
    /// A sink that fans out to `registry` only.
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            sinks: vec![Sink::Subscribers(registry)],
        }
    }

    /// Append a webhook, replacing any webhook already present.
    #[must_use]
    pub fn with_webhook(mut self, webhook: WebhookSink) -> Self {
        self.sinks.retain(|sink| !matches!(sink, Sink::Webhook(_)));
        self.sinks.push(Sink::Webhook(webhook));
        self
    }

    /// The sinks in delivery order.
    pub fn sinks(&self) -> &[Sink] {
        &self.sinks
    }

    /// The configured webhook, if any.
    pub fn webhook(&self) -> Option<&WebhookSink> {
        self.sinks.iter().find_map(|sink| match sink {
            Sink::Webhook(webhook) => Some(webhook),
            Sink::Subscribers(_) => None,
        })
    }

    /// Deliver `message` to every sink in order.
    ///
    /// A failing sink is logged at `warn` and does not stop the remaining
    /// sinks.
    pub async fn deliver(&self, message: &Message) -> DeliverySummary {
        let mut summary = DeliverySummary::default();
        for sink in &self.sinks {
            match sink.deliver(message).await {
                Ok(()) => summary.succeeded = summary.succeeded.saturating_add(1),
                Err(e) => {
                    warn!(sink = sink.name(), error = %e, "Delivery failed");
                    summary.failed = summary.failed.saturating_add(1);
                }
            }
        }
        summary
    }
}
