//! Shared application state for the control API server.
//!
//! [`AppState`] holds the process-wide [`SubscriberRegistry`] and
//! [`SimulationController`]. Both are built once by the engine and shared
//! with every request handler and `WebSocket` connection through [`Arc`].

use std::sync::Arc;
use std::time::Duration;

use rfidsim_core::config::{DEFAULT_MAX_TAG_COUNT, ServerConfig, WebhookConfig};
use rfidsim_core::controller::SimulationController;
use rfidsim_core::registry::SubscriberRegistry;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live `WebSocket` subscribers.
    pub registry: Arc<SubscriberRegistry>,
    /// The single simulation controller.
    pub controller: Arc<SimulationController>,
    /// Request timeout applied to webhook sinks built by the start handler.
    pub webhook_timeout: Duration,
    /// Origins allowed by the CORS layer. Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Largest `tag_count` the start handler accepts.
    pub max_tag_count: usize,
}

impl AppState {
    /// Create state around an existing registry and controller, with the
    /// default webhook timeout, CORS origins and tag-count limit.
    pub fn new(registry: Arc<SubscriberRegistry>, controller: Arc<SimulationController>) -> Self {
        Self {
            registry,
            controller,
            webhook_timeout: WebhookConfig::default().timeout(),
            allowed_origins: ServerConfig::default().allowed_origins,
            max_tag_count: DEFAULT_MAX_TAG_COUNT,
        }
    }

    /// Override the webhook timeout.
    #[must_use]
    pub fn with_webhook_timeout(mut self, timeout: Duration) -> Self {
        self.webhook_timeout = timeout;
        self
    }

    /// Override the CORS origins.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Override the tag-count limit.
    #[must_use]
    pub fn with_max_tag_count(mut self, max_tag_count: usize) -> Self {
        self.max_tag_count = max_tag_count;
        self
    }
}
