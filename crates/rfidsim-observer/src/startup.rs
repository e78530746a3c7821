//! Server startup helper for the engine binary.
//!
//! Provides [`spawn_observer`] which binds the listener eagerly and then
//! serves the control API and tag stream on a background Tokio task.

use std::net::SocketAddr;
use std::sync::Arc;

use rfidsim_core::config::ServerConfig;
use tokio::task::JoinHandle;

use crate::server::{self, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A server running on a background task.
#[derive(Debug)]
pub struct RunningServer {
    /// The address actually bound (useful when the port was `0`).
    pub addr: SocketAddr,
    /// The serving task. Abort it to stop accepting connections.
    pub handle: JoinHandle<()>,
}

/// Bind `config.host:config.port` and serve on a background task.
///
/// The bind happens before this function returns, so an address already
/// in use is reported to the caller instead of being logged from inside
/// the task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address is invalid or cannot
/// be bound.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<RunningServer, StartupError> {
    let listener = server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("local address unavailable: {e}")))?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            tracing::error!(error = %e, "Control API server exited with error");
        }
    });

    tracing::info!(%addr, "Control API server spawned on background task");

    Ok(RunningServer { addr, handle })
}
