//! Server binary for the RFID reader simulator.
//!
//! Wires the payload generator, subscriber registry, and simulation
//! controller into the control API server and runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `rfidsim-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the simulated reader from the `reader` and `tags` sections
//! 4. Create the subscriber registry and simulation controller
//! 5. Start the control API server
//! 6. Wait for `Ctrl-C`, then stop any running simulation

mod error;

use std::path::Path;
use std::sync::Arc;

use rfidsim_core::config::{LogFormat, LoggingConfig, SimulatorConfig};
use rfidsim_core::controller::SimulationController;
use rfidsim_core::generator::{PayloadGenerator, SimulatedReader};
use rfidsim_core::registry::SubscriberRegistry;
use rfidsim_observer::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_FILE: &str = "rfidsim-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging, or the server fails to
/// initialize.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging)?;

    info!("rfidsim-engine starting");
    if from_file {
        info!(path = CONFIG_FILE, "Configuration loaded");
    } else {
        info!(path = CONFIG_FILE, "Config file not found, using defaults");
    }

    // 3. Build the simulated reader.
    let reader = SimulatedReader::from_config(&config);
    info!(
        reader_name = reader.identity().reader_name.as_str(),
        mac_address = reader.identity().mac_address.as_str(),
        "Simulated reader configured"
    );
    let generator: Arc<dyn PayloadGenerator> = Arc::new(reader);

    // 4. Registry and controller, one of each per process.
    let registry = Arc::new(SubscriberRegistry::new());
    let controller = Arc::new(SimulationController::new(generator));

    // 5. Start the control API server.
    let app_state = AppState::new(Arc::clone(&registry), Arc::clone(&controller))
        .with_webhook_timeout(config.webhook.timeout())
        .with_allowed_origins(config.server.allowed_origins.clone())
        .with_max_tag_count(config.tags.max_tag_count);
    let mut server = rfidsim_observer::spawn_observer(&config.server, Arc::new(app_state))
        .await
        .map_err(EngineError::from)?;
    info!(addr = %server.addr, "Control API server started");

    // 6. Run until Ctrl-C or the server task exits on its own.
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|source| EngineError::Signal { source })?;
            info!("Shutdown signal received");
        }
        result = &mut server.handle => {
            if let Err(e) = result {
                warn!(error = %e, "Control API server task failed");
            }
        }
    }

    controller.shutdown().await;
    server.handle.abort();

    info!(subscribers = registry.len(), "rfidsim-engine shutdown complete");

    Ok(())
}

/// Load configuration from [`CONFIG_FILE`] in the working directory.
///
/// Returns the configuration and whether it came from the file.
fn load_config() -> Result<(SimulatorConfig, bool), EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok((SimulatorConfig::from_file(config_path)?, true))
    } else {
        Ok((SimulatorConfig::from_env()?, false))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_tracing(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_unset| EnvFilter::try_new(&logging.level))
        .map_err(|e| EngineError::Logging {
            level: logging.level.clone(),
            message: e.to_string(),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
