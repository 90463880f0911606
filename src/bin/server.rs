//! # Lifeline Server
//!
//! Thin wrapper binary that wires configuration, the lifecycle state machine,
//! the three managed resources, and OS signal handling into a running
//! service.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin lifeline-server
//!
//! # Run with a specific environment
//! LIFELINE_ENV=production cargo run --bin lifeline-server
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use lifeline_core::config::LifelineConfig;
use lifeline_core::logging;
use lifeline_core::operator::{build_state_machine, ServiceOperator};
use lifeline_core::probe::HttpProbeServer;
use lifeline_core::server::HttpRequestServer;
use lifeline_core::shutdown;
use lifeline_core::storage::PostgresStorage;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_structured_logging();

    info!("starting lifeline server");
    info!("  version: {}", env!("CARGO_PKG_VERSION"));

    let config = match LifelineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    info!("  environment: {}", config.environment);

    let machine = match build_state_machine() {
        Ok(machine) => machine,
        Err(e) => {
            error!(error = %e, "failed to build lifecycle state machine");
            return ExitCode::FAILURE;
        }
    };

    let probes = Arc::new(HttpProbeServer::new(
        config.probe.clone(),
        Arc::clone(&machine),
    ));
    let storage = Arc::new(PostgresStorage::new(config.database.clone()));
    let server = Arc::new(HttpRequestServer::new(config.server.clone()));

    let operator = ServiceOperator::new(
        machine,
        probes,
        storage,
        server,
        config.operator.stage_timeout(),
    );

    if let Err(e) = operator.start().await {
        error!(error = %e, "service failed to start");
        return ExitCode::FAILURE;
    }

    info!("lifeline server started, press Ctrl+C to shut down gracefully");

    let signal = shutdown::shutdown_signal().await;
    info!(signal = %signal, "initiating graceful shutdown");

    match operator.stop().await {
        Ok(()) => {
            info!("lifeline server shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "service failed to stop cleanly");
            ExitCode::FAILURE
        }
    }
}
