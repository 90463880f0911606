use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::operator::ServiceState;
use crate::state_machine::StateMachineError;

/// Crate-level error type for lifecycle operations
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// `start`/`stop` was called from a state that does not admit it.
    #[error("Operation `{operation}` is not allowed while the service is {state}")]
    IllegalState {
        operation: &'static str,
        state: ServiceState,
    },

    /// A dependency's start/stop call failed during the named stage. The
    /// original error is preserved as the source.
    #[error("Lifecycle stage {stage} failed: {source}")]
    Resource {
        stage: ServiceState,
        #[source]
        source: anyhow::Error,
    },

    /// A dependency's start/stop call did not resolve within the configured
    /// per-stage bound.
    #[error("Lifecycle stage {stage} timed out after {timeout:?}")]
    StageTimeout {
        stage: ServiceState,
        timeout: Duration,
    },

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
