//! # Shutdown Signal
//!
//! OS-signal wiring for graceful termination. Kept out of the operator on
//! purpose: the operator stays testable with no process-global state, and the
//! hosting binary decides what a signal means (log it, call `stop()`, pick an
//! exit code).

use std::fmt;

use tracing::info;

/// Which termination signal ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM
    Terminate,
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGHUP
    Hangup,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => write!(f, "SIGTERM"),
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Wait for the first of SIGTERM, SIGINT (Ctrl+C), or SIGHUP.
///
/// A second signal while shutdown is already in flight is expected to be
/// absorbed by the operator's idempotent `stop()`, not handled here.
pub async fn shutdown_signal() -> ShutdownSignal {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    let hangup = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            .expect("Failed to install SIGHUP handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    #[cfg(not(unix))]
    let hangup = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => ShutdownSignal::Interrupt,
        _ = terminate => ShutdownSignal::Terminate,
        _ = hangup => ShutdownSignal::Hangup,
    };
    info!(signal = %signal, "received shutdown signal");
    signal
}
