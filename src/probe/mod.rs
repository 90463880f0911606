//! # Health and Readiness Probes
//!
//! Orchestrator-facing HTTP endpoints on a dedicated port:
//!
//! - `GET /health` — liveness only. Succeeds whenever this server is
//!   reachable, including during startup and graceful shutdown.
//! - `GET /ready` — traffic readiness. Succeeds only while the lifecycle
//!   state machine reports `running`; otherwise responds 503 with the current
//!   state as diagnostic payload, coupling external scheduling directly to
//!   internal sequencing state.
//!
//! The probe server holds a read-only handle on the state machine; it never
//! requests transitions.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ProbeConfig;
use crate::operator::{ProbeServer, ServiceState};
use crate::state_machine::StateMachine;

/// Shared state for the probe handlers
#[derive(Clone)]
pub struct ProbeState {
    machine: Arc<StateMachine<ServiceState>>,
}

impl ProbeState {
    pub fn new(machine: Arc<StateMachine<ServiceState>>) -> Self {
        Self { machine }
    }
}

/// Liveness response payload
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
}

/// Readiness response payload; `state` carries the current lifecycle state
#[derive(Serialize)]
pub struct ReadinessResponse {
    status: String,
    state: String,
    timestamp: String,
}

/// Build the probe router. Split out from the server so tests can drive the
/// handlers without binding a socket.
pub fn probe_router(state: ProbeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}

/// Liveness probe: GET /health
async fn health(State(_state): State<ProbeState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Readiness probe: GET /ready
async fn ready(State(state): State<ProbeState>) -> Response {
    let current = state.machine.state();
    let body = ReadinessResponse {
        status: if current.is_running() {
            "ready"
        } else {
            "not_ready"
        }
        .to_string(),
        state: current.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    if current.is_running() {
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}

struct ServeHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Axum-backed probe server with a start/stop lifecycle
pub struct HttpProbeServer {
    config: ProbeConfig,
    state: ProbeState,
    serving: Mutex<Option<ServeHandle>>,
}

impl HttpProbeServer {
    pub fn new(config: ProbeConfig, machine: Arc<StateMachine<ServiceState>>) -> Self {
        Self {
            config,
            state: ProbeState::new(machine),
            serving: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ProbeServer for HttpProbeServer {
    async fn start(&self) -> anyhow::Result<()> {
        if self.serving.lock().is_some() {
            warn!("probe server start requested but it is already serving");
            return Ok(());
        }

        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind probe listener on {addr}: {e}"))?;
        let local_addr = listener.local_addr()?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let app = probe_router(self.state.clone());
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!(error = %e, "probe server terminated unexpectedly");
            }
        });

        *self.serving.lock() = Some(ServeHandle { shutdown, task });
        info!(addr = %local_addr, "probe server listening");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let handle = self.serving.lock().take();
        let Some(handle) = handle else {
            warn!("probe server stop requested but it is not serving");
            return Ok(());
        };

        // The receiver is gone only if the serve task already exited.
        let _ = handle.shutdown.send(());
        handle
            .task
            .await
            .map_err(|e| anyhow::anyhow!("probe server task failed: {e}"))?;
        info!("probe server stopped");
        Ok(())
    }
}
