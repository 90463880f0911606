//! # Request Server
//!
//! The request-serving HTTP server the operator starts last and stops first.
//! Business routing is intentionally out of scope for this crate; the shipped
//! server exposes a single service-info route and exists to give the
//! operator's third stage a real bind/serve/graceful-shutdown lifecycle.
//! Embedders mount their own router by implementing
//! [`RequestServer`](crate::operator::RequestServer) instead.

use async_trait::async_trait;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::operator::RequestServer;

#[derive(Serialize)]
struct ServiceInfo {
    service: &'static str,
    version: &'static str,
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn request_router() -> Router {
    Router::new().route("/", get(service_info))
}

struct ServeHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Axum-backed request server with a start/stop lifecycle
pub struct HttpRequestServer {
    config: ServerConfig,
    serving: Mutex<Option<ServeHandle>>,
}

impl HttpRequestServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            serving: Mutex::new(None),
        }
    }
}

#[async_trait]
impl RequestServer for HttpRequestServer {
    async fn start(&self) -> anyhow::Result<()> {
        if self.serving.lock().is_some() {
            warn!("request server start requested but it is already serving");
            return Ok(());
        }

        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind request listener on {addr}: {e}"))?;
        let local_addr = listener.local_addr()?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, request_router()).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!(error = %e, "request server terminated unexpectedly");
            }
        });

        *self.serving.lock() = Some(ServeHandle { shutdown, task });
        info!(addr = %local_addr, "request server listening");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let handle = self.serving.lock().take();
        let Some(handle) = handle else {
            warn!("request server stop requested but it is not serving");
            return Ok(());
        };

        let _ = handle.shutdown.send(());
        handle
            .task
            .await
            .map_err(|e| anyhow::anyhow!("request server task failed: {e}"))?;
        info!("request server stopped");
        Ok(())
    }
}
