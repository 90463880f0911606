//! # Managed Lifecycle Resources
//!
//! The consumed contracts of the three dependencies the operator sequences.
//! The operator owns only these start/stop handles, injected at construction;
//! everything behind them (routing, pooling, sockets) is the resource's own
//! business.
//!
//! Failures are opaque to the operator, so the methods return
//! [`anyhow::Result`]; the operator wraps them with the stage that failed and
//! otherwise passes them through unchanged.

use async_trait::async_trait;

/// Health/readiness probe server lifecycle handle.
///
/// Implementations must bind independently of the request server (distinct
/// port) so probes stay reachable while the main server is down.
#[async_trait]
pub trait ProbeServer: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
}

/// Persistent-storage connection lifecycle handle.
///
/// A `connect` failure is the only way the storage startup stage can fail.
#[async_trait]
pub trait StorageConnection: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
}

/// Request-serving server lifecycle handle. Owns all business routing.
#[async_trait]
pub trait RequestServer: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
}
