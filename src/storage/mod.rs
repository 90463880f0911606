//! # Storage Connection
//!
//! PostgreSQL-backed implementation of the operator's storage contract. The
//! pool is created on `connect` and drained on `close`; a connectivity check
//! runs before the connection is considered established so a bad database
//! fails the startup stage instead of the first query.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::operator::StorageConnection;

/// Postgres connection pool with a connect/close lifecycle
pub struct PostgresStorage {
    config: DatabaseConfig,
    pool: RwLock<Option<PgPool>>,
}

impl PostgresStorage {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
        }
    }

    /// Handle on the live pool, if connected. Business queries go through
    /// this; the operator itself never touches it.
    pub fn pool(&self) -> Option<PgPool> {
        self.pool.read().clone()
    }
}

#[async_trait]
impl StorageConnection for PostgresStorage {
    async fn connect(&self) -> anyhow::Result<()> {
        if self.pool.read().is_some() {
            warn!("storage connect requested but a pool is already open");
            return Ok(());
        }

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_secs(self.config.connect_timeout_seconds))
            .connect(&self.config.url)
            .await
            .map_err(|e| anyhow::anyhow!("failed to connect to postgres: {e}"))?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(|e| anyhow::anyhow!("postgres connectivity check failed: {e}"))?;

        info!(
            max_connections = self.config.max_connections,
            "storage connection established"
        );
        *self.pool.write() = Some(pool);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        let pool = self.pool.write().take();
        match pool {
            Some(pool) => {
                pool.close().await;
                info!("storage connection closed");
            }
            None => warn!("storage close requested but no pool is open"),
        }
        Ok(())
    }
}
