//! # Lifeline Core
//!
//! Hierarchical lifecycle state machine and service operator for backend
//! services.
//!
//! ## Overview
//!
//! Two components compose the core, in dependency order:
//!
//! 1. [`state_machine`] — a generic, reusable typed finite-state machine with
//!    compound substates and asynchronous transition listeners.
//! 2. [`operator`] — a lifecycle orchestrator that owns one state machine
//!    instance, wires it to three subordinate resources (a health/readiness
//!    probe server, a persistent-storage connection, and a request-serving
//!    server), and exposes an idempotent `start`/`stop` contract.
//!
//! `start()` requests a single coarse transition; each entered stage starts
//! its dependency and chains the next edge, so the ordered multi-stage
//! sequence fans out from one call and `start()` resolves only once the
//! service is `running`. Shutdown mirrors the sequence in reverse, driven by
//! an explicit `stop()` or by the OS-signal wiring in [`shutdown`].
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Generic hierarchical FSM primitive
//! - [`operator`] - Lifecycle states, resource contracts, and the operator
//! - [`probe`] - Health/readiness HTTP server
//! - [`storage`] - Postgres-backed storage connection
//! - [`server`] - Request server stub (business routing lives downstream)
//! - [`shutdown`] - OS termination-signal wiring
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lifeline_core::config::LifelineConfig;
//! use lifeline_core::operator::{build_state_machine, ServiceOperator};
//! use lifeline_core::probe::HttpProbeServer;
//! use lifeline_core::server::HttpRequestServer;
//! use lifeline_core::storage::PostgresStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LifelineConfig::load()?;
//! let machine = build_state_machine()?;
//!
//! let operator = ServiceOperator::new(
//!     Arc::clone(&machine),
//!     Arc::new(HttpProbeServer::new(config.probe.clone(), Arc::clone(&machine))),
//!     Arc::new(PostgresStorage::new(config.database.clone())),
//!     Arc::new(HttpRequestServer::new(config.server.clone())),
//!     config.operator.stage_timeout(),
//! );
//!
//! operator.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod operator;
pub mod probe;
pub mod server;
pub mod shutdown;
pub mod state_machine;
pub mod storage;

// Re-export main types for convenient access
pub use error::{LifecycleError, Result};
pub use operator::{ServiceOperator, ServiceState};
pub use state_machine::{StateMachine, StateMachineError, TransitionTable};
