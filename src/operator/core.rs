//! # Service Operator
//!
//! Lifecycle orchestrator for a service with three managed dependencies: the
//! probe server, the storage connection, and the request server.
//!
//! The operator owns a [`StateMachine`] over [`ServiceState`] and registers a
//! single sequencing listener at construction. `start()` requests one coarse
//! transition to the starting phase; the listener performs the side effect for
//! the entered stage and, on success, requests the next edge — so the whole
//! multi-stage sequence fans out from a single call, and `start()` resolves
//! only once the chain has reached `running`. Shutdown mirrors this in
//! reverse order.
//!
//! Stage failure is operator policy, not machine mechanism: the listener
//! forces a transition to `failed` and the original dependency error is
//! rethrown to the `start()`/`stop()` caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, error, info, warn};

use crate::error::{LifecycleError, Result};
use crate::state_machine::{StateMachine, StateMachineError, StateMachineResult};

use super::resources::{ProbeServer, RequestServer, StorageConnection};
use super::states::{transition_table, ServicePhase, ServiceState, StartStage, StopStage};

/// Build the lifecycle state machine the operator drives, starting in `idle`.
///
/// Created outside [`ServiceOperator::new`] so a probe server can hold a
/// read-only clone of the handle before the operator takes ownership of
/// sequencing.
pub fn build_state_machine() -> StateMachineResult<Arc<StateMachine<ServiceState>>> {
    Ok(Arc::new(StateMachine::new(
        ServiceState::Idle,
        transition_table(),
    )?))
}

/// Lifecycle orchestrator. Constructed once per process; `start` and `stop`
/// are idempotent and may each be called multiple times.
pub struct ServiceOperator {
    inner: Arc<OperatorInner>,
}

struct OperatorInner {
    machine: Arc<StateMachine<ServiceState>>,
    probes: Arc<dyn ProbeServer>,
    storage: Arc<dyn StorageConnection>,
    server: Arc<dyn RequestServer>,
    stage_timeout: Option<Duration>,
}

impl ServiceOperator {
    /// Wire the operator to its state machine and dependency handles and
    /// register the sequencing listener.
    ///
    /// `stage_timeout` bounds every dependency start/stop call; `None` means
    /// explicitly unbounded.
    pub fn new(
        machine: Arc<StateMachine<ServiceState>>,
        probes: Arc<dyn ProbeServer>,
        storage: Arc<dyn StorageConnection>,
        server: Arc<dyn RequestServer>,
        stage_timeout: Option<Duration>,
    ) -> Self {
        let inner = Arc::new(OperatorInner {
            machine: Arc::clone(&machine),
            probes,
            storage,
            server,
            stage_timeout,
        });

        let hook = Arc::clone(&inner);
        machine.on_transition(move |from, to| {
            let inner = Arc::clone(&hook);
            async move { inner.on_enter(from, to).await }
        });

        Self { inner }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.inner.machine.state()
    }

    /// Start the service: probes, then storage, then the request server.
    ///
    /// No-op with a warning when already running. Fails with
    /// [`LifecycleError::IllegalState`] unless the service is idle, stopped,
    /// or failed. Resolves once the full chain has reached `running`; on a
    /// stage failure the service lands in `failed` and the stage's error is
    /// returned.
    pub async fn start(&self) -> Result<()> {
        let state = self.state();
        match state {
            ServiceState::Running => {
                warn!("start requested but service is already running");
                return Ok(());
            }
            ServiceState::Idle | ServiceState::Stopped | ServiceState::Failed => {}
            other => {
                return Err(LifecycleError::IllegalState {
                    operation: "start",
                    state: other,
                })
            }
        }

        info!(from = %state, "starting service");
        match self.inner.machine.transition(ServicePhase::Starting).await {
            Ok(_) => {
                info!(state = %self.state(), "service started");
                Ok(())
            }
            Err(err) => {
                let err = unwrap_listener_error(err);
                self.inner.fail().await;
                Err(err)
            }
        }
    }

    /// Stop the service: request server, then storage, then probes.
    ///
    /// Idempotent success when already stopped, never started, or when a stop
    /// is already in flight (no duplicate teardown). Fails with
    /// [`LifecycleError::IllegalState`] from any other non-running state.
    pub async fn stop(&self) -> Result<()> {
        let state = self.state();
        match state {
            ServiceState::Stopped | ServiceState::Idle => {
                debug!(state = %state, "stop requested but there is nothing to stop");
                return Ok(());
            }
            ServiceState::Stopping(_) => {
                debug!(state = %state, "stop requested but a stop is already in flight");
                return Ok(());
            }
            ServiceState::Running => {}
            other => {
                return Err(LifecycleError::IllegalState {
                    operation: "stop",
                    state: other,
                })
            }
        }

        info!("stopping service");
        match self.inner.machine.transition(ServicePhase::Stopping).await {
            Ok(_) => {
                info!(state = %self.state(), "service stopped");
                Ok(())
            }
            Err(err) => {
                let err = unwrap_listener_error(err);
                self.inner.fail().await;
                Err(err)
            }
        }
    }
}

impl OperatorInner {
    /// Sequencing listener: side effect for the entered stage, then the next
    /// edge in the chain. Stable states only log.
    async fn on_enter(&self, from: ServiceState, to: ServiceState) -> anyhow::Result<()> {
        match to {
            ServiceState::Starting(StartStage::Probes) => {
                self.run_stage(to, self.probes.start()).await?;
                self.advance(ServiceState::Starting(StartStage::Storage)).await
            }
            ServiceState::Starting(StartStage::Storage) => {
                self.run_stage(to, self.storage.connect()).await?;
                self.advance(ServiceState::Starting(StartStage::Server)).await
            }
            ServiceState::Starting(StartStage::Server) => {
                self.run_stage(to, self.server.start()).await?;
                self.advance(ServiceState::Running).await
            }
            ServiceState::Stopping(StopStage::Server) => {
                self.run_stage(to, self.server.stop()).await?;
                self.advance(ServiceState::Stopping(StopStage::Storage)).await
            }
            ServiceState::Stopping(StopStage::Storage) => {
                self.run_stage(to, self.storage.close()).await?;
                self.advance(ServiceState::Stopping(StopStage::Probes)).await
            }
            ServiceState::Stopping(StopStage::Probes) => {
                self.run_stage(to, self.probes.stop()).await?;
                self.advance(ServiceState::Stopped).await
            }
            ServiceState::Running => {
                info!(previous = %from, "service is running");
                Ok(())
            }
            ServiceState::Stopped => {
                info!(previous = %from, "service shut down cleanly");
                Ok(())
            }
            ServiceState::Failed => {
                error!(previous = %from, "service entered failed state");
                Ok(())
            }
            ServiceState::Idle => Ok(()),
        }
    }

    /// Run one stage's dependency call under the configured timeout. On
    /// failure the machine is forced to `failed` and the stage error is
    /// returned for rethrow to the original caller.
    async fn run_stage<F>(&self, stage: ServiceState, effect: F) -> anyhow::Result<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send,
    {
        let result = match self.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, effect).await {
                Ok(outcome) => outcome.map_err(|source| LifecycleError::Resource { stage, source }),
                Err(_) => Err(LifecycleError::StageTimeout {
                    stage,
                    timeout: limit,
                }),
            },
            None => effect
                .await
                .map_err(|source| LifecycleError::Resource { stage, source }),
        };

        match result {
            Ok(()) => {
                info!(stage = %stage, "lifecycle stage completed");
                Ok(())
            }
            Err(err) => {
                error!(stage = %stage, error = %err, "lifecycle stage failed");
                self.fail().await;
                Err(err.into())
            }
        }
    }

    /// Request the next edge in the chain. A nested listener failure is
    /// unwrapped back to the inner error so the original stage failure
    /// reaches the top wrapped exactly once.
    fn advance(&self, next: ServiceState) -> BoxFuture<'_, anyhow::Result<()>> {
        async move {
            match self.machine.transition(next).await {
                Ok(_) => Ok(()),
                Err(StateMachineError::ListenerFailed(source)) => Err(source),
                Err(err) => Err(err.into()),
            }
        }
        .boxed()
    }

    /// Best-effort forced transition to `failed`; a secondary failure here is
    /// logged, not propagated, so it cannot mask the stage error.
    async fn fail(&self) {
        if self.machine.state() == ServiceState::Failed {
            return;
        }
        if let Err(err) = self.machine.transition(ServiceState::Failed).await {
            warn!(error = %err, "could not record failed state");
        }
    }
}

/// Recover the `LifecycleError` a sequencing listener threaded through the
/// machine's opaque listener-error carrier.
fn unwrap_listener_error(err: StateMachineError) -> LifecycleError {
    match err {
        StateMachineError::ListenerFailed(source) => match source.downcast::<LifecycleError>() {
            Ok(lifecycle) => lifecycle,
            Err(other) => LifecycleError::Internal(other.to_string()),
        },
        other => LifecycleError::StateMachine(other),
    }
}
