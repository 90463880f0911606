//! # Service Lifecycle States
//!
//! The concrete state set driven by the service operator. Startup and
//! shutdown are compound phases with one sub-stage per managed dependency;
//! the wire form of a compound state is `parent:child` (e.g.
//! `starting:probes`), which is what logs and probe payloads carry.

use std::fmt;

use crate::state_machine::{MachineState, TransitionTable, TransitionTarget};

/// Sub-stages of the startup phase, in startup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartStage {
    /// Health/readiness probe server is being started
    Probes,
    /// Persistent-storage connection is being established
    Storage,
    /// Request-serving server is being started
    Server,
}

/// Sub-stages of the shutdown phase, in shutdown order (reverse of startup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopStage {
    /// Request-serving server is being stopped
    Server,
    /// Persistent-storage connection is being closed
    Storage,
    /// Health/readiness probe server is being stopped
    Probes,
}

/// Service lifecycle state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Initial state before the first start
    Idle,
    /// Startup in progress, at the given sub-stage
    Starting(StartStage),
    /// All dependencies are up and the service accepts traffic
    Running,
    /// Shutdown in progress, at the given sub-stage
    Stopping(StopStage),
    /// Clean shutdown completed
    Stopped,
    /// A startup or shutdown stage failed
    Failed,
}

/// Coarse lifecycle phases, used as transition targets when the caller does
/// not care which sub-stage comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServicePhase {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ServiceState {
    /// Check if this is a transitional state (a startup or shutdown stage)
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Starting(_) | Self::Stopping(_))
    }

    /// Check if a shutdown is currently in flight
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping(_))
    }

    /// Check if the service is serving traffic
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl MachineState for ServiceState {
    type Phase = ServicePhase;

    fn phase(self) -> ServicePhase {
        match self {
            Self::Idle => ServicePhase::Idle,
            Self::Starting(_) => ServicePhase::Starting,
            Self::Running => ServicePhase::Running,
            Self::Stopping(_) => ServicePhase::Stopping,
            Self::Stopped => ServicePhase::Stopped,
            Self::Failed => ServicePhase::Failed,
        }
    }
}

impl From<ServicePhase> for TransitionTarget<ServiceState> {
    fn from(phase: ServicePhase) -> Self {
        Self::Phase(phase)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting(StartStage::Probes) => write!(f, "starting:probes"),
            Self::Starting(StartStage::Storage) => write!(f, "starting:storage"),
            Self::Starting(StartStage::Server) => write!(f, "starting:server"),
            Self::Running => write!(f, "running"),
            Self::Stopping(StopStage::Server) => write!(f, "stopping:server"),
            Self::Stopping(StopStage::Storage) => write!(f, "stopping:storage"),
            Self::Stopping(StopStage::Probes) => write!(f, "stopping:probes"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl fmt::Display for ServicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "starting:probes" => Ok(Self::Starting(StartStage::Probes)),
            "starting:storage" => Ok(Self::Starting(StartStage::Storage)),
            "starting:server" => Ok(Self::Starting(StartStage::Server)),
            "running" => Ok(Self::Running),
            "stopping:server" => Ok(Self::Stopping(StopStage::Server)),
            "stopping:storage" => Ok(Self::Stopping(StopStage::Storage)),
            "stopping:probes" => Ok(Self::Stopping(StopStage::Probes)),
            "stopped" => Ok(Self::Stopped),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid service state: {s}")),
        }
    }
}

/// The lifecycle transition table. These are the only legal edges; note the
/// restart edge out of `stopped` and the retry edge out of `failed`.
pub fn transition_table() -> TransitionTable<ServiceState> {
    use ServiceState::{Failed, Idle, Running, Starting, Stopped, Stopping};

    TransitionTable::builder()
        .edges(Idle, [Starting(StartStage::Probes)])
        .edges(
            Starting(StartStage::Probes),
            [Starting(StartStage::Storage), Failed],
        )
        .edges(
            Starting(StartStage::Storage),
            [Starting(StartStage::Server), Failed],
        )
        .edges(Starting(StartStage::Server), [Running, Failed])
        .edges(Running, [Stopping(StopStage::Server)])
        .edges(
            Stopping(StopStage::Server),
            [Stopping(StopStage::Storage), Failed],
        )
        .edges(
            Stopping(StopStage::Storage),
            [Stopping(StopStage::Probes), Failed],
        )
        .edges(Stopping(StopStage::Probes), [Stopped, Failed])
        .edges(Stopped, [Starting(StartStage::Probes)])
        .edges(Failed, [Starting(StartStage::Probes)])
        .build()
}
