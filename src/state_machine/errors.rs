use thiserror::Error;

/// Error types for state machine operations
#[derive(Error, Debug)]
pub enum StateMachineError {
    /// The requested transition has no legal edge and no resolvable substate.
    /// Carries the stringified `from` and `to` labels for diagnostics.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// A state was referenced that is not part of the declared state set.
    #[error("State {0} is not declared in the transition table")]
    UndeclaredState(String),

    /// A transition listener returned an error. The state mutation is NOT
    /// rolled back when this happens: the machine is left in the new state
    /// and the listener's error is handed back to the transition caller.
    #[error("Transition listener failed: {0}")]
    ListenerFailed(#[source] anyhow::Error),
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
