// Hierarchical state machine primitive.
//
// This module provides a reusable typed finite-state machine with compound
// substates and asynchronous transition listeners. The service operator builds
// its lifecycle sequencing on top of it; nothing in here knows about services,
// probes, or storage.

pub mod errors;
pub mod machine;

// Re-export main types for convenient access
pub use errors::{StateMachineError, StateMachineResult};
pub use machine::{
    ListenerId, MachineState, StateMachine, TransitionTable, TransitionTableBuilder,
    TransitionTarget,
};
