// Service operator module.
//
// Owns the lifecycle state set, the consumed resource contracts, and the
// operator that sequences dependency startup/shutdown through the state
// machine.

pub mod core;
pub mod resources;
pub mod states;

// Re-export main types for convenient access
pub use core::{build_state_machine, ServiceOperator};
pub use resources::{ProbeServer, RequestServer, StorageConnection};
pub use states::{transition_table, ServicePhase, ServiceState, StartStage, StopStage};
