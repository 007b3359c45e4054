//! Runtime core: pool supervision and lifecycle.
//!
//! Internal modules:
//! - [`supervisor`]: control loop, reload handover, shutdown paths;
//! - [`builder`]: wires bus, sinks, tracker, and subscribers together;
//! - [`slot`]: per-slot respawn loop over successive worker incarnations;
//! - [`worker`]: boot, accept loop, bounded drain;
//! - [`conn`]: per-connection HTTP serving and failure containment;
//! - [`pool`]: worker identity, state tracking, kill registry;
//! - [`shutdown`]: OS signal installation and the signal → action table.

mod builder;
mod conn;
mod pool;
mod shutdown;
mod slot;
mod supervisor;
mod worker;

pub use builder::SupervisorBuilder;
pub use pool::{PoolTracker, WorkerId, WorkerInfo, WorkerState};
pub use shutdown::Signal;
pub use supervisor::{Supervisor, SupervisorHandle};
