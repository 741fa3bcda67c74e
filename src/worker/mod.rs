//! Worker-side execution
//!
//! Per-shard execution driver, ownership tracker, and episode state.

pub mod driver;
pub mod state;
pub mod tracker;

pub use driver::ExecutionDriver;
pub use state::{DriverPhase, ShardExecutionState};
pub use tracker::OwnershipTracker;
