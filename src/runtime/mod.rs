//! Worker process runtime
//!
//! Runtime split for coordination vs agent work, and process-level
//! shutdown signaling.

pub mod executor;
pub mod shutdown;

pub use executor::{ColonyRuntime, RuntimeConfig};
pub use shutdown::{ShutdownListener, ShutdownSignal};
