//! Tokio runtime configuration for worker processes
//!
//! Separates lease coordination from agent execution so a burst of
//! agent work cannot starve renewal heartbeats into a false failover.

use tokio::runtime::{Builder, Runtime};

use crate::error::{ColonyError, Result};

/// Configuration for the worker runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Threads for lease maintenance and store I/O
    pub coordination_threads: usize,
    /// Threads for agent execution drivers
    pub agent_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let cpus = num_cpus::get();
        Self {
            coordination_threads: 2,
            agent_threads: cpus.max(2),
        }
    }
}

/// Dual-runtime executor for a worker process.
///
/// The coordination runtime runs the ownership tracker and lease store
/// calls; the agent runtime runs execution drivers. Renewals stay
/// responsive no matter what agent code does between sleeps.
pub struct ColonyRuntime {
    coordination: Runtime,
    agent: Runtime,
}

impl ColonyRuntime {
    /// Create a runtime pair with the given configuration
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let coordination = Builder::new_multi_thread()
            .worker_threads(config.coordination_threads)
            .thread_name("colony-coord")
            .enable_all()
            .build()
            .map_err(|e| ColonyError::Internal {
                message: format!("failed to create coordination runtime: {e}"),
            })?;

        let agent = Builder::new_multi_thread()
            .worker_threads(config.agent_threads)
            .thread_name("colony-agent")
            .enable_all()
            .build()
            .map_err(|e| ColonyError::Internal {
                message: format!("failed to create agent runtime: {e}"),
            })?;

        Ok(Self {
            coordination,
            agent,
        })
    }

    /// Spawn a coordination task
    pub fn spawn_coordination<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.coordination.spawn(future)
    }

    /// Spawn an agent-execution task
    pub fn spawn_agent<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.agent.spawn(future)
    }

    /// Run a future on the coordination runtime, blocking until complete
    pub fn block_on_coordination<F: std::future::Future>(&self, future: F) -> F::Output {
        self.coordination.block_on(future)
    }

    /// Handle to the agent runtime, for spawning drivers
    pub fn agent_handle(&self) -> tokio::runtime::Handle {
        self.agent.handle().clone()
    }

    /// Handle to the coordination runtime
    pub fn coordination_handle(&self) -> tokio::runtime::Handle {
        self.coordination.handle().clone()
    }

    /// Graceful shutdown of both runtimes.
    ///
    /// Agent work goes first (drivers are interruptible by contract);
    /// coordination drains last so final lease releases can go out.
    pub fn shutdown(self) {
        self.agent.shutdown_background();
        self.coordination
            .shutdown_timeout(std::time::Duration::from_secs(5));
    }
}
