//! Per-shard execution driver
//!
//! Drives one ownership episode: exactly-once `init`, then `work` calls
//! separated by a sleep of at most the shard's budget. The ownership-lost
//! signal interrupts the sleep; the driver re-checks it before every
//! `work` call and never calls out again after it fires.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use super::state::{DriverPhase, ShardExecutionState};
use crate::agent::Agent;
use crate::config::{ScriptConfig, ShardConfig};
use crate::error::ColonyError;
use crate::lease::Lease;
use crate::metrics::standard;
use crate::shard::{ShardIdentity, ShardSpec};

/// State machine executing one shard for the duration of one lease
/// holding episode.
pub struct ExecutionDriver {
    identity: ShardIdentity,
    fencing_token: u64,
    script: ScriptConfig,
    shard: ShardConfig,
    agent: Box<dyn Agent>,
    stop_rx: watch::Receiver<bool>,
    state: Arc<ShardExecutionState>,
}

impl ExecutionDriver {
    /// Create a driver for a freshly acquired lease.
    ///
    /// `stop_rx` is the ownership-lost signal; flipping it to `true` (or
    /// dropping the sender) halts the driver without completing its
    /// current sleep.
    pub fn new(
        spec: &ShardSpec,
        lease: &Lease,
        agent: Box<dyn Agent>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            identity: spec.identity.clone(),
            fencing_token: lease.fencing_token,
            script: spec.script.clone(),
            shard: spec.shard.clone(),
            agent,
            stop_rx,
            state: Arc::new(ShardExecutionState::new()),
        }
    }

    /// Shared handle to the episode state
    pub fn state(&self) -> Arc<ShardExecutionState> {
        Arc::clone(&self.state)
    }

    /// Run the episode to completion.
    ///
    /// Returns the terminal phase (always [`DriverPhase::Stopped`]); the
    /// interesting outcome is visible through the shared state and
    /// metrics.
    pub async fn run(mut self) -> DriverPhase {
        self.state.set_phase(DriverPhase::Initializing).await;
        debug!(shard = %self.identity, token = self.fencing_token, "episode initializing");

        if let Err(e) = self.agent.init(&self.script, &self.shard).await {
            let err = ColonyError::InitFailed {
                identity: self.identity.to_string(),
                message: e.to_string(),
            };
            error!(shard = %self.identity, token = self.fencing_token, error = %err,
                   "agent init failed; episode stopped, fleet will retry");
            standard::INIT_FAILURES.inc();
            self.state.set_phase(DriverPhase::Stopped).await;
            return DriverPhase::Stopped;
        }
        self.state.mark_initialized();
        self.state.set_phase(DriverPhase::Working).await;
        info!(shard = %self.identity, token = self.fencing_token,
              max_sleep_ms = self.shard.max_sleep_ms, "episode entered work loop");

        loop {
            // Ownership belief is never older than one pause.
            if self.stop_requested() {
                break;
            }

            let started = Instant::now();
            match self.agent.work().await {
                Ok(()) => {
                    standard::WORK_CYCLES.inc();
                }
                Err(e) => {
                    let err = ColonyError::WorkFailed {
                        identity: self.identity.to_string(),
                        message: e.to_string(),
                    };
                    warn!(shard = %self.identity, error = %err, "agent work failed; continuing");
                    standard::WORK_FAILURES.inc();
                }
            }
            standard::WORK_DURATION.observe(started.elapsed().as_secs_f64());
            self.state.record_work().await;

            self.pause().await;
        }

        self.state.set_phase(DriverPhase::Stopped).await;
        debug!(shard = %self.identity, token = self.fencing_token,
               cycles = self.state.work_cycles(), "episode stopped");
        DriverPhase::Stopped
    }

    fn stop_requested(&self) -> bool {
        // A dropped sender means the tracker is gone; halt rather than
        // run unowned.
        *self.stop_rx.borrow() || self.stop_rx.has_changed().is_err()
    }

    /// Sleep at most the shard's budget, waking early on the
    /// ownership-lost signal. A zero budget still yields so the loop
    /// cannot starve the runtime.
    async fn pause(&mut self) {
        let max_sleep = Duration::from_millis(self.shard.max_sleep_ms);
        if max_sleep.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = sleep(max_sleep) => {}
            _ = self.stop_rx.changed() => {}
        }
    }
}
