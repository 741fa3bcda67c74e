//! Episode execution state
//!
//! Tracks one ownership episode's phase and progress. Discarded on
//! ownership loss; a reacquisition starts from a fresh state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Phase of an execution driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverPhase {
    /// Just instantiated
    Starting,
    /// Running the one-time agent init
    Initializing,
    /// In the work/sleep loop
    Working,
    /// Terminal for this episode
    Stopped,
}

/// Execution state of one shard during one ownership episode
pub struct ShardExecutionState {
    phase: RwLock<DriverPhase>,
    initialized: AtomicBool,
    work_cycles: AtomicU64,
    last_work_at: RwLock<Option<Instant>>,
}

impl ShardExecutionState {
    /// Fresh state for a new episode
    pub fn new() -> Self {
        Self {
            phase: RwLock::new(DriverPhase::Starting),
            initialized: AtomicBool::new(false),
            work_cycles: AtomicU64::new(0),
            last_work_at: RwLock::new(None),
        }
    }

    /// Current phase
    pub async fn phase(&self) -> DriverPhase {
        *self.phase.read().await
    }

    /// Set phase
    pub async fn set_phase(&self, phase: DriverPhase) {
        *self.phase.write().await = phase;
    }

    /// Mark init complete. Returns whether this was the first call;
    /// true exactly once per episode.
    pub fn mark_initialized(&self) -> bool {
        !self.initialized.swap(true, Ordering::SeqCst)
    }

    /// Whether init has completed this episode
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Record one completed work call
    pub async fn record_work(&self) {
        self.work_cycles.fetch_add(1, Ordering::Relaxed);
        *self.last_work_at.write().await = Some(Instant::now());
    }

    /// Work calls completed this episode
    pub fn work_cycles(&self) -> u64 {
        self.work_cycles.load(Ordering::Relaxed)
    }

    /// Instant of the most recent work call, if any
    pub async fn last_work_at(&self) -> Option<Instant> {
        *self.last_work_at.read().await
    }
}

impl Default for ShardExecutionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_phase_transitions() {
        let state = ShardExecutionState::new();
        assert_eq!(state.phase().await, DriverPhase::Starting);

        state.set_phase(DriverPhase::Working).await;
        assert_eq!(state.phase().await, DriverPhase::Working);
    }

    #[test]
    fn test_mark_initialized_once() {
        let state = ShardExecutionState::new();
        assert!(state.mark_initialized());
        assert!(!state.mark_initialized());
        assert!(state.is_initialized());
    }

    #[tokio::test]
    async fn test_record_work() {
        let state = ShardExecutionState::new();
        assert!(state.last_work_at().await.is_none());

        state.record_work().await;
        state.record_work().await;

        assert_eq!(state.work_cycles(), 2);
        assert!(state.last_work_at().await.is_some());
    }
}
