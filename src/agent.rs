//! The agent contract
//!
//! Two operations, implemented once per agent version: `init` runs exactly
//! once per ownership episode, `work` runs repeatedly on a bounded cadence.

use async_trait::async_trait;

use crate::config::{ScriptConfig, ShardConfig};
use crate::error::Result;
use crate::shard::ShardIdentity;

/// User-supplied agent logic for one shard.
///
/// Errors from either operation are reported, never treated as loss of
/// ownership: a failed `init` ends the episode (the fleet retries via a
/// fresh acquisition), a failed `work` call is logged and the loop
/// continues.
#[async_trait]
pub trait Agent: Send {
    /// One-time episode initialization, strictly ordered before any `work`
    async fn init(&mut self, script: &ScriptConfig, shard: &ShardConfig) -> Result<()>;

    /// One work step. May be interrupted at any point by a process crash;
    /// partial effects are the state store's problem, not this core's.
    async fn work(&mut self) -> Result<()>;
}

/// Resolves a shard identity to a fresh agent instance.
///
/// One statically-resolved binding per (agent id, version); versions are
/// immutable once active, so the binding never changes after activation.
pub trait AgentFactory: Send + Sync {
    /// Build a new agent instance for one ownership episode
    fn build(&self, identity: &ShardIdentity) -> Result<Box<dyn Agent>>;
}
