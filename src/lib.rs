//! Colony Core - shard ownership and liveness coordination
//!
//! This crate provides the coordination core for a fleet of replicated
//! workers running user-supplied agents:
//! - Lease-based mutual exclusion with fencing tokens
//! - Per-shard execution driving (`init` once, `work` on a bounded cadence)
//! - Decentralized failover by jittered lease racing
//! - Version lifecycle gating of schedulable shards

pub mod agent;
pub mod catalog;
pub mod config;
pub mod error;
pub mod lease;
pub mod metrics;
pub mod runtime;
pub mod shard;
pub mod starters;
pub mod worker;

pub use error::ColonyError;
pub use runtime::ColonyRuntime;

/// Default lease time-to-live in seconds
pub const DEFAULT_LEASE_TTL_SECS: u64 = 10;

/// Default lease renewal heartbeat interval in seconds
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 3;

/// Default upper bound on a single lease store call, in milliseconds
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 1_000;

/// Default maximum jitter added to acquire retries, in milliseconds
pub const DEFAULT_RETRY_JITTER_MS: u64 = 500;

/// Days an agent version pending deletion remains schedulable before purge
pub const DELETION_GRACE_DAYS: i64 = 30;
