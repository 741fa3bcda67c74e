//! Error types for Colony
//!
//! Taxonomy covering lease store, configuration, catalog, and agent
//! execution failures.

use thiserror::Error;

/// Primary error type for all Colony operations
#[derive(Debug, Error)]
pub enum ColonyError {
    // ========== Lease Errors ==========

    /// Lease store could not be reached or rejected the call
    #[error("lease store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Lease store call exceeded its deadline
    #[error("lease store call timed out after {waited_ms}ms")]
    StoreTimeout { waited_ms: u64 },

    /// Renewal presented a fencing token the store no longer honors
    #[error("lease denied for {identity}")]
    LeaseDenied { identity: String },

    // ========== Configuration Errors ==========

    /// Heartbeat/TTL relation violated
    #[error("invalid timing: heartbeat {heartbeat_ms}ms must be at most a third of ttl {ttl_ms}ms")]
    InvalidTiming { heartbeat_ms: u64, ttl_ms: u64 },

    /// Store timeout must leave room for a renewal within a heartbeat
    #[error("invalid timing: store timeout {timeout_ms}ms must be below heartbeat {heartbeat_ms}ms")]
    StoreTimeoutTooLarge { timeout_ms: u64, heartbeat_ms: u64 },

    /// Shard parameter file failed validation
    #[error("invalid shard spec: {reason}")]
    InvalidShardSpec { reason: String },

    /// Config file could not be read or parsed
    #[error("config error at {path}: {message}")]
    ConfigIo { path: String, message: String },

    // ========== Catalog Errors ==========

    /// Version is not known to the catalog
    #[error("unknown agent version {agent_id} v{version}")]
    UnknownVersion { agent_id: String, version: u32 },

    /// Version already registered
    #[error("agent version {agent_id} v{version} already registered")]
    VersionExists { agent_id: String, version: u32 },

    // ========== Execution Errors ==========

    /// Agent init failed; the episode stops and the fleet retries
    #[error("init failed for {identity}: {message}")]
    InitFailed { identity: String, message: String },

    /// Agent work call failed; the episode continues
    #[error("work failed for {identity}: {message}")]
    WorkFailed { identity: String, message: String },

    /// Failure raised by agent code itself
    #[error("agent failure: {message}")]
    AgentFailure { message: String },

    // ========== Runtime Errors ==========

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ColonyError {
    /// Returns true if the operation may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ColonyError::StoreUnavailable { .. } | ColonyError::StoreTimeout { .. }
        )
    }

    /// Returns true if this is a lease denial rather than a store fault.
    /// A denial means another owner holds the lease; the caller must stop
    /// treating itself as owner immediately.
    pub fn is_denial(&self) -> bool {
        matches!(self, ColonyError::LeaseDenied { .. })
    }
}

/// Result type alias for Colony operations
pub type Result<T> = std::result::Result<T, ColonyError>;
