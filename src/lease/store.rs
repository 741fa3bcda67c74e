//! Lease store port
//!
//! Three atomic primitives over a durable key-value collaborator. No
//! component performs a non-atomic read-then-write against the store.

use async_trait::async_trait;
use tokio::time::{Duration, Instant};

use crate::error::Result;
use crate::shard::ShardIdentity;

/// A time-bounded, exclusively-held ownership grant.
///
/// For a given identity, at most one lease with `expires_at` in the
/// future exists at any instant as observed by the store, and
/// `fencing_token` strictly increases across the identity's history,
/// including across store restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// Shard this lease grants ownership of
    pub identity: ShardIdentity,
    /// Worker process holding the grant
    pub owner_id: String,
    /// Monotonically increasing token invalidating stale owners
    pub fencing_token: u64,
    /// Expiry instant; past this the shard is up for grabs
    pub expires_at: Instant,
}

impl Lease {
    /// Whether the grant has lapsed
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time left on the grant, zero if lapsed
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Port to the durable lease store.
///
/// Each primitive must be atomic as perceived by all workers. Implementors
/// must keep a per-identity fencing token watermark that survives record
/// deletion and store restarts, so tokens are never reissued.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Write a fresh lease if the identity has no live one.
    ///
    /// Returns `Ok(None)` when an unexpired lease exists (the race was
    /// lost); the caller retries later. On success the returned lease
    /// carries a token one above the highest ever issued for the identity.
    async fn put_if_absent_or_expired(
        &self,
        identity: &ShardIdentity,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<Option<Lease>>;

    /// Extend the lease carrying exactly `fencing_token`.
    ///
    /// Returns `Ok(None)` if the record expired, was reassigned, or the
    /// token does not match the current one. A stale token must never
    /// silently succeed.
    async fn compare_and_swap_on_token(
        &self,
        identity: &ShardIdentity,
        fencing_token: u64,
        ttl: Duration,
    ) -> Result<Option<Lease>>;

    /// Remove the lease if `fencing_token` still matches.
    ///
    /// Returns whether a record was removed. The token watermark is kept.
    async fn delete(&self, identity: &ShardIdentity, fencing_token: u64) -> Result<bool>;
}
