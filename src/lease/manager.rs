//! Lease manager
//!
//! Acquire/renew/release over the store port, with every call bounded by
//! a deadline shorter than the heartbeat interval. The manager never
//! blocks its caller on a slow store.

use std::sync::Arc;

use tokio::time::{timeout, Duration};
use tracing::debug;

use super::store::{Lease, LeaseStore};
use crate::error::{ColonyError, Result};
use crate::shard::ShardIdentity;
use crate::{DEFAULT_LEASE_TTL_SECS, DEFAULT_STORE_TIMEOUT_MS};

/// Configuration for the lease manager
#[derive(Debug, Clone)]
pub struct LeaseManagerConfig {
    /// Time-to-live written on acquire and renew
    pub ttl: Duration,
    /// Deadline applied to each store call
    pub store_timeout: Duration,
}

impl Default for LeaseManagerConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_LEASE_TTL_SECS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

/// Wraps the lease store with acquire/renew/release semantics and
/// fencing-token issuance.
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    config: LeaseManagerConfig,
}

impl LeaseManager {
    /// Create a manager over a store
    pub fn new(store: Arc<dyn LeaseStore>, config: LeaseManagerConfig) -> Self {
        Self { store, config }
    }

    /// TTL written on successful acquire/renew
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Attempt to take ownership of a shard.
    ///
    /// `Ok(None)` means another owner holds a live lease or won the race;
    /// retry later. A store timeout is also reported as an error here, not
    /// a denial: the write may or may not have landed, and if it did the
    /// orphaned lease simply expires.
    pub async fn acquire(&self, identity: &ShardIdentity, owner_id: &str) -> Result<Option<Lease>> {
        let call = self
            .store
            .put_if_absent_or_expired(identity, owner_id, self.config.ttl);
        match timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        }
    }

    /// Extend a held lease.
    ///
    /// Fails with [`ColonyError::LeaseDenied`] when the store no longer
    /// honors the lease's fencing token (expired, reassigned, or raced
    /// away). On any failure, including timeout, the caller must stop
    /// treating itself as owner immediately; there is no grace period.
    pub async fn renew(&self, lease: &Lease) -> Result<Lease> {
        let call = self.store.compare_and_swap_on_token(
            &lease.identity,
            lease.fencing_token,
            self.config.ttl,
        );
        match timeout(self.config.store_timeout, call).await {
            Ok(Ok(Some(renewed))) => Ok(renewed),
            Ok(Ok(None)) => Err(ColonyError::LeaseDenied {
                identity: lease.identity.to_string(),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(self.timeout_error()),
        }
    }

    /// Give up a lease.
    ///
    /// Best-effort: a worker that crashes without releasing is handled by
    /// TTL expiry alone, so failures here are logged and dropped.
    pub async fn release(&self, lease: &Lease) {
        let call = self.store.delete(&lease.identity, lease.fencing_token);
        match timeout(self.config.store_timeout, call).await {
            Ok(Ok(removed)) => {
                debug!(shard = %lease.identity, token = lease.fencing_token, removed, "lease released");
            }
            Ok(Err(e)) => {
                debug!(shard = %lease.identity, error = %e, "lease release failed; expiry will clean up");
            }
            Err(_) => {
                debug!(shard = %lease.identity, "lease release timed out; expiry will clean up");
            }
        }
    }

    fn timeout_error(&self) -> ColonyError {
        ColonyError::StoreTimeout {
            waited_ms: self.config.store_timeout.as_millis() as u64,
        }
    }
}
