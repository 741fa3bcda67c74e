//! In-memory lease store
//!
//! Single-process implementation of the store port. All three primitives
//! run under one mutex, giving the same atomicity a conditional-write
//! store provides. Fencing token watermarks outlive record deletion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{Duration, Instant};

use super::store::{Lease, LeaseStore};
use crate::error::{ColonyError, Result};
use crate::shard::ShardIdentity;

#[derive(Debug, Default)]
struct Slot {
    lease: Option<Lease>,
    /// Highest token ever issued for this identity; never reset
    high_token: u64,
}

/// In-memory lease store.
///
/// Suitable for tests and single-process deployments; fleet deployments
/// point the same port at a shared conditional-write store.
#[derive(Default)]
pub struct InMemoryLeaseStore {
    slots: Mutex<HashMap<ShardIdentity, Slot>>,
    outage: AtomicBool,
}

impl InMemoryLeaseStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming unreachable; every call fails until
    /// cleared. Test hook for the unavailable-store failure paths.
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Current fencing token watermark for an identity, if any was issued
    pub fn high_token(&self, identity: &ShardIdentity) -> Option<u64> {
        self.slots.lock().get(identity).map(|s| s.high_token)
    }

    fn check_available(&self) -> Result<()> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(ColonyError::StoreUnavailable {
                message: "simulated outage".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn put_if_absent_or_expired(
        &self,
        identity: &ShardIdentity,
        owner_id: &str,
        ttl: Duration,
    ) -> Result<Option<Lease>> {
        self.check_available()?;
        let now = Instant::now();
        let mut slots = self.slots.lock();
        let slot = slots.entry(identity.clone()).or_default();

        if let Some(current) = &slot.lease {
            if current.expires_at > now {
                return Ok(None);
            }
        }

        slot.high_token += 1;
        let lease = Lease {
            identity: identity.clone(),
            owner_id: owner_id.to_string(),
            fencing_token: slot.high_token,
            expires_at: now + ttl,
        };
        slot.lease = Some(lease.clone());
        Ok(Some(lease))
    }

    async fn compare_and_swap_on_token(
        &self,
        identity: &ShardIdentity,
        fencing_token: u64,
        ttl: Duration,
    ) -> Result<Option<Lease>> {
        self.check_available()?;
        let now = Instant::now();
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(identity) else {
            return Ok(None);
        };
        let Some(current) = &mut slot.lease else {
            return Ok(None);
        };

        if current.fencing_token != fencing_token || current.expires_at <= now {
            return Ok(None);
        }

        current.expires_at = now + ttl;
        Ok(Some(current.clone()))
    }

    async fn delete(&self, identity: &ShardIdentity, fencing_token: u64) -> Result<bool> {
        self.check_available()?;
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(identity) else {
            return Ok(false);
        };
        match &slot.lease {
            Some(current) if current.fencing_token == fencing_token => {
                slot.lease = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
