//! Ownership tracker
//!
//! Maintains the live set of shards this worker owns. One maintenance
//! cycle per heartbeat: reap exited drivers, renew held leases, and race
//! for watched-but-unowned shards whose jittered retry deadline has
//! passed. Idle retrying is the whole failover story: every worker
//! hammers acquire on expired leases until one conditional write wins.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::runtime::Handle;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::driver::ExecutionDriver;
use super::state::ShardExecutionState;
use crate::agent::AgentFactory;
use crate::catalog::VersionCatalog;
use crate::config::WorkerConfig;
use crate::error::Result;
use crate::lease::{Lease, LeaseManager};
use crate::metrics::standard;
use crate::runtime::ShutdownListener;
use crate::shard::{ShardIdentity, ShardSpec};

struct WatchEntry {
    spec: ShardSpec,
    next_attempt_at: Instant,
}

struct OwnedShard {
    lease: Lease,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    state: Arc<ShardExecutionState>,
}

impl OwnedShard {
    fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Per-worker-process ownership tracker.
///
/// Drives the lease lifecycle transparently to the execution drivers:
/// acquisition spawns a driver bound to the new lease, renewal failure
/// signals it to stop. Store calls never outlive their deadline, and any
/// doubt about a renewal resolves toward relinquishing ownership.
pub struct OwnershipTracker {
    owner_id: String,
    config: WorkerConfig,
    leases: Arc<LeaseManager>,
    catalog: Arc<dyn VersionCatalog>,
    agents: Arc<dyn AgentFactory>,
    watched: RwLock<HashMap<ShardIdentity, WatchEntry>>,
    owned: RwLock<HashMap<ShardIdentity, OwnedShard>>,
    driver_handle: Option<Handle>,
    started_at: Instant,
}

impl OwnershipTracker {
    /// Create a tracker for one worker process
    pub fn new(
        owner_id: impl Into<String>,
        config: WorkerConfig,
        leases: Arc<LeaseManager>,
        catalog: Arc<dyn VersionCatalog>,
        agents: Arc<dyn AgentFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            owner_id: owner_id.into(),
            config,
            leases,
            catalog,
            agents,
            watched: RwLock::new(HashMap::new()),
            owned: RwLock::new(HashMap::new()),
            driver_handle: None,
            started_at: Instant::now(),
        })
    }

    /// Spawn execution drivers onto a dedicated runtime instead of the
    /// tracker's own.
    pub fn with_driver_handle(mut self, handle: Handle) -> Self {
        self.driver_handle = Some(handle);
        self
    }

    /// This worker's owner id
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Time since this worker process started tracking
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Start watching a shard; it becomes eligible for acquisition on the
    /// next cycle after a small decorrelating jitter.
    pub async fn watch(&self, spec: ShardSpec) {
        let next_attempt_at = Instant::now() + self.jitter();
        let identity = spec.identity.clone();
        self.watched.write().await.insert(
            identity.clone(),
            WatchEntry {
                spec,
                next_attempt_at,
            },
        );
        debug!(shard = %identity, "watching shard");
    }

    /// Stop watching a shard; if owned, the episode halts and the lease
    /// is released.
    pub async fn unwatch(&self, identity: &ShardIdentity) {
        self.watched.write().await.remove(identity);
        if let Some(entry) = self.owned.write().await.remove(identity) {
            entry.signal_stop();
            self.leases.release(&entry.lease).await;
            info!(shard = %identity, "shard unwatched; lease released");
        }
    }

    /// Number of shards currently owned
    pub async fn owned_count(&self) -> usize {
        self.owned.read().await.len()
    }

    /// Whether this worker currently believes it owns a shard
    pub async fn is_owner(&self, identity: &ShardIdentity) -> bool {
        self.owned.read().await.contains_key(identity)
    }

    /// Episode state of an owned shard, if any
    pub async fn execution_state(&self, identity: &ShardIdentity) -> Option<Arc<ShardExecutionState>> {
        self.owned
            .read()
            .await
            .get(identity)
            .map(|e| Arc::clone(&e.state))
    }

    /// Run maintenance cycles until shutdown, then stop every episode
    /// and release what is still held.
    pub async fn run(&self, mut shutdown: ShutdownListener) {
        info!(owner_id = %self.owner_id, heartbeat_ms = self.config.heartbeat_interval.as_millis() as u64,
              ttl_ms = self.config.lease_ttl.as_millis() as u64, "ownership tracker starting");

        let mut ticker = interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.maintain().await,
                _ = shutdown.wait() => break,
            }
        }

        self.stop_all().await;
        info!(owner_id = %self.owner_id, uptime_secs = self.uptime().as_secs(),
              "ownership tracker stopped");
    }

    /// One maintenance cycle: reap, renew, acquire.
    pub async fn maintain(&self) {
        self.reap_finished().await;
        self.renew_owned().await;
        self.acquire_watched().await;

        standard::OWNED_SHARDS.set(self.owned.read().await.len() as i64);
        standard::WATCHED_SHARDS.set(self.watched.read().await.len() as i64);
    }

    /// Remove entries whose driver exited on its own (init failure or a
    /// stop that completed) and release their leases so the shard is
    /// immediately reacquirable instead of waiting out the TTL.
    async fn reap_finished(&self) {
        let finished: Vec<ShardIdentity> = {
            let owned = self.owned.read().await;
            owned
                .iter()
                .filter(|(_, e)| e.handle.is_finished())
                .map(|(id, _)| id.clone())
                .collect()
        };

        for identity in finished {
            if let Some(entry) = self.owned.write().await.remove(&identity) {
                self.leases.release(&entry.lease).await;
                self.schedule_retry(&identity).await;
                info!(shard = %identity, cycles = entry.state.work_cycles(),
                      "episode ended; lease released");
            }
        }
    }

    /// Renew every held lease. Any failure (denial, store fault, or
    /// timeout) revokes local ownership immediately; the store's TTL is
    /// the only authority worth trusting.
    async fn renew_owned(&self) {
        let held: Vec<(ShardIdentity, Lease)> = {
            let owned = self.owned.read().await;
            owned
                .iter()
                .map(|(id, e)| (id.clone(), e.lease.clone()))
                .collect()
        };

        for (identity, lease) in held {
            if !self.catalog.is_schedulable(&identity).await {
                info!(shard = %identity, "version no longer schedulable; stopping episode");
                self.revoke(&identity, true).await;
                continue;
            }

            let started = Instant::now();
            match self.leases.renew(&lease).await {
                Ok(renewed) => {
                    standard::RENEW_DURATION.observe(started.elapsed().as_secs_f64());
                    if let Some(entry) = self.owned.write().await.get_mut(&identity) {
                        entry.lease = renewed;
                    }
                }
                Err(e) if e.is_denial() => {
                    info!(shard = %identity, "lease reassigned; ownership lost");
                    standard::LEASES_LOST.inc();
                    // The token is stale; deleting would be a no-op at
                    // best, so skip the release.
                    self.revoke(&identity, false).await;
                }
                Err(e) => {
                    warn!(shard = %identity, error = %e,
                          "renewal did not complete; relinquishing ownership");
                    standard::LEASES_LOST.inc();
                    self.revoke(&identity, true).await;
                }
            }
        }
    }

    /// Race for watched-but-unowned shards whose retry deadline passed
    async fn acquire_watched(&self) {
        let now = Instant::now();
        let due: Vec<ShardSpec> = {
            let watched = self.watched.read().await;
            let owned = self.owned.read().await;
            watched
                .values()
                .filter(|e| e.next_attempt_at <= now && !owned.contains_key(&e.spec.identity))
                .map(|e| e.spec.clone())
                .collect()
        };

        for spec in due {
            let identity = spec.identity.clone();
            if !self.catalog.is_schedulable(&identity).await {
                self.schedule_retry(&identity).await;
                continue;
            }

            match self.leases.acquire(&identity, &self.owner_id).await {
                Ok(Some(lease)) => {
                    standard::LEASES_ACQUIRED.inc();
                    self.start_episode(spec, lease).await;
                }
                Ok(None) => {
                    // Expected outcome of the race; someone else holds it.
                    standard::ACQUIRE_DENIED.inc();
                    self.schedule_retry(&identity).await;
                }
                Err(e) => {
                    debug!(shard = %identity, error = %e, "acquire attempt failed; will retry");
                    self.schedule_retry(&identity).await;
                }
            }
        }
    }

    /// Bind a fresh driver to a newly won lease and start it
    async fn start_episode(&self, spec: ShardSpec, lease: Lease) {
        let identity = spec.identity.clone();
        let agent = match self.agents.build(&identity) {
            Ok(agent) => agent,
            Err(e) => {
                warn!(shard = %identity, error = %e, "agent factory failed; releasing lease");
                self.leases.release(&lease).await;
                self.schedule_retry(&identity).await;
                return;
            }
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        let driver = ExecutionDriver::new(&spec, &lease, agent, stop_rx);
        let state = driver.state();
        let run = async move {
            driver.run().await;
        };
        let handle = match &self.driver_handle {
            Some(h) => h.spawn(run),
            None => tokio::spawn(run),
        };

        info!(shard = %identity, owner = %self.owner_id, token = lease.fencing_token,
              "lease acquired; episode started");
        self.owned.write().await.insert(
            identity,
            OwnedShard {
                lease,
                stop_tx,
                handle,
                state,
            },
        );
    }

    /// Drop local ownership: signal the driver, forget the lease, and
    /// schedule the shard for reacquisition attempts.
    async fn revoke(&self, identity: &ShardIdentity, release: bool) {
        if let Some(entry) = self.owned.write().await.remove(identity) {
            entry.signal_stop();
            if release {
                self.leases.release(&entry.lease).await;
            }
        }
        self.schedule_retry(identity).await;
    }

    /// Stop every episode and release held leases. Used on shutdown.
    async fn stop_all(&self) {
        let entries: Vec<(ShardIdentity, OwnedShard)> = self.owned.write().await.drain().collect();
        for (identity, entry) in entries {
            entry.signal_stop();
            if let Err(e) = entry.handle.await {
                warn!(shard = %identity, error = %e, "driver task failed to join");
            }
            self.leases.release(&entry.lease).await;
            debug!(shard = %identity, "episode stopped on shutdown");
        }
    }

    /// Push a watched shard's next acquire attempt one heartbeat plus
    /// jitter into the future, decorrelating retries across the fleet.
    async fn schedule_retry(&self, identity: &ShardIdentity) {
        let next = Instant::now() + self.config.heartbeat_interval + self.jitter();
        if let Some(entry) = self.watched.write().await.get_mut(identity) {
            entry.next_attempt_at = next;
        }
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.config.retry_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}
