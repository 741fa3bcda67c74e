//! Unit tests for the ownership tracker
//!
//! Acquisition, renewal, revocation on store trouble, version deletion
//! mid-episode, and the crash-takeover handover. Cycles are driven by
//! calling `maintain` directly so timing stays deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{advance, sleep, Duration};

use colony_core::agent::{Agent, AgentFactory};
use colony_core::catalog::InMemoryCatalog;
use colony_core::config::{ScriptConfig, ShardConfig, WorkerConfig};
use colony_core::error::Result;
use colony_core::lease::{InMemoryLeaseStore, LeaseManager, LeaseManagerConfig, LeaseStore};
use colony_core::shard::{ShardIdentity, ShardSpec};
use colony_core::worker::OwnershipTracker;

#[derive(Default)]
struct Counts {
    inits: AtomicU64,
    works: AtomicU64,
}

struct CountingAgent {
    counts: Arc<Counts>,
}

#[async_trait]
impl Agent for CountingAgent {
    async fn init(&mut self, _script: &ScriptConfig, _shard: &ShardConfig) -> Result<()> {
        self.counts.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn work(&mut self) -> Result<()> {
        self.counts.works.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingFactory {
    counts: Arc<Counts>,
}

impl AgentFactory for CountingFactory {
    fn build(&self, _identity: &ShardIdentity) -> Result<Box<dyn Agent>> {
        Ok(Box::new(CountingAgent {
            counts: self.counts.clone(),
        }))
    }
}

struct Fixture {
    store: Arc<InMemoryLeaseStore>,
    catalog: Arc<InMemoryCatalog>,
    counts: Arc<Counts>,
    config: WorkerConfig,
}

impl Fixture {
    async fn new() -> Self {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog
            .register_version("counter", 1, vec![0])
            .await
            .unwrap();
        Self {
            store: Arc::new(InMemoryLeaseStore::new()),
            catalog,
            counts: Arc::new(Counts::default()),
            // Jitter zeroed so retry deadlines land exactly one
            // heartbeat out.
            config: WorkerConfig {
                lease_ttl: Duration::from_millis(300),
                heartbeat_interval: Duration::from_millis(100),
                store_timeout: Duration::from_millis(50),
                retry_jitter: Duration::ZERO,
            },
        }
    }

    fn tracker(&self, owner: &str) -> OwnershipTracker {
        let leases = Arc::new(LeaseManager::new(
            self.store.clone(),
            LeaseManagerConfig {
                ttl: self.config.lease_ttl,
                store_timeout: self.config.store_timeout,
            },
        ));
        OwnershipTracker::new(
            owner,
            self.config.clone(),
            leases,
            self.catalog.clone(),
            Arc::new(CountingFactory {
                counts: self.counts.clone(),
            }),
        )
        .unwrap()
    }

    fn spec(&self) -> ShardSpec {
        ShardSpec::new(
            ShardIdentity::new("counter", 1, 0),
            ScriptConfig::default(),
            ShardConfig::new(0, 1).with_max_sleep_ms(20),
        )
    }
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_starts_an_episode() {
    let fx = Fixture::new().await;
    let tracker = fx.tracker("w1");
    let shard = fx.spec().identity;

    tracker.watch(fx.spec()).await;
    tracker.maintain().await;

    assert!(tracker.is_owner(&shard).await);
    assert_eq!(tracker.owned_count().await, 1);

    // Let the driver do some cycles.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(fx.counts.inits.load(Ordering::SeqCst), 1);
    assert!(fx.counts.works.load(Ordering::SeqCst) >= 1);

    let state = tracker.execution_state(&shard).await.unwrap();
    assert!(state.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn test_renewal_keeps_ownership_past_ttl() {
    let fx = Fixture::new().await;
    let tracker = fx.tracker("w1");
    let shard = fx.spec().identity;

    tracker.watch(fx.spec()).await;
    tracker.maintain().await;

    // Six heartbeats, twice the TTL.
    for _ in 0..6 {
        advance(Duration::from_millis(100)).await;
        tracker.maintain().await;
    }

    assert!(tracker.is_owner(&shard).await);
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_relinquishes_ownership() {
    let fx = Fixture::new().await;
    let tracker = fx.tracker("w1");
    let shard = fx.spec().identity;

    tracker.watch(fx.spec()).await;
    tracker.maintain().await;
    assert!(tracker.is_owner(&shard).await);

    fx.store.set_outage(true);
    tracker.maintain().await;

    assert!(
        !tracker.is_owner(&shard).await,
        "store trouble must fail toward relinquishing, never toward assuming ownership"
    );
}

#[tokio::test(start_paused = true)]
async fn test_reassigned_lease_revokes_without_release() {
    let fx = Fixture::new().await;
    let tracker = fx.tracker("w1");
    let shard = fx.spec().identity;

    tracker.watch(fx.spec()).await;
    tracker.maintain().await;
    assert!(tracker.is_owner(&shard).await);

    // Another owner takes over after expiry behind this tracker's back.
    advance(Duration::from_millis(400)).await;
    let usurper = fx
        .store
        .put_if_absent_or_expired(&shard, "w2", Duration::from_secs(10))
        .await
        .unwrap()
        .unwrap();

    tracker.maintain().await;
    assert!(!tracker.is_owner(&shard).await);

    // The usurper's lease must still be intact.
    let renewed = fx
        .store
        .compare_and_swap_on_token(&shard, usurper.fencing_token, Duration::from_secs(10))
        .await
        .unwrap();
    assert!(renewed.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_version_deletion_stops_the_episode() {
    let fx = Fixture::new().await;
    let tracker = fx.tracker("w1");
    let shard = fx.spec().identity;

    tracker.watch(fx.spec()).await;
    tracker.maintain().await;
    assert!(tracker.is_owner(&shard).await);

    fx.catalog.force_delete("counter", 1).await.unwrap();
    tracker.maintain().await;

    assert!(!tracker.is_owner(&shard).await);

    // And it never comes back while the version stays deleted.
    advance(Duration::from_millis(200)).await;
    tracker.maintain().await;
    assert!(!tracker.is_owner(&shard).await);
}

#[tokio::test(start_paused = true)]
async fn test_crash_takeover_reinitializes_with_higher_token() {
    let fx = Fixture::new().await;
    let shard = fx.spec().identity;

    let w1 = fx.tracker("w1");
    w1.watch(fx.spec()).await;
    w1.maintain().await;
    assert!(w1.is_owner(&shard).await);
    let w1_token = fx.store.high_token(&shard).unwrap();

    sleep(Duration::from_millis(50)).await;
    let inits_before = fx.counts.inits.load(Ordering::SeqCst);
    assert_eq!(inits_before, 1);

    // Crash: the worker vanishes without releasing. Dropping the tracker
    // tears down its driver the way a dead process would stop working.
    drop(w1);

    let w2 = fx.tracker("w2");
    w2.watch(fx.spec()).await;

    // Before expiry the lease still denies.
    w2.maintain().await;
    assert!(!w2.is_owner(&shard).await);

    // Past TTL plus a retry interval the takeover lands.
    advance(Duration::from_millis(400)).await;
    w2.maintain().await;
    assert!(w2.is_owner(&shard).await);

    let w2_token = fx.store.high_token(&shard).unwrap();
    assert!(w2_token > w1_token, "takeover must fence out the old owner");

    // Fresh episode, fresh init, even though the first owner already
    // initialized once.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.counts.inits.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unwatch_releases_immediately() {
    let fx = Fixture::new().await;
    let tracker = fx.tracker("w1");
    let shard = fx.spec().identity;

    tracker.watch(fx.spec()).await;
    tracker.maintain().await;
    assert!(tracker.is_owner(&shard).await);

    tracker.unwatch(&shard).await;
    assert!(!tracker.is_owner(&shard).await);

    // Released, not abandoned: a peer can take it without waiting for
    // expiry.
    let next = fx
        .store
        .put_if_absent_or_expired(&shard, "w2", Duration::from_secs(1))
        .await
        .unwrap();
    assert!(next.is_some());
}
