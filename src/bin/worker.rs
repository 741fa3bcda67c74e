//! Worker service binary

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use colony_core::catalog::InMemoryCatalog;
use colony_core::config::{discover_shards, ScriptConfig, ShardConfig, WorkerConfig};
use colony_core::lease::{InMemoryLeaseStore, LeaseManager, LeaseManagerConfig};
use colony_core::runtime::{ColonyRuntime, RuntimeConfig, ShutdownSignal};
use colony_core::shard::{ShardIdentity, ShardSpec};
use colony_core::starters::StarterAgents;
use colony_core::worker::OwnershipTracker;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting Colony Worker");

    let worker_config = WorkerConfig::from_env();
    worker_config.validate()?;

    let agent_id = std::env::var("COLONY_AGENT").unwrap_or_else(|_| "printer".into());
    let agent_version: u32 = std::env::var("COLONY_AGENT_VERSION")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let owner_id = std::env::var("COLONY_OWNER_ID")
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());
    let metrics_addr: SocketAddr = std::env::var("COLONY_METRICS_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:9100".into())
        .parse()?;

    // Resolve the shard set: a config directory when given, otherwise a
    // synthesized pool of COLONY_SHARDS shards.
    let specs = match std::env::var("COLONY_CONFIG_DIR") {
        Ok(dir) => discover_shards(&agent_id, agent_version, &PathBuf::from(dir))?,
        Err(_) => {
            let count: u32 = std::env::var("COLONY_SHARDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4);
            (0..count)
                .map(|id| {
                    ShardSpec::new(
                        ShardIdentity::new(agent_id.clone(), agent_version, id),
                        ScriptConfig::default(),
                        ShardConfig::new(id, count),
                    )
                })
                .collect()
        }
    };

    // In-process store and catalog; fleet deployments point these ports
    // at shared services.
    let store = Arc::new(InMemoryLeaseStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let leases = Arc::new(LeaseManager::new(
        store,
        LeaseManagerConfig {
            ttl: worker_config.lease_ttl,
            store_timeout: worker_config.store_timeout,
        },
    ));

    let runtime = ColonyRuntime::new(RuntimeConfig::default())?;

    let shard_ids: Vec<u32> = specs.iter().map(|s| s.identity.shard_id).collect();
    let tracker = Arc::new(
        OwnershipTracker::new(
            owner_id.clone(),
            worker_config,
            leases,
            catalog.clone(),
            Arc::new(StarterAgents),
        )?
        .with_driver_handle(runtime.agent_handle()),
    );

    let shutdown = ShutdownSignal::new();

    runtime.block_on_coordination(async {
        catalog
            .register_version(&agent_id, agent_version, shard_ids)
            .await?;
        for spec in specs {
            tracker.watch(spec).await;
        }

        // Metrics API server
        tokio::spawn(async move {
            let app = Router::new()
                .route(
                    "/metrics",
                    get(|| async { colony_core::metrics::gather_system_metrics() }),
                )
                .layer(CorsLayer::permissive());

            info!("Metrics API listening on {}", metrics_addr);
            match tokio::net::TcpListener::bind(metrics_addr).await {
                Ok(listener) => {
                    if let Err(e) = axum::serve(listener, app).await {
                        warn!("Metrics server error: {}", e);
                    }
                }
                Err(e) => warn!("Failed to bind metrics address: {}", e),
            }
        });

        let tracker_task = {
            let tracker = tracker.clone();
            let listener = shutdown.listener();
            tokio::spawn(async move {
                tracker.run(listener).await;
            })
        };

        info!(owner_id = %owner_id, "worker running; ctrl-c to stop");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutting down");
        shutdown.trigger();

        if let Err(e) = tracker_task.await {
            warn!("Tracker task failed to join: {}", e);
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    runtime.shutdown();
    Ok(())
}
