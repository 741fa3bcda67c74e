//! Worker and shard configuration
//!
//! Worker timing parameters plus the on-disk shard discovery convention:
//! one `script.json` per agent version, one JSON file per shard under
//! `shards/`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ColonyError, Result};
use crate::shard::{ShardIdentity, ShardSpec};
use crate::{
    DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_LEASE_TTL_SECS, DEFAULT_RETRY_JITTER_MS,
    DEFAULT_STORE_TIMEOUT_MS,
};

/// Version-wide configuration owned by the agent script.
///
/// Opaque to the coordination core; passed through to `Agent::init`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Free-form parameters defined by the agent author
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Per-shard parameters consumed by the execution driver and the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Shard index within the version
    pub id: u32,
    /// Total shard count for the version
    #[serde(default = "default_shard_count")]
    pub count: u32,
    /// Maximum sleep between work invocations, in milliseconds.
    /// An upper bound only; there is no minimum cadence.
    #[serde(default = "default_max_sleep_ms")]
    pub max_sleep_ms: u64,
    /// Free-form parameters defined by the agent author
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn default_shard_count() -> u32 {
    1
}

fn default_max_sleep_ms() -> u64 {
    1_000
}

impl ShardConfig {
    /// Create a minimal shard config
    pub fn new(id: u32, count: u32) -> Self {
        Self {
            id,
            count,
            max_sleep_ms: default_max_sleep_ms(),
            params: Map::new(),
        }
    }

    /// Set the sleep budget
    pub fn with_max_sleep_ms(mut self, max_sleep_ms: u64) -> Self {
        self.max_sleep_ms = max_sleep_ms;
        self
    }

    /// Set a free-form parameter
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Timing configuration for a worker process
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Lease time-to-live
    pub lease_ttl: Duration,
    /// Renewal and maintenance cycle interval
    pub heartbeat_interval: Duration,
    /// Deadline for any single lease store call
    pub store_timeout: Duration,
    /// Maximum jitter added to acquire retries
    pub retry_jitter: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            lease_ttl: Duration::from_secs(DEFAULT_LEASE_TTL_SECS),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            retry_jitter: Duration::from_millis(DEFAULT_RETRY_JITTER_MS),
        }
    }
}

impl WorkerConfig {
    /// Load timing overrides from the environment.
    ///
    /// Recognized variables: `COLONY_LEASE_TTL_SECS`,
    /// `COLONY_HEARTBEAT_SECS`, `COLONY_STORE_TIMEOUT_MS`,
    /// `COLONY_RETRY_JITTER_MS`.
    pub fn from_env() -> Self {
        fn env_u64(key: &str, default: u64) -> u64 {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            lease_ttl: Duration::from_secs(env_u64(
                "COLONY_LEASE_TTL_SECS",
                DEFAULT_LEASE_TTL_SECS,
            )),
            heartbeat_interval: Duration::from_secs(env_u64(
                "COLONY_HEARTBEAT_SECS",
                DEFAULT_HEARTBEAT_INTERVAL_SECS,
            )),
            store_timeout: Duration::from_millis(env_u64(
                "COLONY_STORE_TIMEOUT_MS",
                DEFAULT_STORE_TIMEOUT_MS,
            )),
            retry_jitter: Duration::from_millis(env_u64(
                "COLONY_RETRY_JITTER_MS",
                DEFAULT_RETRY_JITTER_MS,
            )),
        }
    }

    /// Validate the timing relations.
    ///
    /// At least two renewal attempts must fit into a TTL
    /// (`heartbeat <= ttl / 3`), and a store call must resolve within a
    /// heartbeat so a slow store degrades to a denial, never a stall.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval > self.lease_ttl / 3 {
            return Err(ColonyError::InvalidTiming {
                heartbeat_ms: self.heartbeat_interval.as_millis() as u64,
                ttl_ms: self.lease_ttl.as_millis() as u64,
            });
        }
        if self.store_timeout >= self.heartbeat_interval {
            return Err(ColonyError::StoreTimeoutTooLarge {
                timeout_ms: self.store_timeout.as_millis() as u64,
                heartbeat_ms: self.heartbeat_interval.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Discover the shards of one agent version from its config directory.
///
/// Layout: `<dir>/script.json` holds the [`ScriptConfig`];
/// `<dir>/shards/<n>.json` holds one [`ShardConfig`] each. Shard ids come
/// from the file contents, not the file names.
pub fn discover_shards(agent_id: &str, agent_version: u32, dir: &Path) -> Result<Vec<ShardSpec>> {
    let script_path = dir.join("script.json");
    let script: ScriptConfig = read_json(&script_path)?;

    let shards_dir = dir.join("shards");
    let entries = std::fs::read_dir(&shards_dir).map_err(|e| ColonyError::ConfigIo {
        path: shards_dir.display().to_string(),
        message: e.to_string(),
    })?;

    let mut specs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ColonyError::ConfigIo {
            path: shards_dir.display().to_string(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let shard: ShardConfig = read_json(&path)?;
        if shard.id >= shard.count {
            return Err(ColonyError::InvalidShardSpec {
                reason: format!(
                    "shard id {} out of range for count {} in {}",
                    shard.id,
                    shard.count,
                    path.display()
                ),
            });
        }
        let identity = ShardIdentity::new(agent_id, agent_version, shard.id);
        specs.push(ShardSpec::new(identity, script.clone(), shard));
    }

    if specs.is_empty() {
        return Err(ColonyError::InvalidShardSpec {
            reason: format!("no shard files found under {}", shards_dir.display()),
        });
    }

    specs.sort_by_key(|s| s.identity.shard_id);
    Ok(specs)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| ColonyError::ConfigIo {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ColonyError::ConfigIo {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
