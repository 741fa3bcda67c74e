//! In-memory version catalog

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use super::version::{AgentVersion, VersionStatus};
use super::VersionCatalog;
use crate::error::{ColonyError, Result};
use crate::shard::ShardIdentity;

struct VersionEntry {
    version: AgentVersion,
    shard_ids: Vec<u32>,
}

/// In-memory version catalog.
///
/// Backs tests and single-process deployments of the worker binary.
#[derive(Default)]
pub struct InMemoryCatalog {
    versions: RwLock<HashMap<(String, u32), VersionEntry>>,
}

impl InMemoryCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active version with its shard ids
    pub async fn register_version(
        &self,
        agent_id: &str,
        version: u32,
        shard_ids: Vec<u32>,
    ) -> Result<()> {
        let mut versions = self.versions.write().await;
        let key = (agent_id.to_string(), version);
        if versions.contains_key(&key) {
            return Err(ColonyError::VersionExists {
                agent_id: agent_id.to_string(),
                version,
            });
        }
        versions.insert(
            key,
            VersionEntry {
                version: AgentVersion::new(agent_id, version),
                shard_ids,
            },
        );
        info!(agent_id, version, "agent version registered");
        Ok(())
    }

    /// Request deletion; the version stays schedulable for the grace window
    pub async fn request_deletion(&self, agent_id: &str, version: u32) -> Result<DateTime<Utc>> {
        let mut versions = self.versions.write().await;
        let entry = versions
            .get_mut(&(agent_id.to_string(), version))
            .ok_or_else(|| ColonyError::UnknownVersion {
                agent_id: agent_id.to_string(),
                version,
            })?;
        let eligible_at = entry.version.request_deletion(Utc::now());
        info!(agent_id, version, %eligible_at, "version deletion requested");
        Ok(eligible_at)
    }

    /// Transition versions past their grace window to `Deleted`.
    ///
    /// Returns the versions purged this sweep.
    pub async fn purge_eligible(&self) -> Vec<(String, u32)> {
        let now = Utc::now();
        let mut purged = Vec::new();
        let mut versions = self.versions.write().await;
        for (key, entry) in versions.iter_mut() {
            if entry.version.deletion_due(now) {
                entry.version.status = VersionStatus::Deleted;
                info!(agent_id = %key.0, version = key.1, "version purged");
                purged.push(key.clone());
            }
        }
        purged
    }

    /// Force a version straight to `Deleted`, skipping the grace window.
    /// Test hook for mid-episode revocation paths.
    pub async fn force_delete(&self, agent_id: &str, version: u32) -> Result<()> {
        let mut versions = self.versions.write().await;
        let entry = versions
            .get_mut(&(agent_id.to_string(), version))
            .ok_or_else(|| ColonyError::UnknownVersion {
                agent_id: agent_id.to_string(),
                version,
            })?;
        entry.version.status = VersionStatus::Deleted;
        Ok(())
    }
}

#[async_trait]
impl VersionCatalog for InMemoryCatalog {
    async fn list_schedulable_shards(&self, agent_id: &str) -> Vec<ShardIdentity> {
        let versions = self.versions.read().await;
        let mut shards = Vec::new();
        for ((id, version), entry) in versions.iter() {
            if id.as_str() != agent_id || !entry.version.is_schedulable() {
                continue;
            }
            for &shard_id in &entry.shard_ids {
                shards.push(ShardIdentity::new(id.clone(), *version, shard_id));
            }
        }
        shards.sort();
        shards
    }

    async fn is_schedulable(&self, identity: &ShardIdentity) -> bool {
        let versions = self.versions.read().await;
        versions
            .get(&(identity.agent_id.clone(), identity.agent_version))
            .map(|entry| {
                entry.version.is_schedulable() && entry.shard_ids.contains(&identity.shard_id)
            })
            .unwrap_or(false)
    }
}
