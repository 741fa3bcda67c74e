//! Agent version lifecycle
//!
//! Version catalog port and the Active / PendingDeletion / Deleted
//! lifecycle with its deletion grace window.

pub mod memory;
pub mod version;

use async_trait::async_trait;

pub use memory::InMemoryCatalog;
pub use version::{AgentVersion, VersionStatus};

use crate::shard::ShardIdentity;

/// Port to the version lifecycle collaborator.
///
/// The coordination core needs only a schedulability predicate: shards of
/// `Active` and `PendingDeletion` versions run, shards of `Deleted`
/// versions never do. A version turning `Deleted` mid-episode is treated
/// like lease expiry by the ownership tracker.
#[async_trait]
pub trait VersionCatalog: Send + Sync {
    /// Shards of all schedulable versions of one agent
    async fn list_schedulable_shards(&self, agent_id: &str) -> Vec<ShardIdentity>;

    /// Whether the identity's version may currently be scheduled
    async fn is_schedulable(&self, identity: &ShardIdentity) -> bool;
}
