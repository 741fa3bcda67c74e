//! Shard identity and specification
//!
//! A shard is an independently owned, independently scheduled unit of an
//! agent's state and execution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{ScriptConfig, ShardConfig};

/// Globally unique identity of one shard of one agent version.
///
/// Never reused: a deleted version's shards do not come back under the
/// same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardIdentity {
    /// Agent identifier
    pub agent_id: String,
    /// Immutable version number
    pub agent_version: u32,
    /// Shard index within the version
    pub shard_id: u32,
}

impl ShardIdentity {
    /// Create a new shard identity
    pub fn new(agent_id: impl Into<String>, agent_version: u32, shard_id: u32) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_version,
            shard_id,
        }
    }
}

impl fmt::Display for ShardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/v{}/s{}",
            self.agent_id, self.agent_version, self.shard_id
        )
    }
}

/// A schedulable unit as handed to the ownership tracker: the identity
/// plus the resolved configuration the execution driver consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardSpec {
    /// Identity of the shard
    pub identity: ShardIdentity,
    /// Version-wide script configuration
    pub script: ScriptConfig,
    /// Per-shard parameters, including the sleep budget
    pub shard: ShardConfig,
}

impl ShardSpec {
    /// Create a spec from identity and configs
    pub fn new(identity: ShardIdentity, script: ScriptConfig, shard: ShardConfig) -> Self {
        Self {
            identity,
            script,
            shard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let id = ShardIdentity::new("pinger", 3, 7);
        assert_eq!(id.to_string(), "pinger/v3/s7");
    }

    #[test]
    fn test_identity_ordering() {
        let a = ShardIdentity::new("a", 1, 0);
        let b = ShardIdentity::new("a", 1, 1);
        let c = ShardIdentity::new("a", 2, 0);

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_identity_hash_equality() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(ShardIdentity::new("x", 1, 2), "v");

        assert_eq!(map.get(&ShardIdentity::new("x", 1, 2)), Some(&"v"));
        assert_eq!(map.get(&ShardIdentity::new("x", 1, 3)), None);
    }
}
