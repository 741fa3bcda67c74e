//! Built-in starter agents
//!
//! Small example agents used by the worker binary and tests.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::agent::{Agent, AgentFactory};
use crate::config::{ScriptConfig, ShardConfig};
use crate::error::{ColonyError, Result};
use crate::shard::ShardIdentity;

/// Logs a line per work cycle
#[derive(Debug, Default)]
pub struct PrinterAgent {
    shard_id: u32,
}

#[async_trait]
impl Agent for PrinterAgent {
    async fn init(&mut self, _script: &ScriptConfig, shard: &ShardConfig) -> Result<()> {
        self.shard_id = shard.id;
        info!(shard_id = shard.id, "printer agent initialized");
        Ok(())
    }

    async fn work(&mut self) -> Result<()> {
        info!(shard_id = self.shard_id, "printer agent performing work");
        Ok(())
    }
}

/// Counts work cycles from a configurable starting point
#[derive(Debug, Default)]
pub struct CounterAgent {
    counter: u64,
}

#[async_trait]
impl Agent for CounterAgent {
    async fn init(&mut self, _script: &ScriptConfig, shard: &ShardConfig) -> Result<()> {
        self.counter = match shard.params.get("start") {
            None => 0,
            Some(Value::Number(n)) => n.as_u64().ok_or_else(|| ColonyError::AgentFailure {
                message: format!("'start' must be a non-negative integer, got {n}"),
            })?,
            Some(other) => {
                return Err(ColonyError::AgentFailure {
                    message: format!("'start' must be a number, got {other}"),
                })
            }
        };
        info!(shard_id = shard.id, start = self.counter, "counter agent initialized");
        Ok(())
    }

    async fn work(&mut self) -> Result<()> {
        info!(count = self.counter, "counter agent performing work");
        self.counter += 1;
        Ok(())
    }
}

/// Factory resolving the built-in agents by agent id
#[derive(Debug, Default)]
pub struct StarterAgents;

impl AgentFactory for StarterAgents {
    fn build(&self, identity: &ShardIdentity) -> Result<Box<dyn Agent>> {
        match identity.agent_id.as_str() {
            "printer" => Ok(Box::new(PrinterAgent::default())),
            "counter" => Ok(Box::new(CounterAgent::default())),
            other => Err(ColonyError::AgentFailure {
                message: format!("no starter agent named '{other}'"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_counter_starts_from_param() {
        let mut agent = CounterAgent::default();
        let shard = ShardConfig::new(0, 1).with_param("start", json!(41));

        agent.init(&ScriptConfig::default(), &shard).await.unwrap();
        agent.work().await.unwrap();

        assert_eq!(agent.counter, 42);
    }

    #[tokio::test]
    async fn test_counter_rejects_bad_start() {
        let mut agent = CounterAgent::default();
        let shard = ShardConfig::new(0, 1).with_param("start", json!("soon"));

        let err = agent
            .init(&ScriptConfig::default(), &shard)
            .await
            .unwrap_err();
        assert!(matches!(err, ColonyError::AgentFailure { .. }));
    }

    #[test]
    fn test_factory_rejects_unknown_agent() {
        let err = match StarterAgents.build(&ShardIdentity::new("mystery", 1, 0)) {
            Ok(_) => panic!("expected build to fail for unknown agent"),
            Err(e) => e,
        };
        assert!(matches!(err, ColonyError::AgentFailure { .. }));
    }
}
