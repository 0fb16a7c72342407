use crate::error::Result;
use crate::world::WorldState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rates each agent's standing in a world on a 0-100 scale.
#[async_trait]
pub trait AgentScorer: Send + Sync {
    /// Returns agent id to score. Agents the scorer could not rate are absent.
    async fn score_agents(&self, world: &WorldState) -> Result<HashMap<String, u8>>;
}

/// Progress of one agent toward a stated goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalScore {
    /// 0 is a setback, 50 neutral, 100 the goal achieved
    pub score: u8,
    pub reasoning: String,
    #[serde(default)]
    pub key_factors: Vec<String>,
}
