//! Agent standing scores from the generation provider.

use crate::prompts::{PromptTemplate, SCORING_TOOL, SIMULATOR_SYSTEM, ScoringPrompt, scores_schema};
use async_trait::async_trait;
use saga_core::config::GenerationConfig;
use saga_core::generation::{GenerationProvider, StructuredRequest};
use saga_core::scoring::AgentScorer;
use saga_core::world::{Agent, WorldState};
use saga_core::{Result, SagaError};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Deserialize)]
struct ScoresPayload {
    scores: Vec<ScoreEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreEntry {
    agent_id: String,
    score: f64,
}

/// [`AgentScorer`] backed by one structured request per call.
pub struct ProviderAgentScorer {
    provider: Arc<dyn GenerationProvider>,
    max_tokens: u32,
}

impl ProviderAgentScorer {
    pub fn new(provider: Arc<dyn GenerationProvider>, generation: &GenerationConfig) -> Self {
        Self {
            provider,
            max_tokens: generation.scoring_max_tokens,
        }
    }
}

#[async_trait]
impl AgentScorer for ProviderAgentScorer {
    async fn score_agents(&self, world: &WorldState) -> Result<HashMap<String, u8>> {
        if world.agents.is_empty() {
            return Ok(HashMap::new());
        }

        let prompt = ScoringPrompt {
            world_context: &world.context,
            agents: world.agents.iter().map(Agent::public_view).collect(),
        }
        .render()?;

        let value = self
            .provider
            .generate_structured(StructuredRequest {
                system: SIMULATOR_SYSTEM.to_string(),
                prompt,
                tool_name: SCORING_TOOL.to_string(),
                tool_description: "Score each agent's current standing".to_string(),
                schema: scores_schema(),
                max_tokens: self.max_tokens,
            })
            .await?;

        let payload: ScoresPayload = serde_json::from_value(value)
            .map_err(|err| SagaError::upstream(format!("scores payload is unusable: {err}")))?;

        let mut scores = HashMap::new();
        for entry in payload.scores {
            if !world.contains_agent(&entry.agent_id) {
                tracing::warn!("[AgentScorer] dropping score for unknown agent {}", entry.agent_id);
                continue;
            }
            scores.insert(entry.agent_id, entry.score.round().clamp(0.0, 100.0) as u8);
        }
        Ok(scores)
    }
}
