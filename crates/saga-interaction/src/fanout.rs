//! Parallel per-agent decision requests.

use crate::prompts::{DECISION_TOOL, DecisionPrompt, PromptTemplate, decision_schema};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use saga_core::config::{GenerationConfig, SimulationConfig};
use saga_core::generation::{GenerationProvider, StructuredRequest};
use saga_core::turn::{AgentDecision, PlayerAction};
use saga_core::world::{Agent, WorldState};
use saga_core::{Result, SagaError};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
struct DecisionPayload {
    action: String,
    #[serde(default)]
    reasoning: String,
}

/// What the fanout collected once every request settled.
#[derive(Debug, Default)]
pub struct FanoutOutcome {
    /// Successful decisions in completion order
    pub decisions: Vec<AgentDecision>,
    /// One `PartialAgentFailure` per failed agent
    pub failures: Vec<SagaError>,
}

/// Issues one decision request per agent, concurrently.
///
/// Failures are isolated: a failing agent is logged and left out, the
/// others still complete. There is no retry here.
pub struct ActionFanout {
    provider: Arc<dyn GenerationProvider>,
    history_window: usize,
    max_tokens: u32,
}

impl ActionFanout {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        simulation: &SimulationConfig,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            provider,
            history_window: simulation.history_window,
            max_tokens: generation.decision_max_tokens,
        }
    }

    /// Requests a decision from every agent in `world` and waits for all of
    /// them to settle.
    ///
    /// # Arguments
    ///
    /// * `world` - World the agents decide in
    /// * `player_action` - Declared action replacing one agent's free choice
    /// * `on_decision` - Called for each success as it completes
    ///
    /// # Errors
    ///
    /// Only fails as a whole when a request cannot be built. Individual
    /// agent failures are reported in [`FanoutOutcome::failures`].
    pub async fn collect<F>(
        &self,
        world: &WorldState,
        player_action: Option<&PlayerAction>,
        mut on_decision: F,
    ) -> Result<FanoutOutcome>
    where
        F: FnMut(&AgentDecision),
    {
        let requests = world
            .agents
            .iter()
            .map(|agent| Ok((agent.id.clone(), self.build_request(world, agent, player_action)?)))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("[ActionFanout] dispatching {} decision requests", requests.len());

        let mut pending: FuturesUnordered<_> = requests
            .into_iter()
            .map(|(agent_id, request)| {
                let provider = Arc::clone(&self.provider);
                async move {
                    let result = provider
                        .generate_structured(request)
                        .await
                        .and_then(|value| parse_decision(&agent_id, value));
                    (agent_id, result)
                }
            })
            .collect();

        let mut outcome = FanoutOutcome::default();
        while let Some((agent_id, result)) = pending.next().await {
            match result {
                Ok(decision) => {
                    on_decision(&decision);
                    outcome.decisions.push(decision);
                }
                Err(err) => {
                    tracing::warn!("[ActionFanout] agent {} failed: {}", agent_id, err);
                    outcome
                        .failures
                        .push(SagaError::agent_failure(agent_id, err.to_string()));
                }
            }
        }

        tracing::debug!(
            "[ActionFanout] settled: {} decided, {} failed",
            outcome.decisions.len(),
            outcome.failures.len()
        );
        Ok(outcome)
    }

    fn build_request(
        &self,
        world: &WorldState,
        agent: &Agent,
        player_action: Option<&PlayerAction>,
    ) -> Result<StructuredRequest> {
        let declared_action = player_action
            .filter(|declared| declared.agent_id == agent.id)
            .map(|declared| declared.action_text.as_str());

        let prompt = DecisionPrompt {
            agent_name: &agent.name,
            agent_type: &agent.kind,
            agent_state: &agent.state,
            world_context: &world.context,
            others: world
                .agents
                .iter()
                .filter(|other| other.id != agent.id)
                .map(Agent::public_view)
                .collect(),
            recent_headlines: world.recent_headlines(self.history_window),
            declared_action,
        }
        .render()?;

        Ok(StructuredRequest {
            system: String::new(),
            prompt,
            tool_name: DECISION_TOOL.to_string(),
            tool_description: "Decide and describe your action this turn".to_string(),
            schema: decision_schema(),
            max_tokens: self.max_tokens,
        })
    }
}

fn parse_decision(agent_id: &str, value: serde_json::Value) -> Result<AgentDecision> {
    let payload: DecisionPayload = serde_json::from_value(value)
        .map_err(|err| SagaError::upstream(format!("decision payload is unusable: {err}")))?;
    if payload.action.trim().is_empty() {
        return Err(SagaError::upstream("decision payload has an empty action"));
    }
    Ok(AgentDecision::new(agent_id, payload.action.trim()).with_rationale(payload.reasoning))
}
