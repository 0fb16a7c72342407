//! Goal-driven help for the player's agent: progress scoring, autopilot and
//! suggested actions.
//!
//! Each service issues one structured request against the current world and
//! the player's profile. None of them touches the world itself.

use crate::prompts::{
    AUTOPILOT_SYSTEM, AUTOPILOT_TOOL, AutopilotPrompt, GOAL_SYSTEM, GOAL_TOOL, GoalScoringPrompt,
    PromptTemplate, SUGGESTION_TOOL, SIMULATOR_SYSTEM, SuggestionPrompt, autopilot_schema,
    goal_score_schema, suggestions_schema,
};
use saga_core::config::GenerationConfig;
use saga_core::generation::{GenerationProvider, StructuredRequest};
use saga_core::scoring::GoalScore;
use saga_core::session::PlayerProfile;
use saga_core::turn::PlayerAction;
use saga_core::world::{Agent, AgentView, WorldState};
use saga_core::{Result, SagaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Narrations shown to goal scoring and autopilot.
const RECENT_EVENTS: usize = 5;
/// Headlines shown to the suggestion advisor.
const RECENT_HEADLINES: usize = 3;

fn player_agent<'w>(world: &'w WorldState, player: &PlayerProfile) -> Result<&'w Agent> {
    world
        .agent(&player.agent_id)
        .ok_or_else(|| SagaError::not_found("agent", player.agent_id.as_str()))
}

fn recent_narrations(world: &WorldState) -> Vec<&str> {
    let skip = world.history.len().saturating_sub(RECENT_EVENTS);
    world
        .history
        .iter()
        .skip(skip)
        .map(|entry| entry.narration.as_str())
        .collect()
}

fn others<'w>(world: &'w WorldState, player: &PlayerProfile) -> Vec<AgentView<'w>> {
    world
        .agents
        .iter()
        .filter(|agent| agent.id != player.agent_id)
        .map(Agent::public_view)
        .collect()
}

// ============================================================================
// Goal progress
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalPayload {
    score: f64,
    reasoning: String,
    #[serde(default)]
    key_factors: Vec<String>,
}

/// Rates the player's progress toward their goal.
pub struct GoalScorer {
    provider: Arc<dyn GenerationProvider>,
    max_tokens: u32,
}

impl GoalScorer {
    pub fn new(provider: Arc<dyn GenerationProvider>, generation: &GenerationConfig) -> Self {
        Self {
            provider,
            max_tokens: generation.advisor_max_tokens,
        }
    }

    /// Scores `player`'s goal in `world`. The score is clamped to 0..=100.
    ///
    /// # Errors
    ///
    /// `NotFound` if the player's agent is not in the world,
    /// `UpstreamGeneration` if the provider fails or returns an unusable payload.
    pub async fn score_goal(&self, world: &WorldState, player: &PlayerProfile) -> Result<GoalScore> {
        let agent = player_agent(world, player)?;
        let prompt = GoalScoringPrompt {
            goal: player.goal_or_default(),
            agent_name: &agent.name,
            agent_state: &agent.state,
            world_context: &world.context,
            recent_events: recent_narrations(world),
        }
        .render()?;

        let value = self
            .provider
            .generate_structured(StructuredRequest {
                system: GOAL_SYSTEM.to_string(),
                prompt,
                tool_name: GOAL_TOOL.to_string(),
                tool_description: "Score goal progress".to_string(),
                schema: goal_score_schema(),
                max_tokens: self.max_tokens,
            })
            .await?;

        let payload: GoalPayload = serde_json::from_value(value)
            .map_err(|err| SagaError::upstream(format!("goal score payload is unusable: {err}")))?;

        Ok(GoalScore {
            score: payload.score.round().clamp(0.0, 100.0) as u8,
            reasoning: payload.reasoning,
            key_factors: payload.key_factors,
        })
    }
}

// ============================================================================
// Autopilot
// ============================================================================

#[derive(Deserialize)]
struct AutopilotPayload {
    action: String,
    #[serde(default)]
    reasoning: String,
}

/// An action chosen on the player's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutopilotChoice {
    pub action: PlayerAction,
    pub reasoning: String,
}

/// Picks the player's next action from their goal.
pub struct AutopilotAdvisor {
    provider: Arc<dyn GenerationProvider>,
    max_tokens: u32,
}

impl AutopilotAdvisor {
    pub fn new(provider: Arc<dyn GenerationProvider>, generation: &GenerationConfig) -> Self {
        Self {
            provider,
            max_tokens: generation.advisor_max_tokens,
        }
    }

    /// Chooses an action for the player's agent, ready to be declared.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing player agent, `UpstreamGeneration` when the
    /// provider fails or proposes an empty action.
    pub async fn choose_action(
        &self,
        world: &WorldState,
        player: &PlayerProfile,
    ) -> Result<AutopilotChoice> {
        let agent = player_agent(world, player)?;
        let prompt = AutopilotPrompt {
            goal: player.goal_or_default(),
            agent_name: &agent.name,
            agent_state: &agent.state,
            world_context: &world.context,
            others: others(world, player),
            recent_events: recent_narrations(world),
        }
        .render()?;

        let value = self
            .provider
            .generate_structured(StructuredRequest {
                system: AUTOPILOT_SYSTEM.to_string(),
                prompt,
                tool_name: AUTOPILOT_TOOL.to_string(),
                tool_description: "Choose strategic action".to_string(),
                schema: autopilot_schema(),
                max_tokens: self.max_tokens,
            })
            .await?;

        let payload: AutopilotPayload = serde_json::from_value(value)
            .map_err(|err| SagaError::upstream(format!("autopilot payload is unusable: {err}")))?;
        let action = payload.action.trim();
        if action.is_empty() {
            return Err(SagaError::upstream("autopilot proposed an empty action"));
        }

        tracing::debug!("[AutopilotAdvisor] {} will: {}", agent.name, action);
        Ok(AutopilotChoice {
            action: PlayerAction::new(agent.id.clone(), action),
            reasoning: payload.reasoning,
        })
    }
}

// ============================================================================
// Suggested actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Aggressive,
    Defensive,
    Diplomatic,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Aggressive => "aggressive",
            Self::Defensive => "defensive",
            Self::Diplomatic => "diplomatic",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedAction {
    pub title: String,
    pub description: String,
    pub strategy: Strategy,
}

#[derive(Deserialize)]
struct SuggestionsPayload {
    actions: Vec<SuggestedAction>,
}

/// Offers the player three contrasting moves.
pub struct ActionSuggester {
    provider: Arc<dyn GenerationProvider>,
    max_tokens: u32,
}

impl ActionSuggester {
    pub fn new(provider: Arc<dyn GenerationProvider>, generation: &GenerationConfig) -> Self {
        Self {
            provider,
            max_tokens: generation.advisor_max_tokens,
        }
    }

    /// # Errors
    ///
    /// `NotFound` for a missing player agent, `UpstreamGeneration` when the
    /// provider fails or suggests nothing.
    pub async fn suggest(
        &self,
        world: &WorldState,
        player: &PlayerProfile,
    ) -> Result<Vec<SuggestedAction>> {
        let agent = player_agent(world, player)?;
        let prompt = SuggestionPrompt {
            player_name: player.name.as_deref().unwrap_or(agent.name.as_str()),
            player_state: &agent.state,
            goal: player.goal_or_default(),
            world_context: &world.context,
            others: others(world, player),
            recent_headlines: world.recent_headlines(RECENT_HEADLINES),
        }
        .render()?;

        let value = self
            .provider
            .generate_structured(StructuredRequest {
                system: SIMULATOR_SYSTEM.to_string(),
                prompt,
                tool_name: SUGGESTION_TOOL.to_string(),
                tool_description: "Suggest 3 strategic actions for the player".to_string(),
                schema: suggestions_schema(),
                max_tokens: self.max_tokens,
            })
            .await?;

        let payload: SuggestionsPayload = serde_json::from_value(value)
            .map_err(|err| SagaError::upstream(format!("suggestions payload is unusable: {err}")))?;
        let actions: Vec<SuggestedAction> = payload
            .actions
            .into_iter()
            .filter(|suggestion| !suggestion.title.trim().is_empty())
            .collect();
        if actions.is_empty() {
            return Err(SagaError::upstream("no actions were suggested"));
        }
        Ok(actions)
    }
}
