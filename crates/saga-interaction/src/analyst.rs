//! Post-game analysis of a finished (or paused) game.

use crate::prompts::{ANALYSIS_TOOL, AnalysisPrompt, PromptTemplate, SIMULATOR_SYSTEM, analysis_schema};
use saga_core::config::GenerationConfig;
use saga_core::generation::{GenerationProvider, StructuredRequest};
use saga_core::session::PlayerProfile;
use saga_core::world::{Agent, WorldState};
use saga_core::{Result, SagaError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPerformance {
    pub grade: Grade,
    pub verdict: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurningPoint {
    pub turn: u32,
    pub event: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalStanding {
    pub name: String,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAnalysis {
    pub headline: String,
    pub summary: String,
    pub player_performance: PlayerPerformance,
    pub turning_points: Vec<TurningPoint>,
    pub what_went_right: Vec<String>,
    pub what_went_wrong: Vec<String>,
    pub alternative_path: String,
    pub final_standings: Vec<FinalStanding>,
}

// Turn numbers arrive as JSON numbers, sometimes with a fraction.
#[derive(Deserialize)]
struct TurningPointPayload {
    turn: f64,
    event: String,
    impact: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisPayload {
    headline: String,
    summary: String,
    player_performance: PlayerPerformance,
    #[serde(default)]
    turning_points: Vec<TurningPointPayload>,
    #[serde(default)]
    what_went_right: Vec<String>,
    #[serde(default)]
    what_went_wrong: Vec<String>,
    #[serde(default)]
    alternative_path: String,
    #[serde(default)]
    final_standings: Vec<FinalStanding>,
}

/// Reviews the whole game from the player's point of view.
pub struct GameAnalyst {
    provider: Arc<dyn GenerationProvider>,
    max_tokens: u32,
}

impl GameAnalyst {
    pub fn new(provider: Arc<dyn GenerationProvider>, generation: &GenerationConfig) -> Self {
        Self {
            provider,
            max_tokens: generation.analysis_max_tokens,
        }
    }

    /// Analyzes `world` for `player`.
    ///
    /// # Errors
    ///
    /// `Validation` before the first turn completes, `UpstreamGeneration`
    /// when the provider fails or the payload does not fit [`GameAnalysis`].
    pub async fn analyze(&self, world: &WorldState, player: &PlayerProfile) -> Result<GameAnalysis> {
        if world.history.is_empty() {
            return Err(SagaError::validation("nothing to analyze before the first turn"));
        }

        let agent = world.agent(&player.agent_id);
        let player_name = player
            .name
            .as_deref()
            .or(agent.map(|agent| agent.name.as_str()))
            .unwrap_or(player.agent_id.as_str());
        let prompt = AnalysisPrompt {
            player_name,
            goal: player.goal_or_default(),
            player_actions: agent.map(|agent| agent.action_history.as_slice()).unwrap_or_default(),
            history: &world.history,
            final_context: &world.context,
            agents: world.agents.iter().map(Agent::public_view).collect(),
        }
        .render()?;

        tracing::info!(
            "[GameAnalyst] Analyzing {} turns for {}",
            world.history.len(),
            player_name
        );
        let value = self
            .provider
            .generate_structured(StructuredRequest {
                system: SIMULATOR_SYSTEM.to_string(),
                prompt,
                tool_name: ANALYSIS_TOOL.to_string(),
                tool_description: "Provide post-game analysis".to_string(),
                schema: analysis_schema(),
                max_tokens: self.max_tokens,
            })
            .await?;

        let payload: AnalysisPayload = serde_json::from_value(value)
            .map_err(|err| SagaError::upstream(format!("analysis payload is unusable: {err}")))?;

        Ok(GameAnalysis {
            headline: payload.headline,
            summary: payload.summary,
            player_performance: payload.player_performance,
            turning_points: payload
                .turning_points
                .into_iter()
                .map(|point| TurningPoint {
                    turn: point.turn.round().clamp(0.0, f64::from(world.turn)) as u32,
                    event: point.event,
                    impact: point.impact,
                })
                .collect(),
            what_went_right: payload.what_went_right,
            what_went_wrong: payload.what_went_wrong,
            alternative_path: payload.alternative_path,
            final_standings: payload.final_standings,
        })
    }
}
