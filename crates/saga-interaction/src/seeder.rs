//! Initial world generation from a scenario description.

use crate::prompts::{PromptTemplate, SEED_TOOL, SIMULATOR_SYSTEM, SeedPrompt, seed_schema};
use saga_core::config::{GenerationConfig, SimulationConfig};
use saga_core::generation::{GenerationProvider, StructuredRequest};
use saga_core::session::PlayerProfile;
use saga_core::world::{Agent, AvatarDescriptor, WorldState};
use saga_core::{Result, SagaError};
use serde::Deserialize;
use std::sync::Arc;

const BACKGROUNDS: [&str; 5] = ["periwinkle", "mist", "mint", "apricot", "lavender"];

/// The player's character as described before the world exists.
#[derive(Debug, Clone, Default)]
pub struct PlayerBrief {
    pub name: String,
    pub role: Option<String>,
    pub goal: String,
}

#[derive(Debug, Clone)]
pub struct SeedRequest {
    pub scenario: String,
    pub player: Option<PlayerBrief>,
}

impl SeedRequest {
    pub fn new(scenario: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            player: None,
        }
    }

    pub fn with_player(mut self, player: PlayerBrief) -> Self {
        self.player = Some(player);
        self
    }
}

/// A turn-0 world plus the agent the player controls, if any.
#[derive(Debug, Clone)]
pub struct SeededWorld {
    pub world: WorldState,
    pub player: Option<PlayerProfile>,
}

#[derive(Deserialize)]
struct SeedPayload {
    context: String,
    agents: Vec<SeedAgent>,
}

#[derive(Deserialize)]
struct SeedAgent {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    state: String,
    #[serde(default)]
    appearance: Option<String>,
}

pub struct WorldSeeder {
    provider: Arc<dyn GenerationProvider>,
    min_agents: usize,
    max_agents: usize,
    max_tokens: u32,
}

impl WorldSeeder {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        simulation: &SimulationConfig,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            provider,
            min_agents: simulation.min_seed_agents,
            max_agents: simulation.max_seed_agents,
            max_tokens: generation.seed_max_tokens,
        }
    }

    /// Generates the opening world for `request`.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank scenario, `UpstreamGeneration` when the
    /// provider fails or returns no context or no agents.
    pub async fn seed(&self, request: &SeedRequest) -> Result<SeededWorld> {
        if request.scenario.trim().is_empty() {
            return Err(SagaError::validation("scenario must not be empty"));
        }

        let player = request.player.as_ref();
        let prompt = SeedPrompt {
            scenario: request.scenario.trim(),
            player_name: player.map(|p| p.name.as_str()),
            player_role: player.and_then(|p| p.role.as_deref()),
            player_goal: player.map_or("", |p| p.goal.as_str()),
            min_agents: self.min_agents,
            max_agents: self.max_agents,
        }
        .render()?;

        tracing::info!("[WorldSeeder] seeding scenario: {}", request.scenario.trim());
        let value = self
            .provider
            .generate_structured(StructuredRequest {
                system: SIMULATOR_SYSTEM.to_string(),
                prompt,
                tool_name: SEED_TOOL.to_string(),
                tool_description: "Create the initial world and its agents".to_string(),
                schema: seed_schema(),
                max_tokens: self.max_tokens,
            })
            .await?;

        let payload: SeedPayload = serde_json::from_value(value)
            .map_err(|err| SagaError::upstream(format!("seed payload is unusable: {err}")))?;
        if payload.context.trim().is_empty() {
            return Err(SagaError::upstream("seed payload has no world context"));
        }
        if payload.agents.is_empty() {
            return Err(SagaError::upstream("seed payload has no agents"));
        }

        let agents: Vec<Agent> = payload
            .agents
            .into_iter()
            .enumerate()
            .map(|(index, seed)| {
                let mut agent = Agent::new(Agent::generate_id(index), seed.name, seed.kind, seed.state);
                agent.appearance = seed.appearance.filter(|a| !a.trim().is_empty());
                agent.avatar = Some(avatar_for(&agent));
                agent
            })
            .collect();

        let player = player.and_then(|brief| {
            let needle = brief.name.trim().to_lowercase();
            let agent = agents
                .iter()
                .find(|agent| !needle.is_empty() && agent.name.to_lowercase().contains(&needle))
                .or_else(|| agents.first())?;
            Some(PlayerProfile {
                agent_id: agent.id.clone(),
                name: Some(brief.name.clone()).filter(|name| !name.trim().is_empty()),
                goal: Some(brief.goal.clone()).filter(|goal| !goal.trim().is_empty()),
            })
        });

        tracing::info!("[WorldSeeder] seeded {} agents", agents.len());
        Ok(SeededWorld {
            world: WorldState::new(payload.context, agents),
            player,
        })
    }
}

/// Portrait prompt for an agent, derived from its explicit appearance.
pub fn avatar_for(agent: &Agent) -> AvatarDescriptor {
    let seed = format!("{}|{}|{}", agent.name, agent.kind, agent.id)
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    let background = BACKGROUNDS[seed % BACKGROUNDS.len()];

    let cues = match agent.appearance.as_deref() {
        Some(appearance) => format!("Appearance cues: {}.", appearance.trim()),
        None => "Appearance not provided: create a neutral, understated portrait without guessing \
                 specific ethnicity or age."
            .to_string(),
    };

    AvatarDescriptor {
        prompt: format!(
            "Polished cartoon avatar portrait of \"{}\" ({}). {} Head-and-shoulders only, centered, \
             clean linework, soft shading. Background: soft {} gradient. No text, no watermark.",
            agent.name, agent.kind, cues, background
        ),
        image_url: None,
    }
}
