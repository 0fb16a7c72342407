//! World domain model.
//!
//! A `WorldState` is the complete, self-contained description of the
//! simulation at one turn. It is a plain value: turns never mutate a world
//! in place, they produce the next one (see [`super::apply_turn`]).

use crate::error::{Result, SagaError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Headline given to a freshly seeded world.
pub const OPENING_HEADLINE: &str = "Simulation begins...";

/// One entry of an agent's action history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
    /// Turn at which the action was applied (1-based)
    pub turn: u32,
    /// Free-text action description
    pub action: String,
}

/// Descriptor for an agent portrait. Rendering happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarDescriptor {
    /// Prompt an image backend would be given
    pub prompt: String,
    /// Location of a rendered image, once one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// An autonomous actor in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Stable identifier, unique within a `WorldState`
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-text category tag ("Merchant", "Nation", ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-text situation and capabilities, fed to the model as context
    pub state: String,
    /// Append-only, ordered by turn
    #[serde(default)]
    pub action_history: Vec<AgentAction>,
    /// Physical description used for portraits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AvatarDescriptor>,
}

impl Agent {
    /// Creates an agent with an empty action history.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            state: state.into(),
            action_history: Vec::new(),
            appearance: None,
            avatar: None,
        }
    }

    /// Generates an id of the form `agent-{index}-{8 hex}`.
    pub fn generate_id(index: usize) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("agent-{}-{}", index, &suffix[..8])
    }

    /// The most recent action, if any.
    pub fn last_action(&self) -> Option<&AgentAction> {
        self.action_history.last()
    }

    /// Name/type/state view handed to other agents' prompts.
    pub fn public_view(&self) -> AgentView<'_> {
        AgentView {
            id: &self.id,
            name: &self.name,
            kind: &self.kind,
            state: &self.state,
        }
    }
}

/// Redacted view of an agent: no action history, no portrait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentView<'a> {
    pub id: &'a str,
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub state: &'a str,
}

/// Headline and narration recorded for one completed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnEntry {
    pub turn: u32,
    pub headline: String,
    pub narration: String,
}

/// The world at one turn.
///
/// Invariant: `history.len() == turn`. A seeded world starts at turn 0 with
/// an empty history and each completed turn appends exactly one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    pub turn: u32,
    pub context: String,
    pub headline: String,
    /// Insertion order is creation order
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub history: Vec<TurnEntry>,
}

impl WorldState {
    /// Creates a turn-0 world.
    pub fn new(context: impl Into<String>, agents: Vec<Agent>) -> Self {
        Self {
            turn: 0,
            context: context.into(),
            headline: OPENING_HEADLINE.to_string(),
            agents,
            history: Vec::new(),
        }
    }

    /// Finds an agent by id.
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Returns true if an agent with this id exists.
    pub fn contains_agent(&self, id: &str) -> bool {
        self.agent(id).is_some()
    }

    /// Headlines of the last `window` completed turns, oldest first.
    pub fn recent_headlines(&self, window: usize) -> Vec<&str> {
        let start = self.history.len().saturating_sub(window);
        self.history[start..]
            .iter()
            .map(|entry| entry.headline.as_str())
            .collect()
    }

    /// Narration of the latest completed turn, empty at turn 0.
    pub fn latest_narration(&self) -> &str {
        self.history
            .last()
            .map(|entry| entry.narration.as_str())
            .unwrap_or_default()
    }

    /// Checks the structural invariants of a world received from outside.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Validation` if agent ids are empty or duplicated,
    /// or if the history length disagrees with the turn counter.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.agents.len());
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(SagaError::validation(format!(
                    "agent '{}' has an empty id",
                    agent.name
                )));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(SagaError::validation(format!(
                    "duplicate agent id '{}'",
                    agent.id
                )));
            }
        }

        if self.history.len() != self.turn as usize {
            return Err(SagaError::validation(format!(
                "history has {} entries but turn is {}",
                self.history.len(),
                self.turn
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_history(turns: u32) -> WorldState {
        let mut world = WorldState::new("A river city", vec![Agent::new("a", "Ada", "Guild", "rich")]);
        for turn in 1..=turns {
            world.history.push(TurnEntry {
                turn,
                headline: format!("H{turn}"),
                narration: format!("N{turn}"),
            });
        }
        world.turn = turns;
        world
    }

    #[test]
    fn test_new_world_starts_at_turn_zero() {
        let world = WorldState::new("ctx", Vec::new());
        assert_eq!(world.turn, 0);
        assert!(world.history.is_empty());
        assert_eq!(world.headline, OPENING_HEADLINE);
        assert!(world.validate().is_ok());
    }

    #[test]
    fn test_recent_headlines_window() {
        let world = world_with_history(5);
        assert_eq!(world.recent_headlines(3), vec!["H3", "H4", "H5"]);
        assert_eq!(world_with_history(2).recent_headlines(3), vec!["H1", "H2"]);
        assert!(world_with_history(0).recent_headlines(3).is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut world = world_with_history(0);
        world.agents.push(Agent::new("a", "Other", "Guild", "poor"));
        let err = world.validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_rejects_history_mismatch() {
        let mut world = world_with_history(2);
        world.turn = 3;
        assert!(world.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let first = Agent::generate_id(0);
        let second = Agent::generate_id(0);
        assert!(first.starts_with("agent-0-"));
        assert_eq!(first.len(), "agent-0-".len() + 8);
        assert_ne!(first, second);
    }

    #[test]
    fn test_agent_serializes_type_field() {
        let agent = Agent::new("a", "Ada", "Guild", "rich");
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["type"], "Guild");
        assert_eq!(json["actionHistory"], serde_json::json!([]));
        assert!(json.get("avatar").is_none());
    }
}
