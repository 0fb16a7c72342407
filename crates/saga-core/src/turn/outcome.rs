//! Structured result of narrative synthesis.

use serde::{Deserialize, Serialize};

/// Replacement state text for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStateUpdate {
    pub agent_id: String,
    pub new_state: String,
}

/// An agent introduced by the narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: String,
}

/// The authoritative result of one synthesis request.
///
/// `headline` and `narration` are mandatory. Everything else defaults to
/// "no change", so a minimal `{headline, narration}` payload is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeResult {
    pub headline: String,
    pub narration: String,
    #[serde(default, alias = "context", skip_serializing_if = "Option::is_none")]
    pub updated_context: Option<String>,
    #[serde(default)]
    pub agent_state_updates: Vec<AgentStateUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_agents: Vec<NewAgent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_agent_ids: Vec<String>,
}

impl NarrativeResult {
    /// Field names the incremental decoder tracks as plain strings.
    pub const STREAMED_TEXT_FIELDS: [&'static str; 3] = ["headline", "narration", "updatedContext"];
    /// Field names the incremental decoder tracks as arrays of objects.
    pub const STREAMED_ARRAY_FIELDS: [&'static str; 1] = ["agentStateUpdates"];

    pub fn new(headline: impl Into<String>, narration: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            narration: narration.into(),
            updated_context: None,
            agent_state_updates: Vec::new(),
            new_agents: Vec::new(),
            removed_agent_ids: Vec::new(),
        }
    }

    pub fn with_update(mut self, agent_id: impl Into<String>, new_state: impl Into<String>) -> Self {
        self.agent_state_updates.push(AgentStateUpdate {
            agent_id: agent_id.into(),
            new_state: new_state.into(),
        });
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.updated_context = Some(context.into());
        self
    }

    /// Looks up the state update addressed to `agent_id`. The last entry wins
    /// when the model repeats an id.
    pub fn update_for(&self, agent_id: &str) -> Option<&AgentStateUpdate> {
        self.agent_state_updates
            .iter()
            .rev()
            .find(|update| update.agent_id == agent_id)
    }
}
