use crate::error::{Result, SagaError};
use serde::{Deserialize, Serialize};

/// An action the player declares for one agent, replacing that agent's
/// free decision for the turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlayerAction {
    pub agent_id: String,
    pub action_text: String,
}

impl PlayerAction {
    pub fn new(agent_id: impl Into<String>, action_text: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            action_text: action_text.into(),
        }
    }

    /// Rejects blank ids or action text.
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(SagaError::validation("player action is missing an agent id"));
        }
        if self.action_text.trim().is_empty() {
            return Err(SagaError::validation("player action text is empty"));
        }
        Ok(())
    }
}

/// The outcome of one agent's decision request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentDecision {
    pub agent_id: String,
    pub action: String,
    /// Model-provided reasoning; empty when the action was supplied by a caller
    #[serde(default)]
    pub rationale: String,
}

impl AgentDecision {
    pub fn new(agent_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            action: action.into(),
            rationale: String::new(),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}
