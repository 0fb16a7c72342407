use super::{AgentDecision, PlayerAction};
use crate::error::{Result, SagaError};
use crate::world::WorldState;
use serde::{Deserialize, Serialize};

/// Caller request to run one turn.
///
/// `agent_actions` is only honoured by the non-streaming variant; when it is
/// present the decision fanout is skipped and these actions are narrated
/// as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TurnRequest {
    pub current_world_state: WorldState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_actions: Option<Vec<AgentDecision>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_action: Option<PlayerAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ref: Option<String>,
}

impl TurnRequest {
    pub fn new(world: WorldState) -> Self {
        Self {
            current_world_state: world,
            agent_actions: None,
            player_action: None,
            session_ref: None,
        }
    }

    pub fn with_player_action(mut self, action: PlayerAction) -> Self {
        self.player_action = Some(action);
        self
    }

    pub fn with_agent_actions(mut self, actions: Vec<AgentDecision>) -> Self {
        self.agent_actions = Some(actions);
        self
    }

    /// Checks the request before any provider call is made.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Validation` if the world is malformed or if an
    /// action refers to an agent that does not exist.
    pub fn validate(&self) -> Result<()> {
        let world = &self.current_world_state;
        world.validate()?;

        if let Some(player_action) = &self.player_action {
            player_action.validate()?;
            if !world.contains_agent(&player_action.agent_id) {
                return Err(SagaError::validation(format!(
                    "player action targets unknown agent '{}'",
                    player_action.agent_id
                )));
            }
        }

        for decision in self.agent_actions.iter().flatten() {
            if !world.contains_agent(&decision.agent_id) {
                return Err(SagaError::validation(format!(
                    "supplied action targets unknown agent '{}'",
                    decision.agent_id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Agent;

    fn world() -> WorldState {
        WorldState::new("ctx", vec![Agent::new("a", "Ada", "Guild", "rich")])
    }

    #[test]
    fn test_unknown_player_agent_is_rejected() {
        let request = TurnRequest::new(world()).with_player_action(PlayerAction::new("zz", "go"));
        assert!(request.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_unknown_supplied_agent_is_rejected() {
        let request =
            TurnRequest::new(world()).with_agent_actions(vec![AgentDecision::new("zz", "go")]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_request_rejects_unknown_fields() {
        let json = serde_json::json!({
            "currentWorldState": world(),
            "gameId": "g-1",
        });
        assert!(serde_json::from_value::<TurnRequest>(json).is_err());
    }

    #[test]
    fn test_valid_request() {
        let request = TurnRequest::new(world()).with_player_action(PlayerAction::new("a", "go"));
        assert!(request.validate().is_ok());
    }
}
