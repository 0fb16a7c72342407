//! The `Applying` step of a turn.

use super::model::{Agent, AgentAction, TurnEntry, WorldState};
use crate::turn::{AgentDecision, NarrativeResult};

/// Result of applying a narrative to a world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnApplication {
    /// The next world; the input world is untouched.
    pub world: WorldState,
    /// Actions that were written into agent histories, in agent order.
    pub applied_actions: Vec<AgentDecision>,
    /// Ids from `agentStateUpdates` that matched no agent.
    pub ignored_update_ids: Vec<String>,
}

/// Produces the next world from `world`, the turn's decisions and the
/// synthesized narrative.
///
/// Rules:
/// - `turn` increases by exactly one and one history entry is appended.
/// - An agent named in `agentStateUpdates` gets its state replaced. If it
///   also has a decision this turn, that action is appended to its history
///   under the new turn number.
/// - Agents not named are left unchanged, history included.
/// - Headline and context are replaced only when the narrative provides
///   non-blank values.
/// - Removed agents are dropped and new agents appended with fresh ids.
pub fn apply_turn(
    world: &WorldState,
    decisions: &[AgentDecision],
    narrative: &NarrativeResult,
) -> TurnApplication {
    let mut next = world.clone();
    next.turn = world.turn + 1;
    next.history.push(TurnEntry {
        turn: next.turn,
        headline: narrative.headline.clone(),
        narration: narrative.narration.clone(),
    });

    if !narrative.headline.trim().is_empty() {
        next.headline = narrative.headline.clone();
    }
    if let Some(context) = narrative
        .updated_context
        .as_ref()
        .filter(|context| !context.trim().is_empty())
    {
        next.context = context.clone();
    }

    let mut applied_actions = Vec::new();
    for agent in next.agents.iter_mut() {
        let Some(update) = narrative.update_for(&agent.id) else {
            continue;
        };
        agent.state = update.new_state.clone();

        if let Some(decision) = decisions.iter().rev().find(|d| d.agent_id == agent.id) {
            agent.action_history.push(AgentAction {
                turn: next.turn,
                action: decision.action.clone(),
            });
            applied_actions.push(decision.clone());
        }
    }

    let ignored_update_ids = narrative
        .agent_state_updates
        .iter()
        .filter(|update| !world.contains_agent(&update.agent_id))
        .map(|update| update.agent_id.clone())
        .collect();

    if !narrative.removed_agent_ids.is_empty() {
        next.agents
            .retain(|agent| !narrative.removed_agent_ids.contains(&agent.id));
    }

    for newcomer in &narrative.new_agents {
        let mut index = next.agents.len();
        let mut id = Agent::generate_id(index);
        while next.contains_agent(&id) {
            index += 1;
            id = Agent::generate_id(index);
        }
        next.agents.push(Agent::new(
            id,
            newcomer.name.clone(),
            newcomer.kind.clone(),
            newcomer.state.clone(),
        ));
    }

    TurnApplication {
        world: next,
        applied_actions,
        ignored_update_ids,
    }
}
