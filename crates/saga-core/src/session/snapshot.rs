//! Persisted form of a session.
//!
//! A `GameRecord` stores the single linear path that was actually played as
//! a chain of `TurnSnapshot`s. Forks that were abandoned are not persisted.
//! Agent action histories are not stored per snapshot; replay rebuilds them
//! from each snapshot's `agent_actions`.

use super::tree::{NodeId, SessionNode, SessionTree};
use crate::error::{Result, SagaError};
use crate::turn::AgentDecision;
use crate::world::{Agent, AgentAction, TurnEntry, WorldState};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Agent as stored in a snapshot: no history, no portrait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotAgent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: String,
}

/// (agent id, action) pair applied at a snapshot's turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAction {
    pub agent_id: String,
    pub action: String,
}

/// One played turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnSnapshot {
    pub turn: u32,
    pub headline: String,
    pub narration: String,
    pub context: String,
    pub agents: Vec<SnapshotAgent>,
    #[serde(default)]
    pub agent_actions: Vec<SnapshotAction>,
}

impl TurnSnapshot {
    /// Captures a world together with the actions applied to reach it.
    pub fn capture(world: &WorldState, applied: &[AgentDecision]) -> Self {
        Self {
            turn: world.turn,
            headline: world.headline.clone(),
            narration: world.latest_narration().to_string(),
            context: world.context.clone(),
            agents: world
                .agents
                .iter()
                .map(|agent| SnapshotAgent {
                    id: agent.id.clone(),
                    name: agent.name.clone(),
                    kind: agent.kind.clone(),
                    state: agent.state.clone(),
                })
                .collect(),
            agent_actions: applied
                .iter()
                .map(|decision| SnapshotAction {
                    agent_id: decision.agent_id.clone(),
                    action: decision.action.clone(),
                })
                .collect(),
        }
    }

    pub fn from_node(node: &SessionNode) -> Self {
        Self::capture(&node.world, &node.applied_actions)
    }
}

/// The player's seat in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

impl PlayerProfile {
    /// Goal used when the player never stated one.
    pub const DEFAULT_GOAL: &'static str = "Maximize influence and achieve their objectives";

    pub fn goal_or_default(&self) -> &str {
        self.goal
            .as_deref()
            .map(str::trim)
            .filter(|goal| !goal.is_empty())
            .unwrap_or(Self::DEFAULT_GOAL)
    }
}

/// Listing entry for a stored session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub scenario_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub turn: u32,
}

/// Root of a persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: String,
    /// Latest world on the saved path
    pub state: WorldState,
    #[serde(default)]
    pub turns: Vec<TurnSnapshot>,
    pub scenario_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerProfile>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameRecord {
    /// Creates a record whose chain holds only the opening world.
    pub fn new(id: impl Into<String>, scenario_name: impl Into<String>, state: WorldState) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: vec![TurnSnapshot::capture(&state, &[])],
            state,
            scenario_name: scenario_name.into(),
            name: None,
            player: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the chain with the given root-to-leaf path.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Validation` for an empty path.
    pub fn set_path(&mut self, path: &[&SessionNode]) -> Result<()> {
        let last = path
            .last()
            .ok_or_else(|| SagaError::validation("cannot persist an empty path"))?;
        self.state = last.world.clone();
        self.turns = path.iter().map(|node| TurnSnapshot::from_node(node)).collect();
        Ok(())
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            scenario_name: self.scenario_name.clone(),
            name: self.name.clone(),
            turn: self.state.turn,
        }
    }

    pub fn expires_at(&self, retention: Duration) -> DateTime<Utc> {
        self.updated_at + retention
    }

    pub fn is_expired(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at(retention) <= now
    }

    /// Builds a chain for records saved before snapshots existed.
    ///
    /// One snapshot per history entry, each carrying the latest context and
    /// agents. Per-turn actions are not recoverable and stay empty. Returns
    /// true if a chain was synthesized.
    pub fn fill_missing_chain(&mut self) -> bool {
        if !self.turns.is_empty() || self.state.history.is_empty() {
            return false;
        }
        let agents: Vec<SnapshotAgent> = TurnSnapshot::capture(&self.state, &[]).agents;
        self.turns = self
            .state
            .history
            .iter()
            .map(|entry| TurnSnapshot {
                turn: entry.turn,
                headline: entry.headline.clone(),
                narration: entry.narration.clone(),
                context: self.state.context.clone(),
                agents: agents.clone(),
                agent_actions: Vec::new(),
            })
            .collect();
        true
    }

    /// Rebuilds a linear `SessionTree` from the snapshot chain and returns it
    /// with the id of the last node.
    ///
    /// Portrait fields are taken from the latest state, matched by agent id.
    /// A record with neither snapshots nor history replays as a single root
    /// holding `state`.
    pub fn replay(&self) -> Result<(SessionTree, NodeId)> {
        let mut tree = SessionTree::new();

        if self.turns.is_empty() {
            let root = tree.add_node(None, self.state.clone(), None)?;
            return Ok((tree, root));
        }

        let portraits: HashMap<&str, &Agent> = self
            .state
            .agents
            .iter()
            .map(|agent| (agent.id.as_str(), agent))
            .collect();
        let mut history: Vec<TurnEntry> = Vec::new();
        let mut actions: HashMap<&str, Vec<AgentAction>> = HashMap::new();
        let mut parent: Option<NodeId> = None;

        for snapshot in &self.turns {
            if snapshot.turn > 0 {
                history.push(TurnEntry {
                    turn: snapshot.turn,
                    headline: snapshot.headline.clone(),
                    narration: snapshot.narration.clone(),
                });
            }
            for applied in &snapshot.agent_actions {
                actions
                    .entry(applied.agent_id.as_str())
                    .or_default()
                    .push(AgentAction {
                        turn: snapshot.turn,
                        action: applied.action.clone(),
                    });
            }

            let agents = snapshot
                .agents
                .iter()
                .map(|stored| {
                    let mut agent = Agent::new(
                        stored.id.clone(),
                        stored.name.clone(),
                        stored.kind.clone(),
                        stored.state.clone(),
                    );
                    agent.action_history = actions.get(stored.id.as_str()).cloned().unwrap_or_default();
                    if let Some(latest) = portraits.get(stored.id.as_str()) {
                        agent.appearance = latest.appearance.clone();
                        agent.avatar = latest.avatar.clone();
                    }
                    agent
                })
                .collect();

            let context = if snapshot.context.is_empty() {
                self.state.context.clone()
            } else {
                snapshot.context.clone()
            };

            let world = WorldState {
                turn: snapshot.turn,
                context,
                headline: snapshot.headline.clone(),
                agents,
                history: history.clone(),
            };

            let id = tree.add_node(parent.as_ref(), world, None)?;
            if let Some(node) = tree.node_mut(&id) {
                node.applied_actions = snapshot
                    .agent_actions
                    .iter()
                    .map(|applied| AgentDecision::new(applied.agent_id.clone(), applied.action.clone()))
                    .collect();
            }
            parent = Some(id);
        }

        let last = parent.ok_or_else(|| SagaError::internal("replay produced no nodes"))?;
        Ok((tree, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::NarrativeResult;
    use crate::world::{AvatarDescriptor, apply_turn};

    #[test]
    fn test_blank_goal_falls_back_to_default() {
        let mut player = PlayerProfile {
            agent_id: "A".into(),
            name: Some("Ada".into()),
            goal: Some("  ".into()),
        };
        assert_eq!(player.goal_or_default(), PlayerProfile::DEFAULT_GOAL);
        player.goal = Some(" own the harbour ".into());
        assert_eq!(player.goal_or_default(), "own the harbour");
    }

    fn opening() -> WorldState {
        let mut ada = Agent::new("A", "Ada", "Guild", "wealthy");
        ada.appearance = Some("tall".into());
        ada.avatar = Some(AvatarDescriptor {
            prompt: "portrait of Ada".into(),
            image_url: None,
        });
        WorldState::new("port", vec![ada, Agent::new("B", "Bram", "Smuggler", "hiding")])
    }

    /// Plays `turns` turns in a tree and returns the tree plus the leaf.
    fn played(turns: u32) -> (SessionTree, NodeId) {
        let mut tree = SessionTree::new();
        let mut current = tree.add_node(None, opening(), None).unwrap();
        for turn in 1..=turns {
            let world = tree.node(&current).unwrap().world.clone();
            let decisions = vec![
                AgentDecision::new("A", format!("A acts {turn}")),
                AgentDecision::new("B", format!("B acts {turn}")),
            ];
            let narrative = NarrativeResult::new(format!("H{turn}"), format!("N{turn}"))
                .with_update("A", format!("A state {turn}"));
            let applied = apply_turn(&world, &decisions, &narrative);
            let id = tree
                .add_node(Some(&current), applied.world, Some(format!("act {turn}")))
                .unwrap();
            tree.node_mut(&id).unwrap().applied_actions = applied.applied_actions;
            current = id;
        }
        (tree, current)
    }

    #[test]
    fn test_new_record_has_opening_snapshot() {
        let record = GameRecord::new("g", "Port", opening());
        assert_eq!(record.turns.len(), 1);
        assert_eq!(record.turns[0].turn, 0);
        assert_eq!(record.turns[0].narration, "");
    }

    #[test]
    fn test_replay_matches_chain() {
        let (tree, leaf) = played(3);
        let path = tree.get_path(&leaf).unwrap();
        let mut record = GameRecord::new("g", "Port", opening());
        record.set_path(&path).unwrap();

        let (replayed, last) = record.replay().unwrap();
        let replayed_path = replayed.get_path(&last).unwrap();

        assert_eq!(replayed_path.len(), record.turns.len());
        for (node, snapshot) in replayed_path.iter().zip(&record.turns) {
            assert_eq!(node.world.turn, snapshot.turn);
            assert_eq!(node.world.headline, snapshot.headline);
            assert_eq!(node.world.latest_narration(), snapshot.narration);
            assert!(node.world.validate().is_ok());
        }
        // Action histories and portraits survive the round trip.
        assert_eq!(replayed_path[3].world, path[3].world);
    }

    #[test]
    fn test_legacy_record_gets_history_chain() {
        let (tree, leaf) = played(2);
        let latest = tree.node(&leaf).unwrap().world.clone();
        let mut record = GameRecord::new("g", "Port", latest);
        record.turns.clear();

        assert!(record.fill_missing_chain());
        assert_eq!(record.turns.len(), 2);
        assert!(record.turns.iter().all(|s| s.agent_actions.is_empty()));
        assert!(!record.fill_missing_chain());

        let (replayed, last) = record.replay().unwrap();
        assert_eq!(replayed.get_path(&last).unwrap().len(), 2);
        assert_eq!(replayed.node(&last).unwrap().world.turn, 2);
    }

    #[test]
    fn test_empty_record_replays_as_root() {
        let mut record = GameRecord::new("g", "Port", opening());
        record.turns.clear();
        assert!(!record.fill_missing_chain());
        let (tree, root) = record.replay().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(&root).unwrap().world, opening());
    }

    #[test]
    fn test_expiry() {
        let record = GameRecord::new("g", "Port", opening());
        let retention = Duration::days(30);
        assert!(!record.is_expired(retention, record.updated_at + Duration::days(29)));
        assert!(record.is_expired(retention, record.updated_at + Duration::days(30)));
    }
}
