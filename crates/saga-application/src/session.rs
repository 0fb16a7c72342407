//! Per-session context.
//!
//! A `SimulationSession` owns one branching tree of turns and the handles
//! needed to extend it. Nothing here is process-global: the CLI creates one
//! session per game and passes it by reference.

use crate::persistence::PersistenceQueue;
use crate::turn_orchestrator::{TurnOrchestrator, TurnReport};
use chrono::{DateTime, Utc};
use saga_core::scoring::{AgentScorer, GoalScore};
use saga_core::session::{
    GameRecord, NodeId, NodeProgress, PlayerProfile, ProgressPhase, SessionNode, SessionTree,
};
use saga_core::turn::{AgentDecision, PlayerAction, TurnEvent, TurnRequest};
use saga_core::world::WorldState;
use saga_core::{Result, SagaError};
use saga_interaction::{AutopilotAdvisor, GoalScorer};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use uuid::Uuid;

/// Identity and labels of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub id: String,
    pub scenario_name: String,
    pub name: Option<String>,
    pub player: Option<PlayerProfile>,
    pub created_at: DateTime<Utc>,
}

impl SessionMetadata {
    /// Fresh metadata with a generated id.
    pub fn new(scenario_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scenario_name: scenario_name.into(),
            name: None,
            player: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_player(mut self, player: PlayerProfile) -> Self {
        self.player = Some(player);
        self
    }
}

/// What the caller contributes to one turn.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    /// `None` lets every agent decide freely
    pub player_action: Option<PlayerAction>,
}

impl TurnInput {
    /// No declared action.
    pub fn free() -> Self {
        Self::default()
    }

    pub fn declared(agent_id: impl Into<String>, action_text: impl Into<String>) -> Self {
        Self {
            player_action: Some(PlayerAction::new(agent_id, action_text)),
        }
    }

    fn label(&self) -> Option<String> {
        self.player_action
            .as_ref()
            .map(|declared| declared.action_text.clone())
    }
}

pub struct SimulationSession {
    metadata: SessionMetadata,
    tree: SessionTree,
    current: NodeId,
    orchestrator: Arc<TurnOrchestrator>,
    scorer: Option<Arc<dyn AgentScorer>>,
    goal_scorer: Option<Arc<GoalScorer>>,
    autopilot: Option<Arc<AutopilotAdvisor>>,
    persistence: Option<PersistenceQueue>,
}

impl SimulationSession {
    /// Creates a session whose root holds `world`.
    ///
    /// # Errors
    ///
    /// `SagaError::Validation` if `world` is malformed.
    pub fn start(
        metadata: SessionMetadata,
        world: WorldState,
        orchestrator: Arc<TurnOrchestrator>,
    ) -> Result<Self> {
        world.validate()?;
        let mut tree = SessionTree::new();
        let root = tree.add_node(None, world, None)?;
        tracing::info!("[SimulationSession] started {} ({})", metadata.id, metadata.scenario_name);
        Ok(Self {
            metadata,
            tree,
            current: root,
            orchestrator,
            scorer: None,
            goal_scorer: None,
            autopilot: None,
            persistence: None,
        })
    }

    /// Rebuilds a session from a stored record, positioned on its last turn.
    pub fn from_record(record: GameRecord, orchestrator: Arc<TurnOrchestrator>) -> Result<Self> {
        let (tree, current) = record.replay()?;
        tracing::info!(
            "[SimulationSession] resumed {} at turn {}",
            record.id,
            record.state.turn
        );
        Ok(Self {
            metadata: SessionMetadata {
                id: record.id,
                scenario_name: record.scenario_name,
                name: record.name,
                player: record.player,
                created_at: record.created_at,
            },
            tree,
            current,
            orchestrator,
            scorer: None,
            goal_scorer: None,
            autopilot: None,
            persistence: None,
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn AgentScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_goal_scorer(mut self, scorer: Arc<GoalScorer>) -> Self {
        self.goal_scorer = Some(scorer);
        self
    }

    pub fn with_autopilot(mut self, advisor: Arc<AutopilotAdvisor>) -> Self {
        self.autopilot = Some(advisor);
        self
    }

    pub fn with_persistence(mut self, queue: PersistenceQueue) -> Self {
        self.persistence = Some(queue);
        self
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    pub fn tree(&self) -> &SessionTree {
        &self.tree
    }

    pub fn current_id(&self) -> &NodeId {
        &self.current
    }

    pub fn current(&self) -> Result<&SessionNode> {
        self.node(&self.current)
    }

    pub fn world(&self) -> Result<&WorldState> {
        Ok(&self.current()?.world)
    }

    pub fn persistence(&self) -> Option<&PersistenceQueue> {
        self.persistence.as_ref()
    }

    fn node(&self, id: &NodeId) -> Result<&SessionNode> {
        self.tree
            .node(id)
            .ok_or_else(|| SagaError::not_found("session node", id.as_str()))
    }

    /// Plays one turn from the current node and streams its events to `sink`.
    ///
    /// A placeholder child of the current node tracks progress while the turn
    /// runs. On success it receives the new world and becomes current; on
    /// failure it is removed and the tree is exactly as before. Playing from
    /// a node that already has children creates a sibling branch.
    ///
    /// # Returns
    ///
    /// The id of the new node.
    pub async fn play_turn(
        &mut self,
        input: TurnInput,
        sink: &UnboundedSender<TurnEvent>,
    ) -> Result<NodeId> {
        let parent = self.current.clone();
        let world = self.node(&parent)?.world.clone();
        let placeholder = self
            .tree
            .add_node(Some(&parent), world.clone(), input.label())?;
        if let Some(node) = self.tree.node_mut(&placeholder) {
            node.progress = Some(NodeProgress::default());
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let player_action = input.player_action;
        let run = async move {
            let result = orchestrator
                .run_turn(&world, player_action.as_ref(), &tx)
                .await;
            drop(tx);
            result
        };
        let tree = &mut self.tree;
        let forward = async {
            while let Some(event) = rx.recv().await {
                if let Some(node) = tree.node_mut(&placeholder) {
                    track_progress(node, &event);
                }
                let _ = sink.send(event);
            }
        };
        let (result, ()) = tokio::join!(run, forward);

        match result {
            Ok(report) => {
                self.commit(&placeholder, report);
                Ok(placeholder)
            }
            Err(err) => {
                self.tree.remove_leaf(&placeholder)?;
                Err(err)
            }
        }
    }

    /// Plays one turn from the current node without streaming.
    ///
    /// `actions`, when given, replace the decision fanout.
    pub async fn play_turn_with_actions(
        &mut self,
        input: TurnInput,
        actions: Option<Vec<AgentDecision>>,
    ) -> Result<NodeId> {
        let parent = self.current.clone();
        let mut request = TurnRequest::new(self.node(&parent)?.world.clone());
        request.player_action = input.player_action.clone();
        request.agent_actions = actions;
        request.session_ref = Some(self.metadata.id.clone());

        let report = self.orchestrator.execute(request).await?;
        let id = self
            .tree
            .add_node(Some(&parent), report.world.clone(), input.label())?;
        self.commit(&id, report);
        Ok(id)
    }

    fn commit(&mut self, id: &NodeId, report: TurnReport) {
        if let Some(node) = self.tree.node_mut(id) {
            node.world = report.world;
            node.applied_actions = report.applied_actions;
            node.progress = None;
        }
        self.current = id.clone();
        self.submit_save();
    }

    fn submit_save(&self) {
        let Some(queue) = &self.persistence else {
            return;
        };
        match self.to_record() {
            Ok(record) => queue.submit(record),
            Err(err) => tracing::warn!("[SimulationSession] could not build record: {}", err),
        }
    }

    /// Makes `id` the current node.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    pub fn navigate(&mut self, id: &NodeId) -> Result<()> {
        self.node(id)?;
        self.current = id.clone();
        Ok(())
    }

    /// Moves to the latest descendant of the current node.
    pub fn go_to_latest(&mut self) -> &NodeId {
        self.current = self.tree.get_latest_descendant(&self.current);
        &self.current
    }

    /// Root-to-current path.
    pub fn path(&self) -> Result<Vec<&SessionNode>> {
        self.tree.get_path(&self.current)
    }

    /// Alternative branches at the current node's depth.
    pub fn siblings(&self) -> Vec<&SessionNode> {
        self.tree.get_siblings(&self.current)
    }

    /// Scores the agents of node `id` and caches the result on the node.
    ///
    /// Scoring is optional: without a scorer, or when scoring fails, the
    /// cache stays empty and `None` is returned.
    pub async fn refresh_scores(&mut self, id: &NodeId) -> Option<HashMap<String, u8>> {
        let scorer = self.scorer.clone()?;
        let world = self.tree.node(id)?.world.clone();
        match scorer.score_agents(&world).await {
            Ok(scores) => {
                if let Some(node) = self.tree.node_mut(id) {
                    node.agent_scores = Some(scores.clone());
                }
                Some(scores)
            }
            Err(err) => {
                tracing::warn!("[SimulationSession] scoring failed for node {}: {}", id, err);
                None
            }
        }
    }

    /// Scores the player's goal progress at node `id` and caches it on the node.
    ///
    /// Returns `None`, leaving the cache empty, when the session has no
    /// player or goal scorer or when scoring fails.
    pub async fn refresh_goal_score(&mut self, id: &NodeId) -> Option<GoalScore> {
        let scorer = self.goal_scorer.clone()?;
        let player = self.metadata.player.clone()?;
        let world = self.tree.node(id)?.world.clone();
        match scorer.score_goal(&world, &player).await {
            Ok(score) => {
                if let Some(node) = self.tree.node_mut(id) {
                    node.goal_score = Some(score.clone());
                }
                Some(score)
            }
            Err(err) => {
                tracing::warn!("[SimulationSession] goal scoring failed for node {}: {}", id, err);
                None
            }
        }
    }

    /// Asks the autopilot for the player's next move at the current node.
    ///
    /// The returned input declares the chosen action for the player's agent;
    /// the reasoning is returned alongside for display.
    ///
    /// # Errors
    ///
    /// `Validation` when the session has no player or no autopilot, and
    /// whatever the advisor reports.
    pub async fn autopilot_input(&self) -> Result<(TurnInput, String)> {
        let player = self
            .metadata
            .player
            .as_ref()
            .ok_or_else(|| SagaError::validation("autopilot needs a player agent"))?;
        let advisor = self
            .autopilot
            .as_ref()
            .ok_or_else(|| SagaError::validation("autopilot is not available in this session"))?;
        let choice = advisor.choose_action(self.world()?, player).await?;
        Ok((
            TurnInput {
                player_action: Some(choice.action),
            },
            choice.reasoning,
        ))
    }

    /// Snapshot of the root-to-current path for storage.
    pub fn to_record(&self) -> Result<GameRecord> {
        let path = self.path()?;
        let root = path
            .first()
            .ok_or_else(|| SagaError::internal("session has no root"))?;
        let mut record = GameRecord::new(
            self.metadata.id.clone(),
            self.metadata.scenario_name.clone(),
            root.world.clone(),
        );
        record.set_path(&path)?;
        record.name = self.metadata.name.clone();
        record.player = self.metadata.player.clone();
        record.created_at = self.metadata.created_at;
        Ok(record)
    }
}

fn track_progress(node: &mut SessionNode, event: &TurnEvent) {
    let Some(progress) = node.progress.as_mut() else {
        return;
    };
    match event {
        TurnEvent::AgentUpdate { agent_id, action } => {
            progress.agent_actions.push((agent_id.clone(), action.clone()));
        }
        TurnEvent::Phase { .. } => progress.phase = ProgressPhase::SynthesizingNarrative,
        TurnEvent::Headline { content } => progress.headline = content.clone(),
        TurnEvent::Narration { content } => progress.narration = content.clone(),
        TurnEvent::ImageReady { .. } | TurnEvent::Done { .. } | TurnEvent::Error { .. } => {}
    }
}
