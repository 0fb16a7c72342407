//! Turn orchestration and session behaviour against a scripted provider.

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use saga_application::{
    PersistenceQueue, SaveStatus, SessionMetadata, SimulationSession, TurnInput, TurnOrchestrator,
};
use saga_core::config::RootConfig;
use saga_core::generation::{GenerationProvider, GenerationStream, StreamEvent, StructuredRequest};
use saga_core::session::SnapshotStore;
use saga_core::turn::{AgentDecision, PlayerAction, TurnEvent, TurnRequest};
use saga_core::world::{Agent, WorldState};
use saga_core::{Result, SagaError};
use saga_infrastructure::InMemorySnapshotStore;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Decides per agent name and streams a fixed narrative.
struct ScriptedProvider {
    failing: HashSet<String>,
    narrative: Option<Value>,
    log: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(narrative: Option<Value>) -> Self {
        Self {
            failing: HashSet::new(),
            narrative,
            log: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn agent_name(prompt: &str) -> String {
    prompt
        .strip_prefix("You are ")
        .and_then(|rest| rest.split_once(','))
        .map(|(name, _)| name.to_string())
        .unwrap_or_default()
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate_structured(&self, request: StructuredRequest) -> Result<Value> {
        let name = agent_name(&request.prompt);
        // Later agents answer first.
        let delay = if name == "Ada" { 40 } else { 5 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.log.lock().unwrap().push(format!("decided:{name}"));
        if self.failing.contains(&name) {
            return Err(SagaError::upstream("503 overloaded"));
        }
        Ok(json!({"action": format!("{name} acts"), "reasoning": "because"}))
    }

    async fn stream_structured(&self, request: StructuredRequest) -> Result<GenerationStream> {
        self.log.lock().unwrap().push("narrating".to_string());
        self.prompts.lock().unwrap().push(request.prompt);
        let text = self.narrative.as_ref().map(Value::to_string).unwrap_or_default();
        let chars: Vec<char> = text.chars().collect();
        let mut events: Vec<Result<StreamEvent>> = chars
            .chunks(6)
            .map(|chunk| Ok(StreamEvent::Delta(chunk.iter().collect())))
            .collect();
        events.push(Ok(StreamEvent::Completed(self.narrative.clone())));
        Ok(stream::iter(events).boxed())
    }
}

fn opening() -> WorldState {
    WorldState::new(
        "A port city",
        vec![
            Agent::new("A", "Ada", "Guild", "wealthy"),
            Agent::new("B", "Bram", "Smuggler", "hiding"),
        ],
    )
}

fn narrative() -> Value {
    json!({
        "headline": "X",
        "narration": "Y",
        "updatedContext": "A port city, one day later",
        "agentStateUpdates": [{"agentId": "A", "newState": "new"}]
    })
}

fn long_narrative() -> Value {
    json!({
        "headline": "Guild Seizes Harbour",
        "narration": "The guild moved before dawn and every berth changed hands. ".repeat(4),
        "agentStateUpdates": [
            {"agentId": "A", "newState": "owns the harbour"},
            {"agentId": "B", "newState": "priced out"}
        ]
    })
}

fn orchestrator(provider: Arc<ScriptedProvider>) -> Arc<TurnOrchestrator> {
    Arc::new(TurnOrchestrator::new(provider, &RootConfig::default()))
}

async fn run(
    orchestrator: &TurnOrchestrator,
    world: &WorldState,
    player_action: Option<&PlayerAction>,
) -> (Result<saga_application::TurnReport>, Vec<TurnEvent>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let result = orchestrator.run_turn(world, player_action, &tx).await;
    drop(tx);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

#[tokio::test]
async fn state_updates_drive_action_history() {
    let provider = Arc::new(ScriptedProvider::new(Some(narrative())));
    let world = opening();
    let before = world.clone();

    let (result, _) = run(&orchestrator(provider), &world, None).await;
    let report = result.unwrap();

    assert_eq!(world, before);
    let next = &report.world;
    assert_eq!(next.turn, 1);
    assert_eq!(next.headline, "X");
    assert_eq!(next.context, "A port city, one day later");
    assert_eq!(next.history.len(), 1);

    let ada = next.agent("A").unwrap();
    assert_eq!(ada.state, "new");
    assert_eq!(ada.action_history.len(), 1);
    assert_eq!(ada.action_history[0].turn, 1);
    assert_eq!(ada.action_history[0].action, "Ada acts");

    let bram = next.agent("B").unwrap();
    assert_eq!(bram.state, "hiding");
    assert!(bram.action_history.is_empty());

    assert_eq!(report.decisions.len(), 2);
    assert_eq!(report.applied_actions.len(), 1);
}

#[tokio::test]
async fn synthesis_waits_for_every_decision() {
    let provider = Arc::new(ScriptedProvider::new(Some(narrative())));
    let (result, _) = run(&orchestrator(provider.clone()), &opening(), None).await;
    result.unwrap();

    let log = provider.log();
    assert_eq!(log, vec!["decided:Bram", "decided:Ada", "narrating"]);
}

#[tokio::test]
async fn failed_agent_is_left_out() {
    let provider = Arc::new(ScriptedProvider::new(Some(long_narrative())).failing("Bram"));
    let (result, events) = run(&orchestrator(provider.clone()), &opening(), None).await;
    let report = result.unwrap();

    assert_eq!(report.failed_agents, vec!["B".to_string()]);
    assert_eq!(report.decisions.len(), 1);
    let updates: Vec<&TurnEvent> = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::AgentUpdate { .. }))
        .collect();
    assert_eq!(updates.len(), 1);

    // B still gets its state replaced, but has no decision to record.
    let bram = report.world.agent("B").unwrap();
    assert_eq!(bram.state, "priced out");
    assert!(bram.action_history.is_empty());
    let prompt = provider.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("**Bram** (Smuggler): takes no notable action"));
}

#[tokio::test]
async fn events_follow_the_stream_contract() {
    let provider = Arc::new(ScriptedProvider::new(Some(long_narrative())));
    let (result, events) = run(&orchestrator(provider), &opening(), None).await;
    result.unwrap();

    let phase_at: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, TurnEvent::Phase { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(phase_at.len(), 1);
    let phase_at = phase_at[0];

    for (index, event) in events.iter().enumerate() {
        match event {
            TurnEvent::AgentUpdate { .. } => assert!(index < phase_at),
            TurnEvent::Headline { .. } | TurnEvent::Narration { .. } | TurnEvent::ImageReady { .. } => {
                assert!(index > phase_at)
            }
            _ => {}
        }
    }
    assert!(matches!(events[phase_at + 1], TurnEvent::Headline { .. }));

    let ready = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::ImageReady { .. }))
        .count();
    assert_eq!(ready, 1);

    let headlines: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::Headline { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert!(headlines.windows(2).all(|w| w[1].starts_with(w[0]) && w[1].len() > w[0].len()));

    assert!(events.last().unwrap().is_terminal());
    assert!(matches!(events.last().unwrap(), TurnEvent::Done { state } if state.turn == 1));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn missing_narrative_fails_the_turn() {
    let provider = Arc::new(ScriptedProvider::new(None));
    let world = opening();
    let before = serde_json::to_string(&world).unwrap();

    let (result, events) = run(&orchestrator(provider), &world, None).await;

    assert!(matches!(result, Err(SagaError::SynthesisFailed(_))));
    assert_eq!(serde_json::to_string(&world).unwrap(), before);
    assert!(matches!(events.last().unwrap(), TurnEvent::Error { .. }));
    assert!(!events.iter().any(|e| matches!(e, TurnEvent::Done { .. })));
}

#[tokio::test]
async fn unknown_player_agent_is_rejected_before_any_request() {
    let provider = Arc::new(ScriptedProvider::new(Some(narrative())));
    let declared = PlayerAction::new("Z", "do something");
    let (result, events) = run(&orchestrator(provider.clone()), &opening(), Some(&declared)).await;

    assert!(result.unwrap_err().is_validation());
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], TurnEvent::Error { .. }));
    assert!(provider.log().is_empty());
}

#[tokio::test]
async fn supplied_actions_skip_the_fanout() {
    let provider = Arc::new(ScriptedProvider::new(Some(narrative())));
    let request = TurnRequest::new(opening())
        .with_agent_actions(vec![AgentDecision::new("A", "sells everything")]);

    let report = orchestrator(provider.clone()).execute(request).await.unwrap();

    assert_eq!(provider.log(), vec!["narrating"]);
    assert_eq!(report.world.agent("A").unwrap().action_history[0].action, "sells everything");
}

#[tokio::test]
async fn session_failure_leaves_tree_unchanged() {
    let provider = Arc::new(ScriptedProvider::new(None));
    let mut session = SimulationSession::start(
        SessionMetadata::new("Harbour"),
        opening(),
        orchestrator(provider),
    )
    .unwrap();
    let root = session.current_id().clone();

    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(session.play_turn(TurnInput::free(), &tx).await.is_err());

    assert_eq!(session.tree().len(), 1);
    assert_eq!(session.current_id(), &root);
}

#[tokio::test]
async fn session_branches_persist_and_replay() {
    let provider = Arc::new(ScriptedProvider::new(Some(long_narrative())));
    let store = Arc::new(InMemorySnapshotStore::default());
    let queue = PersistenceQueue::spawn(store.clone());
    let mut session = SimulationSession::start(
        SessionMetadata::new("Harbour"),
        opening(),
        orchestrator(provider),
    )
    .unwrap()
    .with_persistence(queue.clone());
    let root = session.current_id().clone();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let first = session
        .play_turn(TurnInput::declared("A", "buy the harbour"), &tx)
        .await
        .unwrap();
    let second = session.play_turn(TurnInput::free(), &tx).await.unwrap();
    assert_eq!(session.world().unwrap().turn, 2);
    assert!(!session.current().unwrap().is_generating());
    assert_eq!(
        session.tree().node(&first).unwrap().action.as_deref(),
        Some("buy the harbour")
    );

    // Fork from the root.
    session.navigate(&root).unwrap();
    let fork = session.play_turn(TurnInput::free(), &tx).await.unwrap();
    let siblings: Vec<_> = session.siblings().into_iter().map(|n| n.id.clone()).collect();
    assert_eq!(siblings, vec![first.clone()]);
    assert_eq!(session.world().unwrap().turn, 1);

    session.navigate(&root).unwrap();
    assert_eq!(session.go_to_latest(), &second);
    assert_ne!(fork, second);

    drop(tx);
    let mut done = 0;
    while let Some(event) = rx.recv().await {
        if matches!(event, TurnEvent::Done { .. }) {
            done += 1;
        }
    }
    assert_eq!(done, 3);

    queue.flush().await;
    assert!(matches!(queue.status(), SaveStatus::Saved { .. }));

    // The last save was the fork, a two-node path.
    let id = session.metadata().id.clone();
    let record = store.load(&id).await.unwrap().unwrap();
    assert_eq!(record.turns.len(), 2);
    assert_eq!(record.state.turn, 1);

    session.navigate(&fork).unwrap();
    let expected = session.to_record().unwrap();
    let replayed =
        SimulationSession::from_record(record, orchestrator(Arc::new(ScriptedProvider::new(None))))
            .unwrap();
    let timeline = |s: &SimulationSession| -> Vec<(u32, String, String)> {
        s.path()
            .unwrap()
            .iter()
            .map(|n| (n.world.turn, n.world.headline.clone(), n.world.latest_narration().to_string()))
            .collect()
    };
    assert_eq!(timeline(&replayed), timeline(&session));
    assert_eq!(replayed.to_record().unwrap().turns, expected.turns);
}
