//! End-to-end behaviour of the file-backed snapshot store.

use chrono::{Duration, Utc};
use saga_core::session::{GameRecord, SnapshotStore, TurnSnapshot};
use saga_core::turn::{AgentDecision, NarrativeResult};
use saga_core::world::{Agent, TurnEntry, WorldState, apply_turn};
use saga_infrastructure::FileSnapshotStore;
use std::fs;
use tempfile::TempDir;

fn opening() -> WorldState {
    WorldState::new(
        "A port city",
        vec![
            Agent::new("A", "Ada", "Guild", "wealthy"),
            Agent::new("B", "Bram", "Smuggler", "hiding"),
        ],
    )
}

fn store(dir: &TempDir) -> FileSnapshotStore {
    FileSnapshotStore::new(dir.path(), Duration::days(30)).unwrap()
}

#[tokio::test]
async fn appended_turns_replay_with_action_history() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let world = opening();
    store.save(&GameRecord::new("game-1", "Harbour", world.clone())).await.unwrap();

    let decisions = vec![
        AgentDecision::new("A", "buys the harbour"),
        AgentDecision::new("B", "flees"),
    ];
    let narrative = NarrativeResult::new("X", "Y").with_update("A", "new");
    let applied = apply_turn(&world, &decisions, &narrative);
    store
        .append(
            "game-1",
            TurnSnapshot::capture(&applied.world, &applied.applied_actions),
            &applied.world,
        )
        .await
        .unwrap();

    let record = store.load("game-1").await.unwrap().unwrap();
    assert_eq!(record.turns.len(), 2);
    let (tree, leaf) = record.replay().unwrap();
    let replayed = &tree.node(&leaf).unwrap().world;
    assert_eq!(replayed.turn, 1);
    assert_eq!(replayed.agent("A").unwrap().state, "new");
    assert_eq!(replayed.agent("A").unwrap().action_history.len(), 1);
    assert!(replayed.agent("B").unwrap().action_history.is_empty());
    assert_eq!(replayed.history.len(), 1);
    assert!(replayed.validate().is_ok());
}

#[tokio::test]
async fn legacy_file_without_chain_is_rebuilt_from_history() {
    let dir = TempDir::new().unwrap();
    let mut state = opening();
    state.turn = 2;
    state.headline = "H2".to_string();
    state.history = vec![
        TurnEntry { turn: 1, headline: "H1".into(), narration: "N1".into() },
        TurnEntry { turn: 2, headline: "H2".into(), narration: "N2".into() },
    ];
    let now = Utc::now().to_rfc3339();
    let legacy = serde_json::json!({
        "id": "legacy",
        "state": state,
        "scenarioName": "Harbour",
        "createdAt": now,
        "updatedAt": now,
    });
    fs::write(dir.path().join("legacy.json"), legacy.to_string()).unwrap();

    let record = store(&dir).load("legacy").await.unwrap().unwrap();
    assert_eq!(record.turns.len(), 2);
    assert_eq!(record.turns[0].headline, "H1");
    assert!(record.turns.iter().all(|snapshot| snapshot.agent_actions.is_empty()));

    let (tree, leaf) = record.replay().unwrap();
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.node(&leaf).unwrap().world.turn, 2);
}

#[tokio::test]
async fn list_recent_skips_expired_and_corrupt_files() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);

    for (id, days_ago) in [("fresh", 0), ("week", 7), ("stale", 45)] {
        let mut record = GameRecord::new(id, "Harbour", opening());
        record.updated_at = Utc::now() - Duration::days(days_ago);
        store.save(&record).await.unwrap();
    }
    fs::write(dir.path().join("broken.json"), "{").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let ids: Vec<String> = store
        .list_recent(10)
        .await
        .unwrap()
        .into_iter()
        .map(|summary| summary.id)
        .collect();
    assert_eq!(ids, vec!["fresh".to_string(), "week".to_string()]);
    assert!(!dir.path().join("stale.json").exists());
}

#[tokio::test]
async fn purge_and_delete() {
    let dir = TempDir::new().unwrap();
    let store = FileSnapshotStore::new(dir.path(), Duration::days(1)).unwrap();

    let mut old = GameRecord::new("old", "Harbour", opening());
    old.updated_at = Utc::now() - Duration::days(3);
    store.save(&old).await.unwrap();
    store.save(&GameRecord::new("kept", "Harbour", opening())).await.unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 1);
    assert!(store.load("kept").await.unwrap().is_some());

    store.delete("kept").await.unwrap();
    store.delete("kept").await.unwrap();
    assert!(store.list_recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn save_replaces_whole_record() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let mut record = GameRecord::new("g", "Harbour", opening());
    store.save(&record).await.unwrap();

    record.name = Some("Second try".to_string());
    record.turns.clear();
    store.save(&record).await.unwrap();

    let loaded = store.load("g").await.unwrap().unwrap();
    assert_eq!(loaded.name.as_deref(), Some("Second try"));
    assert!(loaded.turns.is_empty());
}
