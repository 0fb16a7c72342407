//! Ephemeral `SnapshotStore` for `--ephemeral` sessions and tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use saga_core::Result;
use saga_core::session::{GameRecord, GameSummary, SnapshotStore};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Same contract as the file store, nothing survives the process.
pub struct InMemorySnapshotStore {
    records: RwLock<HashMap<String, GameRecord>>,
    retention: Duration,
}

impl InMemorySnapshotStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new(Duration::days(30))
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, record: &GameRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<GameRecord>> {
        let mut records = self.records.write().await;
        let expired = records
            .get(session_id)
            .is_some_and(|record| record.is_expired(self.retention, Utc::now()));
        if expired {
            records.remove(session_id);
            return Ok(None);
        }
        Ok(records.get(session_id).cloned().map(|mut record| {
            record.fill_missing_chain();
            record
        }))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<GameSummary>> {
        let now = Utc::now();
        let mut summaries: Vec<GameSummary> = self
            .records
            .read()
            .await
            .values()
            .filter(|record| !record.is_expired(self.retention, now))
            .map(GameRecord::summary)
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.records.write().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::session::TurnSnapshot;
    use saga_core::world::{Agent, WorldState};

    fn record(id: &str, minutes_ago: i64) -> GameRecord {
        let mut record = GameRecord::new(
            id,
            "Harbour",
            WorldState::new("ctx", vec![Agent::new("A", "Ada", "Guild", "wealthy")]),
        );
        record.updated_at = Utc::now() - Duration::minutes(minutes_ago);
        record
    }

    #[tokio::test]
    async fn test_list_recent_orders_by_update() {
        let store = InMemorySnapshotStore::default();
        for (id, age) in [("a", 30), ("b", 5), ("c", 60)] {
            store.save(&record(id, age)).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|summary| summary.id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_default_append_extends_chain() {
        let store = InMemorySnapshotStore::default();
        store.save(&record("g", 0)).await.unwrap();

        let mut next = WorldState::new("ctx 2", Vec::new());
        next.turn = 1;
        store
            .append("g", TurnSnapshot::capture(&next, &[]), &next)
            .await
            .unwrap();

        let loaded = store.load("g").await.unwrap().unwrap();
        assert_eq!(loaded.turns.len(), 2);
        assert_eq!(loaded.state.context, "ctx 2");
        assert!(store.append("missing", TurnSnapshot::capture(&next, &[]), &next).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_expired_records_are_dropped() {
        let store = InMemorySnapshotStore::new(Duration::hours(1));
        store.save(&record("old", 120)).await.unwrap();
        assert!(store.list_recent(10).await.unwrap().is_empty());
        assert!(store.load("old").await.unwrap().is_none());
        assert_eq!(store.len().await, 0);
    }
}
