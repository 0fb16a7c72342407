//! File-backed `SnapshotStore`.
//!
//! One `<session-id>.json` per game under the games directory. Records
//! older than the retention window are treated as absent and removed when
//! they are next seen.

use crate::dto::GameRecordDto;
use crate::storage::AtomicJsonFile;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use saga_core::session::{GameRecord, GameSummary, SnapshotStore, TurnSnapshot};
use saga_core::world::WorldState;
use saga_core::{Result, SagaError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const EXTENSION: &str = "json";

pub struct FileSnapshotStore {
    inner: Arc<Inner>,
}

struct Inner {
    games_dir: PathBuf,
    retention: Duration,
}

impl FileSnapshotStore {
    /// Creates a store rooted at `games_dir`, creating the directory.
    ///
    /// # Arguments
    ///
    /// * `games_dir` - Directory holding one JSON file per game
    /// * `retention` - Time after the last update at which a game expires
    pub fn new(games_dir: impl AsRef<Path>, retention: Duration) -> Result<Self> {
        let games_dir = games_dir.as_ref().to_path_buf();
        fs::create_dir_all(&games_dir).map_err(|e| {
            SagaError::persistence(format!("Failed to create {}: {}", games_dir.display(), e))
        })?;
        Ok(Self {
            inner: Arc::new(Inner { games_dir, retention }),
        })
    }

    pub fn games_dir(&self) -> &Path {
        &self.inner.games_dir
    }

    /// Removes every expired game and returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize> {
        self.blocking(|inner| {
            let mut removed = 0;
            for path in inner.game_files()? {
                match inner.read(&path) {
                    Ok(Some(record)) if inner.is_expired(&record) => {
                        inner.file(&path).remove()?;
                        removed += 1;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!("[FileSnapshotStore] skipping {}: {}", path.display(), err)
                    }
                }
            }
            if removed > 0 {
                tracing::info!("[FileSnapshotStore] purged {} expired games", removed);
            }
            Ok(removed)
        })
        .await
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| SagaError::internal(format!("storage task failed: {}", e)))?
    }
}

impl Inner {
    fn path_for(&self, session_id: &str) -> Result<PathBuf> {
        let valid = !session_id.is_empty()
            && !session_id.starts_with('.')
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SagaError::validation(format!("Invalid session id '{}'", session_id)));
        }
        Ok(self.games_dir.join(format!("{}.{}", session_id, EXTENSION)))
    }

    fn file(&self, path: &Path) -> AtomicJsonFile<GameRecordDto> {
        AtomicJsonFile::new(path.to_path_buf())
    }

    fn is_expired(&self, record: &GameRecord) -> bool {
        record.is_expired(self.retention, Utc::now())
    }

    /// Reads a record without expiry handling.
    fn read(&self, path: &Path) -> Result<Option<GameRecord>> {
        self.file(path).load()?.map(GameRecordDto::into_domain).transpose()
    }

    /// Reads a record, dropping it if expired and rebuilding a missing chain.
    fn read_live(&self, path: &Path) -> Result<Option<GameRecord>> {
        let Some(mut record) = self.read(path)? else {
            return Ok(None);
        };
        if self.is_expired(&record) {
            tracing::info!("[FileSnapshotStore] game {} expired, removing", record.id);
            if let Err(err) = self.file(path).remove() {
                tracing::warn!("[FileSnapshotStore] failed to remove {}: {}", path.display(), err);
            }
            return Ok(None);
        }
        if record.fill_missing_chain() {
            tracing::info!(
                "[FileSnapshotStore] rebuilt {} snapshots for legacy game {}",
                record.turns.len(),
                record.id
            );
        }
        Ok(Some(record))
    }

    fn game_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.games_dir).map_err(|e| {
            SagaError::persistence(format!("Failed to list {}: {}", self.games_dir.display(), e))
        })?;
        Ok(entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == EXTENSION)
                    && path
                        .file_name()
                        .is_some_and(|name| !name.to_string_lossy().starts_with('.'))
            })
            .collect())
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, record: &GameRecord) -> Result<()> {
        let record = record.clone();
        self.blocking(move |inner| {
            let path = inner.path_for(&record.id)?;
            inner.file(&path).update(|_| Ok(Some(GameRecordDto::from_domain(record))))
        })
        .await
    }

    async fn load(&self, session_id: &str) -> Result<Option<GameRecord>> {
        let session_id = session_id.to_string();
        self.blocking(move |inner| {
            let path = inner.path_for(&session_id)?;
            inner.read_live(&path)
        })
        .await
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<GameSummary>> {
        self.blocking(move |inner| {
            let mut summaries = Vec::new();
            for path in inner.game_files()? {
                match inner.read_live(&path) {
                    Ok(Some(record)) => summaries.push(record.summary()),
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!("[FileSnapshotStore] skipping {}: {}", path.display(), err)
                    }
                }
            }
            summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            summaries.truncate(limit);
            Ok(summaries)
        })
        .await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.blocking(move |inner| {
            let path = inner.path_for(&session_id)?;
            inner.file(&path).remove()
        })
        .await
    }

    async fn append(&self, session_id: &str, snapshot: TurnSnapshot, state: &WorldState) -> Result<()> {
        let session_id = session_id.to_string();
        let state = state.clone();
        self.blocking(move |inner| {
            let path = inner.path_for(&session_id)?;
            let mut found = false;
            inner.file(&path).update(|current| {
                let Some(dto) = current else {
                    return Ok(None);
                };
                found = true;
                let mut record = dto.into_domain()?;
                record.fill_missing_chain();
                record.turns.push(snapshot);
                record.state = state;
                record.updated_at = Utc::now();
                Ok(Some(GameRecordDto::from_domain(record)))
            })?;
            if found {
                Ok(())
            } else {
                Err(SagaError::not_found("game", session_id))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saga_core::world::Agent;
    use tempfile::TempDir;

    fn world() -> WorldState {
        WorldState::new("A port city", vec![Agent::new("A", "Ada", "Guild", "wealthy")])
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path(), Duration::days(30)).unwrap();
        let record = GameRecord::new("g1", "Harbour", world());

        store.save(&record).await.unwrap();
        let loaded = store.load("g1").await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(temp_dir.path().join("g1.json").exists());
    }

    #[tokio::test]
    async fn test_missing_game_loads_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path(), Duration::days(30)).unwrap();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_path_traversal_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path(), Duration::days(30)).unwrap();
        for bad in ["../escape", "a/b", "", ".hidden"] {
            assert!(store.load(bad).await.unwrap_err().is_validation());
        }
    }

    #[tokio::test]
    async fn test_expired_game_is_absent_and_removed() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path(), Duration::days(1)).unwrap();
        let mut record = GameRecord::new("old", "Harbour", world());
        record.updated_at = Utc::now() - Duration::days(2);
        store.save(&record).await.unwrap();

        assert!(store.load("old").await.unwrap().is_none());
        assert!(!temp_dir.path().join("old.json").exists());
    }

    #[tokio::test]
    async fn test_append_to_missing_game_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path(), Duration::days(30)).unwrap();
        let err = store
            .append("ghost", TurnSnapshot::capture(&world(), &[]), &world())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!temp_dir.path().join("ghost.json").exists());
    }
}
