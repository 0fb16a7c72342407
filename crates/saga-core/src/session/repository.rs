//! Snapshot store trait.
//!
//! Defines the interface for persisting played sessions.

use super::snapshot::{GameRecord, GameSummary, TurnSnapshot};
use crate::error::{Result, SagaError};
use crate::world::WorldState;
use async_trait::async_trait;
use chrono::Utc;

/// Durable, replayable log of sessions.
///
/// # Implementation Notes
///
/// - Writes are last-write-wins on the whole `GameRecord`. Callers are
///   single-writer-per-session; implementations do not merge.
/// - `load` must apply [`GameRecord::fill_missing_chain`] so that records
///   written before snapshots existed still replay.
/// - Expired records behave as absent.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replaces the stored record for `record.id`.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Record saved
    /// - `Err(_)`: `SagaError::Persistence` or an IO error
    async fn save(&self, record: &GameRecord) -> Result<()>;

    /// Loads a record by session id.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(GameRecord))`: Record found
    /// - `Ok(None)`: Record not found or expired
    /// - `Err(_)`: Error occurred during retrieval
    async fn load(&self, session_id: &str) -> Result<Option<GameRecord>>;

    /// Most recently updated sessions first, at most `limit`.
    async fn list_recent(&self, limit: usize) -> Result<Vec<GameSummary>>;

    /// Deletes a record. Deleting a missing record is not an error.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Appends one snapshot and replaces the latest state.
    ///
    /// This is a read-modify-write of the whole record and is subject to the
    /// same last-write-wins rule as `save`.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::NotFound` if the session has no record.
    async fn append(
        &self,
        session_id: &str,
        snapshot: TurnSnapshot,
        state: &WorldState,
    ) -> Result<()> {
        let mut record = self
            .load(session_id)
            .await?
            .ok_or_else(|| SagaError::not_found("game", session_id))?;
        record.turns.push(snapshot);
        record.state = state.clone();
        record.updated_at = Utc::now();
        self.save(&record).await
    }
}
