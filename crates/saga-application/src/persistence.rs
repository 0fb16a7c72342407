//! Background persistence of session records.
//!
//! Saving runs on its own task so a turn never waits on, or fails because
//! of, the snapshot store.

use chrono::{DateTime, Utc};
use saga_core::session::{GameRecord, SnapshotStore};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Outcome of the most recent save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    /// Nothing submitted yet
    Idle,
    Saved {
        session_id: String,
        at: DateTime<Utc>,
    },
    /// The last save failed; the session only exists in memory
    Unsaved { reason: String },
}

enum Command {
    Save(GameRecord),
    Flush(oneshot::Sender<()>),
}

/// Handle to the persistence task. Clones share the same task.
#[derive(Clone)]
pub struct PersistenceQueue {
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SaveStatus>,
}

impl PersistenceQueue {
    /// Starts the persistence task on the current tokio runtime.
    ///
    /// The task processes commands in submission order and exits once every
    /// handle has been dropped.
    pub fn spawn(store: Arc<dyn SnapshotStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let (status_tx, status) = watch::channel(SaveStatus::Idle);

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Save(record) => {
                        let status = match store.save(&record).await {
                            Ok(()) => {
                                tracing::debug!(
                                    "[PersistenceQueue] saved game {} at turn {}",
                                    record.id,
                                    record.state.turn
                                );
                                SaveStatus::Saved {
                                    session_id: record.id,
                                    at: Utc::now(),
                                }
                            }
                            Err(err) => {
                                tracing::warn!(
                                    "[PersistenceQueue] failed to save game {}: {}",
                                    record.id,
                                    err
                                );
                                SaveStatus::Unsaved {
                                    reason: err.to_string(),
                                }
                            }
                        };
                        status_tx.send_replace(status);
                    }
                    Command::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }
            tracing::debug!("[PersistenceQueue] all handles dropped, stopping");
        });

        Self { tx, status }
    }

    /// Queues a save. Never fails the caller; a stopped task is logged.
    pub fn submit(&self, record: GameRecord) {
        if self.tx.send(Command::Save(record)).is_err() {
            tracing::warn!("[PersistenceQueue] task is gone, save dropped");
        }
    }

    /// Waits until everything submitted before this call has been processed.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }
}
