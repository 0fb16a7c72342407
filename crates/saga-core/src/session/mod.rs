//! Branching session model and its persisted form.

pub mod repository;
pub mod snapshot;
pub mod tree;

pub use repository::SnapshotStore;
pub use snapshot::{GameRecord, GameSummary, PlayerProfile, SnapshotAgent, TurnSnapshot};
pub use tree::{NodeId, NodeProgress, ProgressPhase, SessionNode, SessionTree};
