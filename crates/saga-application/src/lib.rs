//! Application layer for saga.
//!
//! Coordinates the generation steps into turns, keeps each session's tree
//! of turns, and persists played paths in the background.

pub mod persistence;
pub mod session;
pub mod turn_orchestrator;

pub use persistence::{PersistenceQueue, SaveStatus};
pub use session::{SessionMetadata, SimulationSession, TurnInput};
pub use turn_orchestrator::{TurnOrchestrator, TurnReport};
