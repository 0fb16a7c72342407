//! Turn-level types shared by the orchestrator, its collaborators and callers.

pub mod action;
pub mod event;
pub mod outcome;
pub mod phase;
pub mod request;

pub use action::{AgentDecision, PlayerAction};
pub use event::{NarrativePhase, TurnEvent};
pub use outcome::{AgentStateUpdate, NarrativeResult, NewAgent};
pub use phase::TurnPhase;
pub use request::TurnRequest;
