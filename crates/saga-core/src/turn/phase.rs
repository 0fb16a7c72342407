use crate::error::{Result, SagaError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single turn.
///
/// ```text
/// Idle -> CollectingActions -> Synthesizing -> Applying -> Complete
///   \__________________\_______________\___________\-> Failed
/// ```
///
/// `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    CollectingActions,
    Synthesizing,
    Applying,
    Complete,
    Failed,
}

impl TurnPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Returns true if `next` directly follows `self`.
    pub fn can_transition_to(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        match (self, next) {
            (Idle, CollectingActions)
            | (CollectingActions, Synthesizing)
            | (Synthesizing, Applying)
            | (Applying, Complete) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::InvalidTransition` when `next` does not directly
    /// follow `self`.
    pub fn transition(self, next: TurnPhase) -> Result<TurnPhase> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SagaError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::CollectingActions => "collecting_actions",
            Self::Synthesizing => "synthesizing",
            Self::Applying => "applying",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
