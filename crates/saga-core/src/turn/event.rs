//! Events streamed to a caller while a turn runs.

use crate::error::Result;
use crate::world::WorldState;
use serde::{Deserialize, Serialize};

/// Only one phase is announced on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativePhase {
    Narrating,
}

/// One record on a turn's event channel.
///
/// Ordering guarantees: `AgentUpdate`s arrive in completion order and all of
/// them precede `Phase`. `Phase` is sent once, ahead of any narrative text,
/// and `ImageReady` at most once. The stream ends with exactly one `Done` or
/// `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TurnEvent {
    AgentUpdate { agent_id: String, action: String },
    Phase { phase: NarrativePhase },
    Headline { content: String },
    Narration { content: String },
    ImageReady { headline: String, narration: String },
    Done { state: WorldState },
    Error { message: String },
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Encodes the event as one `data: {json}` record followed by a blank line.
    pub fn to_line(&self) -> Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}
