//! Error types for the Saga simulation engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Saga workspace.
///
/// The first five variants form the failure taxonomy callers reason about
/// (validation, configuration, upstream generation, persistence and
/// isolated agent failures). The remaining variants are plumbing.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SagaError {
    /// Missing or malformed caller input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing credential or unusable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A provider call failed outright.
    #[error("Upstream generation error: {0}")]
    UpstreamGeneration(String),

    /// The synthesis stream finished without a usable structured result.
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Snapshot load/save failure.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A single agent's decision request failed.
    #[error("Agent '{agent_id}' failed: {message}")]
    PartialAgentFailure { agent_id: String, message: String },

    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Illegal turn state machine transition
    #[error("Invalid turn transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SagaError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates an UpstreamGeneration error
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamGeneration(message.into())
    }

    /// Creates a SynthesisFailed error
    pub fn synthesis_failed(message: impl Into<String>) -> Self {
        Self::SynthesisFailed(message.into())
    }

    /// Creates a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Creates a PartialAgentFailure error
    pub fn agent_failure(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PartialAgentFailure {
            agent_id: agent_id.into(),
            message: message.into(),
        }
    }

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a Validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a Configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if the provider side failed, including an empty synthesis result.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::UpstreamGeneration(_) | Self::SynthesisFailed(_))
    }

    /// Check if this is a Persistence error
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a turn that hit this error must be discarded.
    ///
    /// Isolated agent failures and persistence failures are absorbed; every
    /// other kind ends the turn in `Failed`.
    pub fn is_fatal_to_turn(&self) -> bool {
        !matches!(
            self,
            Self::PartialAgentFailure { .. } | Self::Persistence(_)
        )
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SagaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SagaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SagaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SagaError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (used at the binary boundary)
impl From<anyhow::Error> for SagaError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Conversion from String (for error messages)
impl From<String> for SagaError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, SagaError>`.
pub type Result<T> = std::result::Result<T, SagaError>;
