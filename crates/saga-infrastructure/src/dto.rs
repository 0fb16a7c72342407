//! On-disk schema for saved games.
//!
//! ## Schema Versioning (Semantic Versioning)
//!
//! - **MAJOR (X.0.0)**: Breaking changes; older readers refuse the file
//! - **MINOR (1.X.0)**: Backward-compatible additions (new optional fields)
//!
//! ### GameRecord Version History
//! - **0.0.0**: Files without `schema_version`. May lack the `turns` chain;
//!   the store rebuilds it from the embedded history on load.
//! - **1.0.0**: `schema_version` plus the full snapshot chain.

use saga_core::session::GameRecord;
use saga_core::{Result, SagaError};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Current schema version for saved games.
pub const GAME_RECORD_VERSION: &str = "1.0.0";

fn legacy_version() -> String {
    "0.0.0".to_string()
}

/// A `GameRecord` tagged with the schema it was written with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRecordDto {
    #[serde(default = "legacy_version")]
    pub schema_version: String,
    #[serde(flatten)]
    pub record: GameRecord,
}

impl GameRecordDto {
    pub fn from_domain(record: GameRecord) -> Self {
        Self {
            schema_version: GAME_RECORD_VERSION.to_string(),
            record,
        }
    }

    /// Checks the version and returns the record.
    ///
    /// # Errors
    ///
    /// `SagaError::Persistence` for an unparsable version or one written by
    /// a newer major schema.
    pub fn into_domain(self) -> Result<GameRecord> {
        let stored = Version::parse(&self.schema_version).map_err(|e| {
            SagaError::persistence(format!("Invalid schema_version '{}': {}", self.schema_version, e))
        })?;
        let current = Version::parse(GAME_RECORD_VERSION)
            .map_err(|e| SagaError::internal(format!("Invalid GAME_RECORD_VERSION: {}", e)))?;
        if stored.major > current.major {
            return Err(SagaError::persistence(format!(
                "Game {} was saved with schema {} (newer than supported {})",
                self.record.id, stored, current
            )));
        }
        Ok(self.record)
    }
}
