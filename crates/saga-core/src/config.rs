//! Configuration model.
//!
//! `RootConfig` is what `config.toml` deserializes into. Every section and
//! field has a default, so a missing or partial file is valid.

use serde::{Deserialize, Serialize};

/// Model used when neither config nor secrets name one.
pub const DEFAULT_MODEL: &str = "claude-haiku-4-5";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RootConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of recent headlines shown to each deciding agent
    pub history_window: usize,
    /// Narration length (in characters) after which `image_ready` fires
    pub image_ready_threshold: usize,
    pub min_seed_agents: usize,
    pub max_seed_agents: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            history_window: 3,
            image_ready_threshold: 100,
            min_seed_agents: 8,
            max_seed_agents: 15,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub decision_max_tokens: u32,
    pub narrative_max_tokens: u32,
    pub scoring_max_tokens: u32,
    pub seed_max_tokens: u32,
    /// Goal scoring, autopilot and action suggestions
    pub advisor_max_tokens: u32,
    pub analysis_max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            decision_max_tokens: 500,
            narrative_max_tokens: 4096,
            scoring_max_tokens: 1024,
            seed_max_tokens: 4096,
            advisor_max_tokens: 1000,
            analysis_max_tokens: 4096,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Days a saved game survives after its last update
    pub retention_days: u32,
    /// Default number of games listed by `games`
    pub recent_limit: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            recent_limit: 12,
        }
    }
}

impl StorageConfig {
    /// Applies a `SAGA_GAME_TTL_DAYS`-style override. Values that are not
    /// positive integers leave the configured retention in place.
    pub fn with_retention_override(mut self, raw: Option<&str>) -> Self {
        if let Some(days) = raw
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|days| *days > 0)
        {
            self.retention_days = days;
        }
        self
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }
}

/// Contents of `secret.json`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SecretConfig {
    #[serde(default)]
    pub anthropic: Option<AnthropicConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default)]
    pub model_name: Option<String>,
}
