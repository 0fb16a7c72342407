//! Process-wide wiring: paths, configuration, and the services built from them.

use anyhow::{Context, Result};
use saga_application::{PersistenceQueue, SimulationSession, TurnOrchestrator};
use saga_core::config::{RootConfig, SecretConfig};
use saga_core::generation::GenerationProvider;
use saga_core::scoring::AgentScorer;
use saga_core::session::SnapshotStore;
use saga_infrastructure::storage::TTL_ENV;
use saga_infrastructure::{
    ConfigStorage, FileSnapshotStore, InMemorySnapshotStore, SagaPaths, SecretStorage,
};
use saga_interaction::{
    ActionSuggester, AutopilotAdvisor, ClaudeApiProvider, GameAnalyst, GoalScorer,
    ProviderAgentScorer, WorldSeeder,
};
use std::sync::Arc;

use crate::repl::Advisors;

const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

pub struct AppContext {
    pub paths: SagaPaths,
    pub config: RootConfig,
    pub secrets: SecretConfig,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let paths = SagaPaths::resolve().context("Failed to resolve saga directories")?;
        paths.ensure_dirs().context("Failed to create saga directories")?;

        let ttl_override = std::env::var(TTL_ENV).ok();
        let config = ConfigStorage::new(paths.config_file())
            .load_effective(ttl_override.as_deref())
            .context("Failed to load config.toml")?;
        let secrets = SecretStorage::new(paths.secret_file())
            .load_or_default()
            .context("Failed to load secret.json")?;

        Ok(Self {
            paths,
            config,
            secrets,
        })
    }

    pub fn provider(&self) -> Result<Arc<dyn GenerationProvider>> {
        let provider = ClaudeApiProvider::from_config(
            &self.secrets,
            &self.config.generation,
            std::env::var(API_KEY_ENV).ok(),
        )
        .with_context(|| {
            format!(
                "No Anthropic API key: set {} or fill in {}",
                API_KEY_ENV,
                self.paths.secret_file().display()
            )
        })?;
        Ok(Arc::new(provider))
    }

    pub fn file_store(&self) -> Result<FileSnapshotStore> {
        FileSnapshotStore::new(self.paths.games_dir(), self.config.storage.retention())
            .context("Failed to open games directory")
    }

    pub fn store(&self, ephemeral: bool) -> Result<Arc<dyn SnapshotStore>> {
        if ephemeral {
            return Ok(Arc::new(InMemorySnapshotStore::new(
                self.config.storage.retention(),
            )));
        }
        Ok(Arc::new(self.file_store()?))
    }

    pub fn seeder(&self, provider: Arc<dyn GenerationProvider>) -> WorldSeeder {
        WorldSeeder::new(provider, &self.config.simulation, &self.config.generation)
    }

    pub fn orchestrator(&self, provider: Arc<dyn GenerationProvider>) -> Arc<TurnOrchestrator> {
        Arc::new(TurnOrchestrator::new(provider, &self.config))
    }

    /// Suggestion and analysis services the REPL calls directly.
    pub fn advisors(&self, provider: Arc<dyn GenerationProvider>) -> Advisors {
        Advisors {
            suggester: ActionSuggester::new(Arc::clone(&provider), &self.config.generation),
            analyst: GameAnalyst::new(provider, &self.config.generation),
        }
    }

    /// Attaches scoring, autopilot and background saving to a freshly built session.
    pub fn equip(
        &self,
        session: SimulationSession,
        provider: Arc<dyn GenerationProvider>,
        store: Arc<dyn SnapshotStore>,
    ) -> SimulationSession {
        let generation = &self.config.generation;
        let scorer: Arc<dyn AgentScorer> =
            Arc::new(ProviderAgentScorer::new(Arc::clone(&provider), generation));
        session
            .with_scorer(scorer)
            .with_goal_scorer(Arc::new(GoalScorer::new(Arc::clone(&provider), generation)))
            .with_autopilot(Arc::new(AutopilotAdvisor::new(provider, generation)))
            .with_persistence(PersistenceQueue::spawn(store))
    }
}
