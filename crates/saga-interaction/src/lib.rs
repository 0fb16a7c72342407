//! Language-model facing side of the simulation: the Claude provider,
//! prompt templates, streaming decode, and the per-turn generation steps.

pub mod advisor;
pub mod analyst;
pub mod claude_api_provider;
pub mod decoder;
pub mod fanout;
pub mod prompts;
pub mod scorer;
pub mod seeder;
pub mod sse;
pub mod synthesizer;

pub use advisor::{ActionSuggester, AutopilotAdvisor, AutopilotChoice, GoalScorer, Strategy, SuggestedAction};
pub use analyst::{FinalStanding, GameAnalysis, GameAnalyst, Grade, PlayerPerformance, TurningPoint};
pub use claude_api_provider::ClaudeApiProvider;
pub use decoder::{DecoderSchema, FieldUpdate, IncrementalDecoder};
pub use fanout::{ActionFanout, FanoutOutcome};
pub use scorer::ProviderAgentScorer;
pub use seeder::{PlayerBrief, SeedRequest, SeededWorld, WorldSeeder};
pub use synthesizer::{NarrativeSynthesizer, SynthesisProgress};
