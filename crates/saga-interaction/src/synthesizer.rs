//! Streaming narrative synthesis.

use crate::decoder::{DecoderSchema, FieldUpdate, IncrementalDecoder};
use crate::prompts::{
    ActionLine, NARRATIVE_TOOL, NarrativePrompt, PromptTemplate, SIMULATOR_SYSTEM,
    narrative_schema,
};
use futures::StreamExt;
use saga_core::config::{GenerationConfig, SimulationConfig};
use saga_core::generation::{GenerationProvider, StreamEvent, StructuredRequest};
use saga_core::turn::{AgentDecision, AgentStateUpdate, NarrativeResult, PlayerAction};
use saga_core::world::WorldState;
use saga_core::{Result, SagaError};
use std::sync::Arc;

const HEADLINE: &str = "headline";
const NARRATION: &str = "narration";
const STATE_UPDATES: &str = "agentStateUpdates";
/// Characters of narration carried by the ready signal.
const READY_EXCERPT_CHARS: usize = 200;
const NO_ACTION: &str = "takes no notable action";

/// Partial output observed while the narrative streams in.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisProgress {
    /// Whole headline decoded so far
    Headline(String),
    /// Whole narration decoded so far
    Narration(String),
    /// A complete state update element
    StateUpdate(AgentStateUpdate),
    /// Fired once when headline and narration carry enough content for
    /// downstream artifact generation to start.
    ReadyForArtifact { headline: String, narration: String },
}

/// Turns a settled action set into a narrative and state changes.
pub struct NarrativeSynthesizer {
    provider: Arc<dyn GenerationProvider>,
    image_ready_threshold: usize,
    max_tokens: u32,
}

impl NarrativeSynthesizer {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        simulation: &SimulationConfig,
        generation: &GenerationConfig,
    ) -> Self {
        Self {
            provider,
            image_ready_threshold: simulation.image_ready_threshold,
            max_tokens: generation.narrative_max_tokens,
        }
    }

    /// Runs one streaming synthesis request.
    ///
    /// `on_progress` sees monotonically growing headline and narration
    /// prefixes. The returned result is the provider's authoritative payload,
    /// not the streamed prefixes.
    ///
    /// # Errors
    ///
    /// `SynthesisFailed` when the stream ends without a usable structured
    /// result. Provider errors propagate unchanged.
    pub async fn synthesize<F>(
        &self,
        world: &WorldState,
        decisions: &[AgentDecision],
        player_action: Option<&PlayerAction>,
        mut on_progress: F,
    ) -> Result<NarrativeResult>
    where
        F: FnMut(SynthesisProgress),
    {
        let request = self.build_request(world, decisions, player_action)?;
        let mut stream = self.provider.stream_structured(request).await?;

        let mut decoder = IncrementalDecoder::new(
            DecoderSchema::new()
                .text_field(HEADLINE)
                .text_field(NARRATION)
                .text_field("updatedContext")
                .array_field(STATE_UPDATES),
        );
        let mut ready_sent = false;
        let mut completed = None;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Delta(delta) => {
                    for update in decoder.push(&delta) {
                        if let Some(progress) = to_progress(update) {
                            on_progress(progress);
                        }
                    }
                    if !ready_sent {
                        if let Some(ready) = self.ready_signal(&decoder) {
                            ready_sent = true;
                            on_progress(ready);
                        }
                    }
                }
                StreamEvent::Completed(value) => {
                    completed = Some(value);
                    break;
                }
            }
        }

        if decoder.is_poisoned() {
            tracing::debug!(
                "[NarrativeSynthesizer] partial decode stopped after {} bytes",
                decoder.raw().len()
            );
        }

        let value = completed
            .flatten()
            .ok_or_else(|| SagaError::synthesis_failed("provider returned no structured result"))?;
        let result: NarrativeResult = serde_json::from_value(value).map_err(|err| {
            SagaError::synthesis_failed(format!("structured result is unusable: {err}"))
        })?;

        tracing::debug!(
            "[NarrativeSynthesizer] synthesized \"{}\" with {} state updates",
            result.headline,
            result.agent_state_updates.len()
        );
        Ok(result)
    }

    fn ready_signal(&self, decoder: &IncrementalDecoder) -> Option<SynthesisProgress> {
        let headline = decoder.text(HEADLINE).filter(|h| !h.trim().is_empty())?;
        let narration = decoder.text(NARRATION)?;
        if narration.chars().count() <= self.image_ready_threshold {
            return None;
        }
        Some(SynthesisProgress::ReadyForArtifact {
            headline: headline.to_string(),
            narration: narration.chars().take(READY_EXCERPT_CHARS).collect(),
        })
    }

    fn build_request(
        &self,
        world: &WorldState,
        decisions: &[AgentDecision],
        player_action: Option<&PlayerAction>,
    ) -> Result<StructuredRequest> {
        let actions = world
            .agents
            .iter()
            .map(|agent| ActionLine {
                name: &agent.name,
                kind: &agent.kind,
                action: decisions
                    .iter()
                    .find(|decision| decision.agent_id == agent.id)
                    .map_or(NO_ACTION, |decision| decision.action.as_str()),
            })
            .collect();

        let player_agent = player_action
            .and_then(|declared| world.agent(&declared.agent_id))
            .map(|agent| agent.name.as_str());

        let prompt = NarrativePrompt {
            world_context: &world.context,
            actions,
            player_agent,
            player_action: player_action.map(|declared| declared.action_text.as_str()),
        }
        .render()?;

        Ok(StructuredRequest {
            system: SIMULATOR_SYSTEM.to_string(),
            prompt,
            tool_name: NARRATIVE_TOOL.to_string(),
            tool_description: "Narrate the outcome of this turn".to_string(),
            schema: narrative_schema(),
            max_tokens: self.max_tokens,
        })
    }
}

fn to_progress(update: FieldUpdate) -> Option<SynthesisProgress> {
    match update {
        FieldUpdate::Text { field, value } if field == HEADLINE => {
            Some(SynthesisProgress::Headline(value))
        }
        FieldUpdate::Text { field, value } if field == NARRATION => {
            Some(SynthesisProgress::Narration(value))
        }
        FieldUpdate::Text { .. } => None,
        FieldUpdate::Element { field, index, value } if field == STATE_UPDATES => {
            match serde_json::from_value::<AgentStateUpdate>(value) {
                Ok(update) => Some(SynthesisProgress::StateUpdate(update)),
                Err(err) => {
                    tracing::debug!(
                        "[NarrativeSynthesizer] skipping malformed state update #{}: {}",
                        index,
                        err
                    );
                    None
                }
            }
        }
        FieldUpdate::Element { .. } => None,
    }
}
