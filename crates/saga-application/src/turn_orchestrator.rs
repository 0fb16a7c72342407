//! One logical turn: fanout, barrier, synthesis, application.

use saga_core::config::RootConfig;
use saga_core::generation::GenerationProvider;
use saga_core::turn::{
    AgentDecision, NarrativePhase, NarrativeResult, PlayerAction, TurnEvent, TurnPhase, TurnRequest,
};
use saga_core::world::{WorldState, apply_turn};
use saga_core::{Result, SagaError};
use saga_interaction::{ActionFanout, NarrativeSynthesizer, SynthesisProgress};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Everything a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The new world; the input world is never modified
    pub world: WorldState,
    /// Every decision that reached synthesis
    pub decisions: Vec<AgentDecision>,
    /// Decisions that were written into action histories
    pub applied_actions: Vec<AgentDecision>,
    pub narrative: NarrativeResult,
    /// Agents whose decision request failed and were left out
    pub failed_agents: Vec<String>,
}

/// Optional event channel. A dropped receiver is not an error.
struct EventSink<'a>(Option<&'a UnboundedSender<TurnEvent>>);

impl EventSink<'_> {
    fn send(&self, event: TurnEvent) {
        if let Some(tx) = self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Composes [`ActionFanout`] and [`NarrativeSynthesizer`] into a turn.
///
/// Holds no per-session state, so one instance can serve any number of
/// sessions. Turns of the same session must not overlap; the session layer
/// enforces that by taking `&mut self` for a turn.
pub struct TurnOrchestrator {
    fanout: ActionFanout,
    synthesizer: NarrativeSynthesizer,
}

impl TurnOrchestrator {
    pub fn new(provider: Arc<dyn GenerationProvider>, config: &RootConfig) -> Self {
        Self {
            fanout: ActionFanout::new(Arc::clone(&provider), &config.simulation, &config.generation),
            synthesizer: NarrativeSynthesizer::new(provider, &config.simulation, &config.generation),
        }
    }

    /// Runs a turn and streams its progress.
    ///
    /// Events arrive in this order: every `AgentUpdate`, one `Phase`, the
    /// growing `Headline`/`Narration` prefixes with at most one `ImageReady`
    /// among them, then exactly one `Done` or `Error`.
    ///
    /// # Arguments
    ///
    /// * `world` - World before the turn; left untouched
    /// * `player_action` - Action declared for one agent, if any
    /// * `events` - Receives the turn's events
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, otherwise whatever ended the turn in
    /// `Failed`. Isolated agent failures never fail the turn.
    pub async fn run_turn(
        &self,
        world: &WorldState,
        player_action: Option<&PlayerAction>,
        events: &UnboundedSender<TurnEvent>,
    ) -> Result<TurnReport> {
        let sink = EventSink(Some(events));
        let result = match validate_inputs(world, player_action) {
            Ok(()) => self.drive(world, player_action, None, &sink).await,
            Err(err) => Err(err),
        };

        match &result {
            Ok(report) => sink.send(TurnEvent::Done {
                state: report.world.clone(),
            }),
            Err(err) => sink.send(TurnEvent::Error {
                message: err.to_string(),
            }),
        }
        result
    }

    /// Runs a turn without streaming.
    ///
    /// When the request carries `agent_actions`, they replace the decision
    /// fanout and are narrated as given.
    pub async fn execute(&self, request: TurnRequest) -> Result<TurnReport> {
        request.validate()?;
        let sink = EventSink(None);
        self.drive(
            &request.current_world_state,
            request.player_action.as_ref(),
            request.agent_actions,
            &sink,
        )
        .await
    }

    async fn drive(
        &self,
        world: &WorldState,
        player_action: Option<&PlayerAction>,
        supplied: Option<Vec<AgentDecision>>,
        sink: &EventSink<'_>,
    ) -> Result<TurnReport> {
        let mut phase = TurnPhase::Idle;
        let result = self
            .drive_phases(world, player_action, supplied, sink, &mut phase)
            .await;
        if let Err(err) = &result {
            tracing::warn!(
                "[TurnOrchestrator] turn {} failed while {}: {}",
                world.turn + 1,
                phase,
                err
            );
            phase = phase.transition(TurnPhase::Failed)?;
            tracing::debug!("[TurnOrchestrator] phase -> {}", phase);
        }
        result
    }

    async fn drive_phases(
        &self,
        world: &WorldState,
        player_action: Option<&PlayerAction>,
        supplied: Option<Vec<AgentDecision>>,
        sink: &EventSink<'_>,
        phase: &mut TurnPhase,
    ) -> Result<TurnReport> {
        advance(phase, TurnPhase::CollectingActions)?;
        let (decisions, failed_agents) = match supplied {
            Some(decisions) => (decisions, Vec::new()),
            None => {
                let outcome = self
                    .fanout
                    .collect(world, player_action, |decision| {
                        sink.send(TurnEvent::AgentUpdate {
                            agent_id: decision.agent_id.clone(),
                            action: decision.action.clone(),
                        })
                    })
                    .await?;
                let failed = outcome
                    .failures
                    .iter()
                    .filter_map(|failure| match failure {
                        SagaError::PartialAgentFailure { agent_id, .. } => Some(agent_id.clone()),
                        _ => None,
                    })
                    .collect();
                (outcome.decisions, failed)
            }
        };

        // Every fanout request has settled at this point.
        advance(phase, TurnPhase::Synthesizing)?;
        let mut narrating = false;
        let announce = |narrating: &mut bool| {
            if !*narrating {
                *narrating = true;
                sink.send(TurnEvent::Phase {
                    phase: NarrativePhase::Narrating,
                });
            }
        };
        let narrative = self
            .synthesizer
            .synthesize(world, &decisions, player_action, |progress| match progress {
                SynthesisProgress::Headline(content) => {
                    announce(&mut narrating);
                    sink.send(TurnEvent::Headline { content });
                }
                SynthesisProgress::Narration(content) => {
                    announce(&mut narrating);
                    sink.send(TurnEvent::Narration { content });
                }
                SynthesisProgress::ReadyForArtifact { headline, narration } => {
                    sink.send(TurnEvent::ImageReady { headline, narration });
                }
                SynthesisProgress::StateUpdate(_) => {}
            })
            .await?;
        announce(&mut narrating);

        advance(phase, TurnPhase::Applying)?;
        let application = apply_turn(world, &decisions, &narrative);
        if !application.ignored_update_ids.is_empty() {
            tracing::warn!(
                "[TurnOrchestrator] ignored state updates for unknown agents: {:?}",
                application.ignored_update_ids
            );
        }

        advance(phase, TurnPhase::Complete)?;
        tracing::info!(
            "[TurnOrchestrator] turn {} complete: \"{}\" ({} actions, {} failed agents)",
            application.world.turn,
            narrative.headline,
            decisions.len(),
            failed_agents.len()
        );

        Ok(TurnReport {
            world: application.world,
            decisions,
            applied_actions: application.applied_actions,
            narrative,
            failed_agents,
        })
    }
}

fn advance(phase: &mut TurnPhase, next: TurnPhase) -> Result<()> {
    *phase = phase.transition(next)?;
    tracing::debug!("[TurnOrchestrator] phase -> {}", phase);
    Ok(())
}

fn validate_inputs(world: &WorldState, player_action: Option<&PlayerAction>) -> Result<()> {
    world.validate()?;
    if let Some(declared) = player_action {
        declared.validate()?;
        if !world.contains_agent(&declared.agent_id) {
            return Err(SagaError::validation(format!(
                "player action targets unknown agent '{}'",
                declared.agent_id
            )));
        }
    }
    Ok(())
}
