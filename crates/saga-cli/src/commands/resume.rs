use anyhow::{Context, Result};
use colored::Colorize;
use saga_application::SimulationSession;
use saga_core::session::SnapshotStore;
use std::sync::Arc;

use crate::context::AppContext;
use crate::repl;

/// Reopens a stored game at its latest turn.
pub async fn run(ctx: &AppContext, game_id: &str, raw_events: bool) -> Result<()> {
    let store = ctx.file_store()?;
    let record = store
        .load(game_id)
        .await?
        .with_context(|| format!("Game {} not found or expired", game_id))?;
    println!(
        "{}",
        format!("Resuming {} at turn {}.", record.id, record.state.turn).bright_black()
    );

    let provider = ctx.provider()?;
    let mut session = SimulationSession::from_record(record, ctx.orchestrator(Arc::clone(&provider)))
        .context("Stored game is inconsistent")?;
    session.go_to_latest();

    let store: Arc<dyn SnapshotStore> = Arc::new(store);
    let advisors = ctx.advisors(Arc::clone(&provider));
    let session = ctx.equip(session, provider, store);
    repl::run(session, advisors, raw_events).await
}
