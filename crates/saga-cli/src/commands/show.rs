use anyhow::{Context, Result};
use colored::Colorize;
use saga_core::session::SnapshotStore;

use crate::context::AppContext;

/// Prints every stored turn of a game, oldest first.
pub async fn run(ctx: &AppContext, game_id: &str) -> Result<()> {
    let store = ctx.file_store()?;
    let record = store
        .load(game_id)
        .await?
        .with_context(|| format!("Game {} not found or expired", game_id))?;

    println!("{}", record.scenario_name.bright_magenta().bold());
    if let Some(player) = &record.player {
        let name = player.name.as_deref().unwrap_or(player.agent_id.as_str());
        println!("{}", format!("Player: {}", name).green());
    }

    for snapshot in &record.turns {
        println!();
        println!(
            "{} {}",
            format!("Turn {}:", snapshot.turn).bright_black(),
            snapshot.headline.bold().bright_yellow()
        );
        if !snapshot.narration.is_empty() {
            println!("{}", snapshot.narration);
        }
        for action in &snapshot.agent_actions {
            let name = snapshot
                .agents
                .iter()
                .find(|agent| agent.id == action.agent_id)
                .map_or(action.agent_id.as_str(), |agent| agent.name.as_str());
            println!("  {} {}", format!("[{}]", name).bright_magenta(), action.action);
        }
    }
    Ok(())
}
