use anyhow::Result;
use colored::Colorize;
use saga_core::session::SnapshotStore;

use crate::context::AppContext;

pub async fn run(ctx: &AppContext, limit: Option<usize>) -> Result<()> {
    let store = ctx.file_store()?;
    let limit = limit.unwrap_or(ctx.config.storage.recent_limit);
    let games = store.list_recent(limit).await?;

    if games.is_empty() {
        println!("{}", "No saved games.".bright_black());
        return Ok(());
    }

    for game in games {
        let label = game.name.as_deref().unwrap_or(game.scenario_name.as_str());
        println!(
            "{}  {}  {}  {}",
            game.id.bright_cyan(),
            format!("turn {:>3}", game.turn).bright_black(),
            game.updated_at.format("%Y-%m-%d %H:%M").to_string().bright_black(),
            label
        );
    }
    Ok(())
}
