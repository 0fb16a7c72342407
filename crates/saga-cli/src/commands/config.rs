use anyhow::{Context, Result};
use colored::Colorize;

use crate::context::AppContext;

pub fn run(ctx: &AppContext) -> Result<()> {
    println!("{}", "Paths".bold());
    println!("  config   {}", ctx.paths.config_file().display());
    println!("  secrets  {}", ctx.paths.secret_file().display());
    println!("  games    {}", ctx.paths.games_dir().display());
    println!("  logs     {}", ctx.paths.logs_dir().display());

    let key_state = match &ctx.secrets.anthropic {
        Some(anthropic) if !anthropic.api_key.trim().is_empty() => "configured".green(),
        _ => "not configured".yellow(),
    };
    println!("  api key  {}", key_state);
    println!();

    println!("{}", "Effective configuration".bold());
    let rendered =
        toml::to_string_pretty(&ctx.config).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
