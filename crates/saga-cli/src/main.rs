use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod context;
mod logging;
mod render;
mod repl;

use context::AppContext;

#[derive(Parser)]
#[command(name = "saga")]
#[command(about = "SAGA - Streamed Agent Gameplay Architecture", long_about = None)]
struct Cli {
    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print turn events as raw `data:` records
    #[arg(long, global = true)]
    raw_events: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed a new world from a scenario and start playing
    New {
        /// Free-text scenario description
        scenario: String,

        #[arg(long)]
        player_name: Option<String>,

        #[arg(long)]
        player_role: Option<String>,

        #[arg(long)]
        goal: Option<String>,

        /// Keep the game in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Continue a saved game at its latest turn
    Resume { game_id: String },
    /// List recent games
    Games {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print the stored timeline of a game
    Show { game_id: String },
    /// Print resolved paths and configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = AppContext::load()?;
    let _guard = logging::init(&ctx.paths.logs_dir(), cli.verbose)?;

    match cli.command {
        Commands::New {
            scenario,
            player_name,
            player_role,
            goal,
            ephemeral,
        } => {
            let options = commands::new::NewGameOptions {
                scenario,
                player_name,
                player_role,
                goal,
                ephemeral,
            };
            commands::new::run(&ctx, options, cli.raw_events).await?
        }
        Commands::Resume { game_id } => commands::resume::run(&ctx, &game_id, cli.raw_events).await?,
        Commands::Games { limit } => commands::games::run(&ctx, limit).await?,
        Commands::Show { game_id } => commands::show::run(&ctx, &game_id).await?,
        Commands::Config => commands::config::run(&ctx)?,
    }

    Ok(())
}
