use anyhow::{Context, Result};
use colored::Colorize;
use saga_application::{SessionMetadata, SimulationSession};
use saga_interaction::{PlayerBrief, SeedRequest};
use std::sync::Arc;

use crate::context::AppContext;
use crate::repl;

pub struct NewGameOptions {
    pub scenario: String,
    pub player_name: Option<String>,
    pub player_role: Option<String>,
    pub goal: Option<String>,
    pub ephemeral: bool,
}

impl NewGameOptions {
    fn seed_request(&self) -> SeedRequest {
        let request = SeedRequest::new(self.scenario.clone());
        match &self.player_name {
            Some(name) => request.with_player(PlayerBrief {
                name: name.clone(),
                role: self.player_role.clone(),
                goal: self.goal.clone().unwrap_or_default(),
            }),
            None => request,
        }
    }
}

/// Seeds a world for the scenario and opens the REPL on its first turn.
pub async fn run(ctx: &AppContext, options: NewGameOptions, raw_events: bool) -> Result<()> {
    if options.player_name.is_none() && (options.player_role.is_some() || options.goal.is_some()) {
        println!(
            "{}",
            "--player-role and --goal need --player-name; playing without a player agent."
                .yellow()
        );
    }

    let provider = ctx.provider()?;
    println!("{}", "Seeding the world...".bright_black());
    let seeded = ctx
        .seeder(Arc::clone(&provider))
        .seed(&options.seed_request())
        .await
        .context("Failed to seed the world")?;

    let mut metadata = SessionMetadata::new(options.scenario.trim());
    if let Some(player) = seeded.player {
        metadata = metadata.with_player(player);
    }

    let store = ctx.store(options.ephemeral)?;
    let session = SimulationSession::start(
        metadata,
        seeded.world,
        ctx.orchestrator(Arc::clone(&provider)),
    )?;
    let advisors = ctx.advisors(Arc::clone(&provider));
    let session = ctx.equip(session, provider, store);

    if let Some(queue) = session.persistence() {
        queue.submit(session.to_record()?);
    }
    if !options.ephemeral {
        println!(
            "{}",
            format!("Game id: {} (resume with `saga resume <id>`)", session.metadata().id)
                .bright_black()
        );
    }

    repl::run(session, advisors, raw_events).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(player_name: Option<&str>) -> NewGameOptions {
        NewGameOptions {
            scenario: "A port city on the eve of a trade war".into(),
            player_name: player_name.map(str::to_string),
            player_role: Some("harbour master".into()),
            goal: Some("keep the port open".into()),
            ephemeral: true,
        }
    }

    #[test]
    fn test_seed_request_carries_the_player_brief() {
        let request = options(Some("Mira")).seed_request();
        let player = request.player.unwrap();
        assert_eq!(player.name, "Mira");
        assert_eq!(player.role.as_deref(), Some("harbour master"));
        assert_eq!(player.goal, "keep the port open");
    }

    #[test]
    fn test_seed_request_without_player_name() {
        let request = options(None).seed_request();
        assert!(request.player.is_none());
        assert_eq!(request.scenario, "A port city on the eve of a trade war");
    }
}
