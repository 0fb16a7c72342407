//! Terminal rendering of a turn's event stream.

use anyhow::Result;
use colored::Colorize;
use saga_core::turn::TurnEvent;
use saga_core::world::WorldState;
use std::collections::HashMap;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenField {
    Headline,
    Narration,
}

/// Prints events as they arrive.
///
/// Headline and narration events carry the whole text so far; only the part
/// not yet on screen is printed.
pub struct EventRenderer {
    raw: bool,
    names: HashMap<String, String>,
    headline: String,
    narration: String,
    open: Option<OpenField>,
}

impl EventRenderer {
    pub fn new(world: &WorldState, raw: bool) -> Self {
        Self {
            raw,
            names: world
                .agents
                .iter()
                .map(|agent| (agent.id.clone(), agent.name.clone()))
                .collect(),
            headline: String::new(),
            narration: String::new(),
            open: None,
        }
    }

    pub fn render(&mut self, event: &TurnEvent) -> Result<()> {
        if self.raw {
            print!("{}", event.to_line()?);
            std::io::stdout().flush()?;
            return Ok(());
        }

        match event {
            TurnEvent::AgentUpdate { agent_id, action } => {
                let name = self.names.get(agent_id).map_or(agent_id.as_str(), String::as_str);
                println!("{} {}", format!("[{}]", name).bright_magenta(), action.bright_blue());
            }
            TurnEvent::Phase { .. } => {
                println!();
                println!("{}", "~ narrating ~".bright_black().italic());
            }
            TurnEvent::Headline { content } => {
                self.switch_to(OpenField::Headline);
                print!("{}", unseen(&self.headline, content).bold().bright_yellow());
                self.headline = content.clone();
            }
            TurnEvent::Narration { content } => {
                self.switch_to(OpenField::Narration);
                print!("{}", unseen(&self.narration, content));
                self.narration = content.clone();
            }
            TurnEvent::ImageReady { .. } => {
                self.close();
                println!("{}", "[image ready]".cyan());
            }
            TurnEvent::Done { state } => {
                self.close();
                println!("{}", format!("Turn {} complete.", state.turn).bright_green());
            }
            TurnEvent::Error { message } => {
                self.close();
                eprintln!("{}", format!("Turn failed: {}", message).red());
            }
        }
        std::io::stdout().flush()?;
        Ok(())
    }

    fn switch_to(&mut self, field: OpenField) {
        if self.open == Some(field) {
            return;
        }
        self.close();
        if field == OpenField::Headline && self.headline.is_empty() {
            print!("{} ", "Headline:".bright_black());
        }
        self.open = Some(field);
    }

    fn close(&mut self) {
        if self.open.take().is_some() {
            println!();
        }
    }
}

/// The part of `content` that extends what was already printed.
fn unseen<'a>(printed: &str, content: &'a str) -> &'a str {
    content.strip_prefix(printed).unwrap_or(content)
}
