use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::mpsc;

use saga_application::{SaveStatus, SimulationSession, TurnInput};
use saga_core::session::{NodeId, SessionNode};
use saga_interaction::{ActionSuggester, GameAnalysis, GameAnalyst, Strategy};

use crate::render::EventRenderer;

const COMMANDS: [&str; 13] = [
    "/next",
    "/auto",
    "/suggest",
    "/goal",
    "/analyze",
    "/path",
    "/siblings",
    "/goto",
    "/latest",
    "/scores",
    "/agents",
    "/help",
    "/quit",
];

/// rustyline helper providing slash-command completion, hints and colouring.
#[derive(Clone)]
struct ReplHelper {
    commands: Vec<String>,
}

impl ReplHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|cmd| cmd.to_string()).collect(),
        }
    }
}

impl Helper for ReplHelper {}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for ReplHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else if line.starts_with('@') {
            Owned(line.bright_magenta().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for ReplHelper {}

/// Player advisory services not held by the session.
pub struct Advisors {
    pub suggester: ActionSuggester,
    pub analyst: GameAnalyst,
}

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Declared action; `agent_id` is `None` for the player's own agent
    Act {
        agent_id: Option<String>,
        text: String,
    },
    Next,
    /// Let the autopilot choose the player's action and play it
    Auto,
    Suggest,
    Goal,
    Analyze,
    Path,
    Siblings,
    Goto(String),
    Latest,
    Scores,
    Agents,
    Help,
    Quit,
    Invalid(String),
}

impl ReplCommand {
    /// Parses a trimmed input line. Blank input yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(rest) = line.strip_prefix('@') {
            let (agent_id, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let text = text.trim();
            if agent_id.is_empty() || text.is_empty() {
                return Some(Self::Invalid("usage: @<agent-id> <action>".into()));
            }
            return Some(Self::Act {
                agent_id: Some(agent_id.to_string()),
                text: text.to_string(),
            });
        }

        if !line.starts_with('/') {
            return Some(Self::Act {
                agent_id: None,
                text: line.to_string(),
            });
        }

        let (command, arg) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let arg = arg.trim();
        let parsed = match command {
            "/next" => Self::Next,
            "/auto" => Self::Auto,
            "/suggest" => Self::Suggest,
            "/goal" => Self::Goal,
            "/analyze" => Self::Analyze,
            "/path" => Self::Path,
            "/siblings" => Self::Siblings,
            "/goto" if arg.is_empty() => Self::Invalid("usage: /goto <node-id>".into()),
            "/goto" => Self::Goto(arg.to_string()),
            "/latest" => Self::Latest,
            "/scores" => Self::Scores,
            "/agents" => Self::Agents,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            other => Self::Invalid(format!("unknown command {}", other)),
        };
        Some(parsed)
    }
}

/// Drives `session` from the terminal until the user quits.
pub async fn run(
    mut session: SimulationSession,
    advisors: Advisors,
    raw_events: bool,
) -> Result<()> {
    let mut rl = Editor::new()?;
    rl.set_helper(Some(ReplHelper::new()));

    println!("{}", "=== SAGA ===".bright_magenta().bold());
    println!("{}", session.metadata().scenario_name.bright_white());
    if let Some(player) = &session.metadata().player {
        let name = player.name.as_deref().unwrap_or(player.agent_id.as_str());
        println!("{}", format!("You are playing {}.", name).green());
        println!("{}", format!("Goal: {}", player.goal_or_default()).bright_black());
    }
    println!(
        "{}",
        "Type an action to play it, '/next' to let the world move, or '/help'.".bright_black()
    );
    println!();
    if let Ok(node) = session.current() {
        print_node(node);
    }

    loop {
        let turn = session.world().map(|world| world.turn).unwrap_or_default();
        let readline = rl.readline(&format!("turn {}> ", turn));

        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type '/quit' to exit.".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        let Some(command) = ReplCommand::parse(&line) else {
            continue;
        };
        let _ = rl.add_history_entry(line.trim());

        match command {
            ReplCommand::Act { agent_id, text } => {
                let target = agent_id.or_else(|| {
                    session
                        .metadata()
                        .player
                        .as_ref()
                        .map(|player| player.agent_id.clone())
                });
                match target {
                    Some(agent_id) => {
                        play(&mut session, TurnInput::declared(agent_id, text), raw_events).await?
                    }
                    None => println!(
                        "{}",
                        "No player agent in this game; use @<agent-id> <action>.".yellow()
                    ),
                }
            }
            ReplCommand::Next => play(&mut session, TurnInput::free(), raw_events).await?,
            ReplCommand::Auto => match session.autopilot_input().await {
                Ok((input, reasoning)) => {
                    if let Some(action) = &input.player_action {
                        println!("{} {}", "Autopilot:".bright_cyan(), action.action_text);
                    }
                    if !reasoning.is_empty() {
                        println!("{}", reasoning.bright_black().italic());
                    }
                    play(&mut session, input, raw_events).await?
                }
                Err(err) => println!("{}", format!("Autopilot unavailable: {}", err).yellow()),
            },
            ReplCommand::Suggest => show_suggestions(&session, &advisors.suggester).await?,
            ReplCommand::Goal => show_goal(&mut session).await,
            ReplCommand::Analyze => show_analysis(&session, &advisors.analyst).await?,
            ReplCommand::Path => show_path(&session)?,
            ReplCommand::Siblings => show_siblings(&session),
            ReplCommand::Goto(id) => match session.navigate(&NodeId::from(id.as_str())) {
                Ok(()) => print_node(session.current()?),
                Err(err) => println!("{}", err.to_string().red()),
            },
            ReplCommand::Latest => {
                session.go_to_latest();
                print_node(session.current()?);
            }
            ReplCommand::Scores => show_scores(&mut session).await?,
            ReplCommand::Agents => show_agents(&session)?,
            ReplCommand::Help => print_help(),
            ReplCommand::Quit => break,
            ReplCommand::Invalid(message) => println!("{}", message.yellow()),
        }
    }

    if let Some(queue) = session.persistence() {
        queue.flush().await;
        if let SaveStatus::Unsaved { reason } = queue.status() {
            eprintln!("{}", format!("Last save failed: {}", reason).red());
        }
    }
    println!("{}", format!("Game {} closed.", session.metadata().id).bright_green());
    Ok(())
}

async fn play(session: &mut SimulationSession, input: TurnInput, raw_events: bool) -> Result<()> {
    let mut renderer = EventRenderer::new(session.world()?, raw_events);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let turn = async {
        let result = session.play_turn(input, &tx).await;
        drop(tx);
        result
    };
    let show = async {
        while let Some(event) = rx.recv().await {
            if let Err(err) = renderer.render(&event) {
                tracing::warn!("[Repl] failed to render event: {}", err);
            }
        }
    };
    let (result, ()) = tokio::join!(turn, show);

    match result {
        Ok(id) => {
            tracing::info!("[Repl] turn committed as node {}", id);
            if let Some(SaveStatus::Unsaved { reason }) =
                session.persistence().map(|queue| queue.status())
            {
                println!("{}", format!("Not saved: {}", reason).yellow());
            }
        }
        Err(err) => {
            tracing::warn!("[Repl] turn failed: {}", err);
            println!("{}", "The world is unchanged.".bright_black());
        }
    }
    Ok(())
}

fn print_node(node: &SessionNode) {
    println!(
        "{} {}",
        format!("Turn {}:", node.world.turn).bright_black(),
        node.world.headline.bold().bright_yellow()
    );
    let narration = node.world.latest_narration();
    if !narration.is_empty() {
        println!("{}", narration);
    }
}

fn show_path(session: &SimulationSession) -> Result<()> {
    let current = session.current_id();
    for node in session.path()? {
        let marker = if &node.id == current { "*" } else { " " };
        println!(
            "{} {} {} {}",
            marker.green(),
            format!("{:>3}", node.world.turn).bright_black(),
            node.world.headline,
            format!("({})", node.id).bright_black()
        );
    }
    Ok(())
}

fn show_siblings(session: &SimulationSession) {
    let siblings = session.siblings();
    if siblings.is_empty() {
        println!("{}", "No alternative branches here.".bright_black());
        return;
    }
    for node in siblings {
        let action = node.action.as_deref().unwrap_or("(free turn)");
        println!(
            "  {} {} {}",
            node.world.headline,
            format!("[{}]", action).bright_blue(),
            format!("({})", node.id).bright_black()
        );
    }
}

async fn show_scores(session: &mut SimulationSession) -> Result<()> {
    let id = session.current_id().clone();
    let Some(scores) = session.refresh_scores(&id).await else {
        println!("{}", "Scores are unavailable right now.".yellow());
        return Ok(());
    };

    let world = session.world()?;
    let mut ranked: Vec<_> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (agent_id, score) in ranked {
        let name = world
            .agent(&agent_id)
            .map_or(agent_id.as_str(), |agent| agent.name.as_str());
        println!("  {:>3}  {}", score.to_string().bright_green(), name);
    }
    Ok(())
}

async fn show_goal(session: &mut SimulationSession) {
    let Some(player) = session.metadata().player.clone() else {
        println!("{}", "No player agent in this game.".yellow());
        return;
    };
    println!("{} {}", "Goal:".bright_white(), player.goal_or_default());

    let id = session.current_id().clone();
    let Some(score) = session.refresh_goal_score(&id).await else {
        println!("{}", "Goal progress is unavailable right now.".yellow());
        return;
    };
    println!("  {} {}", format!("{:>3}/100", score.score).bright_green(), score.reasoning);
    for factor in &score.key_factors {
        println!("        {}", format!("- {}", factor).bright_black());
    }
}

async fn show_suggestions(session: &SimulationSession, suggester: &ActionSuggester) -> Result<()> {
    let Some(player) = &session.metadata().player else {
        println!("{}", "No player agent in this game.".yellow());
        return Ok(());
    };
    match suggester.suggest(session.world()?, player).await {
        Ok(actions) => {
            for (index, action) in actions.iter().enumerate() {
                let tag = format!("[{}]", action.strategy);
                let tag = match action.strategy {
                    Strategy::Aggressive => tag.red(),
                    Strategy::Defensive => tag.blue(),
                    Strategy::Diplomatic => tag.green(),
                };
                println!("  {}. {} {}", index + 1, action.title.bold(), tag);
                println!("     {}", action.description.bright_black());
            }
        }
        Err(err) => println!("{}", format!("No suggestions: {}", err).yellow()),
    }
    Ok(())
}

async fn show_analysis(session: &SimulationSession, analyst: &GameAnalyst) -> Result<()> {
    let Some(player) = &session.metadata().player else {
        println!("{}", "No player agent in this game.".yellow());
        return Ok(());
    };
    println!("{}", "Analyzing the game...".bright_black());
    match analyst.analyze(session.world()?, player).await {
        Ok(analysis) => print_analysis(&analysis),
        Err(err) => println!("{}", format!("No analysis: {}", err).yellow()),
    }
    Ok(())
}

fn print_analysis(analysis: &GameAnalysis) {
    let performance = &analysis.player_performance;
    println!("{}", analysis.headline.bold().bright_yellow());
    println!(
        "{} {}",
        format!("Grade {}", performance.grade).bold().bright_green(),
        performance.verdict
    );
    println!();
    println!("{}", analysis.summary);

    if !analysis.turning_points.is_empty() {
        println!();
        println!("{}", "Turning points".bright_white());
        for point in &analysis.turning_points {
            println!(
                "  {} {} {}",
                format!("turn {}:", point.turn).bright_black(),
                point.event,
                format!("({})", point.impact).bright_black()
            );
        }
    }
    for (title, items) in [
        ("What went right", &analysis.what_went_right),
        ("What went wrong", &analysis.what_went_wrong),
    ] {
        if items.is_empty() {
            continue;
        }
        println!();
        println!("{}", title.bright_white());
        for item in items {
            println!("  - {}", item);
        }
    }
    if !analysis.alternative_path.is_empty() {
        println!();
        println!("{} {}", "Another way:".bright_white(), analysis.alternative_path);
    }
    if !analysis.final_standings.is_empty() {
        println!();
        println!("{}", "Final standings".bright_white());
        for standing in &analysis.final_standings {
            println!("  {} {}", standing.name.bright_magenta(), standing.outcome);
        }
    }
}

fn show_agents(session: &SimulationSession) -> Result<()> {
    let player = session
        .metadata()
        .player
        .as_ref()
        .map(|player| player.agent_id.as_str());
    for agent in &session.world()?.agents {
        let marker = if Some(agent.id.as_str()) == player { "*" } else { " " };
        println!(
            "{} {} {} {}",
            marker.green(),
            agent.name.bright_magenta(),
            format!("({}, {})", agent.kind, agent.id).bright_black(),
            agent.state
        );
        if let Some(last) = agent.last_action() {
            println!("      {}", format!("turn {}: {}", last.turn, last.action).bright_blue());
        }
    }
    Ok(())
}

fn print_help() {
    let lines = [
        ("<text>", "play an action as your agent"),
        ("@<agent-id> <text>", "play an action as another agent"),
        ("/next", "advance without a declared action"),
        ("/auto", "let the autopilot pursue your goal this turn"),
        ("/suggest", "suggest three moves toward your goal"),
        ("/goal", "score progress toward your goal"),
        ("/analyze", "post-game analysis of the path so far"),
        ("/path", "show the turns leading here"),
        ("/siblings", "show alternative branches of this turn"),
        ("/goto <node-id>", "jump to a node"),
        ("/latest", "follow this branch to its newest turn"),
        ("/scores", "rank agents by standing"),
        ("/agents", "list agents and their last actions"),
        ("/quit", "save and exit"),
    ];
    for (usage, meaning) in lines {
        println!("  {:<22} {}", usage.bright_cyan(), meaning.bright_black());
    }
}
