//! Prompt templates and tool schemas.
//!
//! Each prompt is a typed `Serialize` struct paired with a Jinja template,
//! rendered through minijinja. Tool schemas describe the structured result
//! the model is forced to return.

use saga_core::world::{AgentAction, AgentView, TurnEntry};
use saga_core::{Result, SagaError};
use serde::Serialize;
use serde_json::{Value, json};

/// System prompt shared by world seeding and narrative synthesis.
pub const SIMULATOR_SYSTEM: &str = "You are an expert world simulator modeling complex power dynamics between agents. \
Your role is to simulate realistic, consequential events with emergent behavior and strategic interactions.

KEY PRINCIPLES:
1. Agents are strategic actors. They form alliances, make deals, betray each other, cooperate, and compete.
2. Actions have consequences. Every action shifts power, resources, relationships, and capabilities.
3. Resources are finite. Track who has what.
4. Second-order effects matter. One agent's action changes what others can and will do.

FORMATTING:
- Use **bold** for key events, names, and important facts
- Track in-world dates explicitly
- Be concise, prefer short sentences";

/// A prompt rendered from a Jinja template over `Self`.
pub trait PromptTemplate: Serialize {
    const TEMPLATE: &'static str;

    fn render(&self) -> Result<String> {
        minijinja::Environment::new()
            .render_str(Self::TEMPLATE, self)
            .map_err(|err| SagaError::internal(format!("Failed to render prompt: {err}")))
    }
}

// ============================================================================
// Agent decision
// ============================================================================

/// Per-agent decision request. Other agents appear only as name/type/state.
#[derive(Debug, Serialize)]
pub struct DecisionPrompt<'a> {
    pub agent_name: &'a str,
    pub agent_type: &'a str,
    pub agent_state: &'a str,
    pub world_context: &'a str,
    pub others: Vec<AgentView<'a>>,
    pub recent_headlines: Vec<&'a str>,
    /// Set when the player declared this agent's action
    pub declared_action: Option<&'a str>,
}

impl PromptTemplate for DecisionPrompt<'_> {
    const TEMPLATE: &'static str = r#"You are {{ agent_name }}, a {{ agent_type }} in this simulation.

## YOUR CURRENT STATE
{{ agent_state }}

## WORLD CONTEXT
{{ world_context }}

## OTHER AGENTS
{% for other in others -%}
- **{{ other.name }}** ({{ other["type"] }}): {{ other.state }}
{% else -%}
No other agents
{% endfor %}
## RECENT EVENTS
{% for headline in recent_headlines -%}
- {{ headline }}
{% else -%}
No recent history
{% endfor %}
{%- if declared_action %}
## YOUR DECLARED ACTION
You have decided to: "{{ declared_action }}"
{% endif %}
---

{% if declared_action -%}
Execute your declared action briefly.
{%- else -%}
What do you do this turn? Be specific.
{%- endif %}

Return a concrete action in ONE short sentence (under 15 words). Be punchy and direct. No fluff, no preamble."#;
}

pub const DECISION_TOOL: &str = "take_action";

pub fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {"type": "string", "description": "What this agent does - ONE concrete sentence"},
            "reasoning": {"type": "string", "description": "Why - ONE short sentence"}
        },
        "required": ["action", "reasoning"]
    })
}

// ============================================================================
// Narrative synthesis
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ActionLine<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub action: &'a str,
}

#[derive(Debug, Serialize)]
pub struct NarrativePrompt<'a> {
    pub world_context: &'a str,
    pub actions: Vec<ActionLine<'a>>,
    pub player_agent: Option<&'a str>,
    pub player_action: Option<&'a str>,
}

impl PromptTemplate for NarrativePrompt<'_> {
    const TEMPLATE: &'static str = r#"## CURRENT WORLD STATE
{{ world_context }}

## AGENTS AND THEIR ACTIONS THIS TURN
{% for line in actions -%}
**{{ line.name }}** ({{ line.kind }}): {{ line.action }}

{% else -%}
No agent acted this turn.

{% endfor -%}
{% if player_action -%}
## PLAYER ACTION
The player controlling {{ player_agent or "an agent" }} declared: "{{ player_action }}"

{% endif -%}
---

## YOUR TASK

Write a succinct narrative of this turn. Focus on consequences, power shifts, and key dynamics.

PACING (be bold with time jumps):
- Default: WEEKS to MONTHS between turns
- Cold war / positioning: MONTHS to YEARS
- Crisis / climax: DAYS to WEEKS

FORMAT (be very concise, fill fields in this order):
- headline: **In-world date** + punchy summary (e.g., "**March 2026**: Harbour Guild Seizes the Docks")
- narration: 1 SHORT paragraph, punchy. Max 3-4 sentences. **bold** key events.
- updatedContext: World state in 1-2 sentences with new date
- agentStateUpdates: 1 short sentence per agent whose situation changed, using the agent ids given"#;
}

pub const NARRATIVE_TOOL: &str = "narrate_turn";

pub fn narrative_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "headline": {
                "type": "string",
                "description": "Punchy 5-10 word headline with in-world date"
            },
            "narration": {
                "type": "string",
                "description": "Short narration of the key events, consequences, and power shifts"
            },
            "updatedContext": {
                "type": "string",
                "description": "Updated world context (1-2 sentences) with the current in-world date"
            },
            "agentStateUpdates": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "agentId": {"type": "string"},
                        "newState": {"type": "string", "description": "Updated agent state after this turn"}
                    },
                    "required": ["agentId", "newState"]
                }
            },
            "newAgents": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "type": {"type": "string"},
                        "state": {"type": "string"}
                    },
                    "required": ["name", "type", "state"]
                }
            },
            "removedAgentIds": {
                "type": "array",
                "items": {"type": "string"},
                "description": "IDs of agents eliminated or absorbed this turn"
            }
        },
        "required": ["headline", "narration", "updatedContext", "agentStateUpdates"]
    })
}

// ============================================================================
// Scoring
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ScoringPrompt<'a> {
    pub world_context: &'a str,
    pub agents: Vec<AgentView<'a>>,
}

impl PromptTemplate for ScoringPrompt<'_> {
    const TEMPLATE: &'static str = r#"Score each agent on how well they're achieving their goals.

## CONTEXT
{{ world_context }}

## AGENTS TO SCORE
{% for agent in agents -%}
- {{ agent.name }} (ID: "{{ agent.id }}"): {{ agent.state }}
{% endfor %}
---

Return a score array with EXACTLY {{ agents | length }} entries. For each agent above, return:
- agentId: the EXACT ID string shown in quotes above
- score: 0-100 based on their position

Scoring guide:
- 0-30: Major setbacks, losing ground
- 30-50: Struggling, obstacles
- 50-70: Neutral position
- 70-90: Strong, making progress
- 90-100: Dominant, near victory"#;
}

pub const SCORING_TOOL: &str = "score_agents";

pub fn scores_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "scores": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "agentId": {"type": "string", "description": "The agent ID"},
                        "score": {"type": "number", "description": "Score 0-100"}
                    },
                    "required": ["agentId", "score"]
                }
            }
        },
        "required": ["scores"]
    })
}

// ============================================================================
// World seeding
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SeedPrompt<'a> {
    pub scenario: &'a str,
    pub player_name: Option<&'a str>,
    pub player_role: Option<&'a str>,
    pub player_goal: &'a str,
    pub min_agents: usize,
    pub max_agents: usize,
}

impl PromptTemplate for SeedPrompt<'_> {
    const TEMPLATE: &'static str = r#"Create a rich simulation based on: {{ scenario }}
{%- if player_name %}

IMPORTANT - PLAYER CHARACTER:
One agent MUST be "{{ player_name }}" (Human type, player-controlled).
- Role: {{ player_role or "unspecified" }}
- PRIMARY GOAL: "{{ player_goal }}"

The player's state description MUST reflect their goal as their core motivation. Their starting position should give them realistic paths toward it.
{%- endif %}

RETURN (keep outputs crisp and short):
- context: Starting world state (2 short paragraphs) with the current in-world date, key power dynamics and who controls what. Use **bold** for key facts.
- agents: Create {{ min_agents }}-{{ max_agents }} key players. For each:
  - name: Name or organization
  - type: AI, Human, Organization, Government, Corporation, Media, Labor, or Military
  - state: Goals, resources, key relationships, position (2 sentences max)
  - appearance: Explicit visual description in 1 sentence

Be vivid but concise."#;
}

pub const SEED_TOOL: &str = "seed_world";

pub fn seed_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "context": {
                "type": "string",
                "description": "Initial world state, power structures, resources, and dynamics"
            },
            "agents": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "type": {"type": "string"},
                        "state": {"type": "string"},
                        "appearance": {"type": "string"}
                    },
                    "required": ["name", "type", "state"]
                }
            }
        },
        "required": ["context", "agents"]
    })
}

// ============================================================================
// Player advice: goal progress, autopilot, suggestions
// ============================================================================

pub const GOAL_SYSTEM: &str = "You objectively evaluate goal progress in simulations.";

#[derive(Debug, Serialize)]
pub struct GoalScoringPrompt<'a> {
    pub goal: &'a str,
    pub agent_name: &'a str,
    pub agent_state: &'a str,
    pub world_context: &'a str,
    pub recent_events: Vec<&'a str>,
}

impl PromptTemplate for GoalScoringPrompt<'_> {
    const TEMPLATE: &'static str = r#"Evaluate how well an agent is progressing toward their goal.

## GOAL
"{{ goal }}"

## AGENT
**{{ agent_name }}**
Current State: {{ agent_state }}

## WORLD CONTEXT
{{ world_context }}

## RECENT EVENTS
{% for event in recent_events -%}
{{ event }}

{% else -%}
None yet

{% endfor -%}
---

Score from 0-100:
- 0-20: Major setbacks, goal is further away
- 20-40: Losing ground, obstacles mounting
- 40-60: Neutral, no clear progress or regress
- 60-80: Making meaningful progress
- 80-100: Goal is close or achieved

Be objective and succinct. Consider concrete changes in power and resources, relationship shifts, and obstacles overcome or emerged."#;
}

pub const GOAL_TOOL: &str = "score_goal";

pub fn goal_score_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "score": {
                "type": "number",
                "description": "0-100 progress toward the goal. 0=no progress/worse, 50=neutral, 100=goal achieved"
            },
            "reasoning": {"type": "string", "description": "Why this score (1-2 sentences)"},
            "keyFactors": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Top 2-3 factors affecting the score"
            }
        },
        "required": ["score", "reasoning", "keyFactors"]
    })
}

pub const AUTOPILOT_SYSTEM: &str =
    "You are a strategic actor in a simulation, choosing actions to achieve your goal.";

#[derive(Debug, Serialize)]
pub struct AutopilotPrompt<'a> {
    pub goal: &'a str,
    pub agent_name: &'a str,
    pub agent_state: &'a str,
    pub world_context: &'a str,
    pub others: Vec<AgentView<'a>>,
    pub recent_events: Vec<&'a str>,
}

impl PromptTemplate for AutopilotPrompt<'_> {
    const TEMPLATE: &'static str = r#"You are **{{ agent_name }}** in a complex power dynamics simulation.

## YOUR GOAL
"{{ goal }}"

## YOUR CURRENT STATE
{{ agent_state }}

## WORLD SITUATION
{{ world_context }}

## OTHER AGENTS
{% for other in others -%}
**{{ other.name }}**: {{ other.state }}
{% endfor %}
## RECENT EVENTS
{% for event in recent_events -%}
{{ event }}

{% else -%}
None yet

{% endfor -%}
---

## CHOOSE YOUR ACTION

Consider what moves you closer to your goal, who you could ally with or work against, and what others are likely to do.

Provide a specific, concrete action in 1-2 sentences. Not just "gather information" but WHO you contact and HOW."#;
}

pub const AUTOPILOT_TOOL: &str = "choose_action";

pub fn autopilot_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "description": "The action to take this turn to maximize goal progress"
            },
            "reasoning": {"type": "string", "description": "Strategic reasoning (1 sentence)"}
        },
        "required": ["action", "reasoning"]
    })
}

#[derive(Debug, Serialize)]
pub struct SuggestionPrompt<'a> {
    pub player_name: &'a str,
    pub player_state: &'a str,
    pub goal: &'a str,
    pub world_context: &'a str,
    pub others: Vec<AgentView<'a>>,
    pub recent_headlines: Vec<&'a str>,
}

impl PromptTemplate for SuggestionPrompt<'_> {
    const TEMPLATE: &'static str = r#"You are a strategic advisor for {{ player_name }} in this simulation.

## PLAYER'S CURRENT STATE
{{ player_state }}

## PLAYER'S GOAL
{{ goal }}

## WORLD CONTEXT
{{ world_context }}

## OTHER KEY PLAYERS
{% for other in others -%}
- **{{ other.name }}** ({{ other["type"] }}): {{ other.state }}
{% else -%}
No other agents
{% endfor %}
## RECENT EVENTS
{% for headline in recent_headlines -%}
- {{ headline }}
{% else -%}
No recent history
{% endfor %}
---

Suggest 3 distinct actions representing different strategies:
1. **Aggressive**: Bold move, seize opportunity
2. **Defensive**: Cautious, consolidate position
3. **Diplomatic**: Build alliances, negotiate

Keep titles to 3-5 words. Descriptions should be ONE sentence max. Be specific, not vague."#;
}

pub const SUGGESTION_TOOL: &str = "suggest_actions";

pub fn suggestions_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "actions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Short 3-5 word action title"},
                        "description": {"type": "string", "description": "One sentence describing the action"},
                        "strategy": {
                            "type": "string",
                            "enum": ["aggressive", "defensive", "diplomatic"]
                        }
                    },
                    "required": ["title", "description", "strategy"]
                },
                "minItems": 3,
                "maxItems": 3
            }
        },
        "required": ["actions"]
    })
}

// ============================================================================
// Post-game analysis
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AnalysisPrompt<'a> {
    pub player_name: &'a str,
    pub goal: &'a str,
    pub player_actions: &'a [AgentAction],
    pub history: &'a [TurnEntry],
    pub final_context: &'a str,
    pub agents: Vec<AgentView<'a>>,
}

impl PromptTemplate for AnalysisPrompt<'_> {
    const TEMPLATE: &'static str = r#"Analyze this completed simulation game.

## PLAYER
**Name**: {{ player_name }}
**Goal**: {{ goal }}

## PLAYER'S ACTIONS THROUGHOUT THE GAME
{% for entry in player_actions -%}
Turn {{ entry.turn }}: {{ entry.action }}
{% else -%}
No recorded actions
{% endfor %}
## COMPLETE GAME HISTORY
{% for entry in history -%}
**Turn {{ entry.turn }}**: {{ entry.headline }}
{{ entry.narration }}
{% if not loop.last %}
---

{% endif %}
{%- endfor %}

## FINAL WORLD STATE
{{ final_context }}

## FINAL AGENT STATES
{% for agent in agents -%}
- **{{ agent.name }}** ({{ agent["type"] }}): {{ agent.state }}
{% endfor %}
---

Provide an entertaining and insightful post-game analysis, like a sports post-game show. Be specific about what the player did and how it affected outcomes, the moments where decisions mattered, what could have gone differently, and where every major player ended up. Be honest but not harsh."#;
}

pub const ANALYSIS_TOOL: &str = "analyze_game";

pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "headline": {"type": "string", "description": "Dramatic 5-10 word summary of how the game ended"},
            "summary": {"type": "string", "description": "2-3 paragraph narrative arc of the entire game"},
            "playerPerformance": {
                "type": "object",
                "properties": {
                    "grade": {"type": "string", "enum": ["S", "A", "B", "C", "D", "F"]},
                    "verdict": {"type": "string", "description": "One sentence verdict"}
                },
                "required": ["grade", "verdict"]
            },
            "turningPoints": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "turn": {"type": "number"},
                        "event": {"type": "string"},
                        "impact": {"type": "string"}
                    },
                    "required": ["turn", "event", "impact"]
                }
            },
            "whatWentRight": {"type": "array", "items": {"type": "string"}},
            "whatWentWrong": {"type": "array", "items": {"type": "string"}},
            "alternativePath": {"type": "string"},
            "finalStandings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "outcome": {"type": "string"}
                    },
                    "required": ["name", "outcome"]
                }
            }
        },
        "required": [
            "headline", "summary", "playerPerformance", "turningPoints",
            "whatWentRight", "whatWentWrong", "alternativePath", "finalStandings"
        ]
    })
}
