//! World state and the pure turn-application step.

mod apply;
mod model;

pub use apply::{TurnApplication, apply_turn};
pub use model::{
    Agent, AgentAction, AgentView, AvatarDescriptor, OPENING_HEADLINE, TurnEntry, WorldState,
};
