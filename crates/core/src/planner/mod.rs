//! Rule-based planner: intent classification, slot extraction, requirement
//! resolution and action selection over a single conversational turn.
//!
//! Every function here is pure and synchronous; the orchestrator owns all
//! side effects. The planner is a small deterministic decision table, not a
//! learned model; confidence values are documented constants.

mod rules;

pub use rules::RuleBasedPlanner;

use crate::domain::conversation::{ConversationSnapshot, MessageTurn};
use crate::domain::decision::PlannerDecision;

/// Inputs available to the planner when deciding the next action.
#[derive(Clone, Copy, Debug)]
pub struct PlannerContext<'a> {
    pub turn: &'a MessageTurn,
    pub snapshot: &'a ConversationSnapshot,
}

/// Decides the next action given the latest conversational turn.
pub trait Planner: Send + Sync {
    fn decide(&self, context: &PlannerContext<'_>) -> PlannerDecision;

    /// Human-readable summary of the planning strategy.
    fn describe(&self) -> &'static str;
}
