use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::conversation::SlotState;

/// Supported high-level intents, in classification priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Calculate,
    ProductInfo,
    OutletInfo,
    SmallTalk,
    Reset,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calculate => "calculate",
            Self::ProductInfo => "product_info",
            Self::OutletInfo => "outlet_info",
            Self::SmallTalk => "small_talk",
            Self::Reset => "reset",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerAction {
    AskFollowUp,
    CallCalculator,
    CallProducts,
    CallOutlets,
    Fallback,
    Finish,
}

impl PlannerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AskFollowUp => "ask_follow_up",
            Self::CallCalculator => "call_calculator",
            Self::CallProducts => "call_products",
            Self::CallOutlets => "call_outlets",
            Self::Fallback => "fallback",
            Self::Finish => "finish",
        }
    }

    /// True for the actions that dispatch to an external tool.
    pub fn is_tool_call(&self) -> bool {
        matches!(self, Self::CallCalculator | Self::CallProducts | Self::CallOutlets)
    }
}

/// Planner output for a single turn. Transient; produced and consumed within
/// one request.
///
/// Invariant: `required_slots` reflects satisfaction *after* applying
/// `slot_updates`, so a slot extracted this turn reads as satisfied before
/// persistence completes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlannerDecision {
    pub intent: Intent,
    pub action: PlannerAction,
    pub confidence: f64,
    pub required_slots: BTreeMap<String, bool>,
    pub slot_updates: SlotState,
}

impl PlannerDecision {
    /// First unsatisfied slot in the stable label order, used to word
    /// follow-up questions deterministically.
    pub fn first_unsatisfied_slot(&self) -> Option<&str> {
        super::conversation::SLOT_LABELS
            .iter()
            .map(|(slot, _)| *slot)
            .find(|slot| matches!(self.required_slots.get(*slot), Some(false)))
    }
}
