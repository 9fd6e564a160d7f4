use std::collections::BTreeMap;

use crate::domain::conversation::SlotState;
use crate::domain::decision::{Intent, PlannerAction, PlannerDecision};

use super::{Planner, PlannerContext};

/// Canonical product keywords the extractor resolves to.
const PRODUCT_KEYWORDS: &[&str] = &["tumbler", "flask", "mug", "cup", "bottle", "merch", "thermos"];

/// Plural and typo forms mapped back to a canonical keyword.
const PRODUCT_KEYWORD_ALIASES: &[(&str, &str)] = &[
    ("tumblers", "tumbler"),
    ("tumblrs", "tumbler"),
    ("cups", "cup"),
    ("mugs", "mug"),
    ("bottles", "bottle"),
    ("thermoses", "thermos"),
];

/// Location aliases in scan order. The first alias found as a substring of
/// the message wins, so declaration order is the tie-break.
const LOCATION_ALIASES: &[(&str, &str)] = &[
    ("ss2", "SS 2"),
    ("pj", "Petaling Jaya"),
    ("petaling", "Petaling Jaya"),
    ("kl", "Kuala Lumpur"),
    ("kuala lumpur", "Kuala Lumpur"),
    ("damansara", "Damansara"),
];

const CALCULATE_CUES: &[&str] = &["calc", "sum", "add", "minus", "+", "-"];
const PRODUCT_CUES: &[&str] = &[
    "product", "drink", "tumbler", "tumblers", "merch", "mug", "mugs", "cup", "cups", "bottle",
    "bottles", "thermos",
];
const OUTLET_CUES: &[&str] = &["outlet", "store", "open", "closing", "hours"];
const SMALL_TALK_CUES: &[&str] = &["hello", "hi", "thanks", "help"];

const CONTINUATION_PHRASES: &[&str] = &[
    "what else",
    "anything else",
    "another",
    "more option",
    "show me more",
    "something else",
];

/// Confidence assigned to any classified (non-unknown) intent. A deliberate
/// constant, not a calibrated probability.
const CLASSIFIED_CONFIDENCE: f64 = 0.9;
const UNKNOWN_CONFIDENCE: f64 = 0.65;

/// Lightweight intent classifier with deterministic slot requirements.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleBasedPlanner;

impl RuleBasedPlanner {
    pub fn new() -> Self {
        Self
    }
}

impl Planner for RuleBasedPlanner {
    fn decide(&self, context: &PlannerContext<'_>) -> PlannerDecision {
        let message = context.turn.content.to_lowercase();
        let mut intent = classify_intent(&message);
        intent = contextual_intent(intent, &message, &context.snapshot.slots);

        let slot_updates = extract_slot_updates(intent, &context.turn.content, &message);
        let mut required_slots = derive_required_slots(intent, &context.snapshot.slots);

        // A slot extracted this turn counts as satisfied immediately, before
        // persistence completes.
        for (slot, _) in slot_updates.iter() {
            if let Some(satisfied) = required_slots.get_mut(slot) {
                *satisfied = true;
            }
        }

        let action = select_action(intent, &required_slots);
        let confidence =
            if intent == Intent::Unknown { UNKNOWN_CONFIDENCE } else { CLASSIFIED_CONFIDENCE };

        PlannerDecision { intent, action, confidence, required_slots, slot_updates }
    }

    fn describe(&self) -> &'static str {
        "Rule-based keyword planner"
    }
}

/// Ordered keyword-membership checks; first match wins, UNKNOWN otherwise.
fn classify_intent(message: &str) -> Intent {
    if CALCULATE_CUES.iter().any(|cue| message.contains(cue)) {
        return Intent::Calculate;
    }
    if PRODUCT_CUES.iter().any(|cue| message.contains(cue)) {
        return Intent::ProductInfo;
    }
    if OUTLET_CUES.iter().any(|cue| message.contains(cue)) {
        return Intent::OutletInfo;
    }
    if message.contains("reset") {
        return Intent::Reset;
    }
    if SMALL_TALK_CUES.iter().any(|cue| message.contains(cue)) {
        return Intent::SmallTalk;
    }
    Intent::Unknown
}

/// Reuse the previous topic when an UNKNOWN message looks like a
/// continuation. product_type is checked before location when both exist.
fn contextual_intent(intent: Intent, message: &str, slots: &SlotState) -> Intent {
    if intent != Intent::Unknown {
        return intent;
    }

    let continuation = CONTINUATION_PHRASES.iter().any(|phrase| message.contains(phrase));
    if !continuation {
        return intent;
    }

    if slots.contains("product_type") {
        return Intent::ProductInfo;
    }
    if slots.contains("location") {
        return Intent::OutletInfo;
    }

    intent
}

fn derive_required_slots(intent: Intent, slots: &SlotState) -> BTreeMap<String, bool> {
    let mut required = BTreeMap::new();
    match intent {
        Intent::Calculate => {
            required.insert("operation".to_string(), slots.contains("operation"));
        }
        Intent::ProductInfo => {
            required.insert("product_type".to_string(), slots.contains("product_type"));
        }
        Intent::OutletInfo => {
            required.insert("location".to_string(), slots.contains("location"));
        }
        Intent::SmallTalk | Intent::Reset | Intent::Unknown => {}
    }
    required
}

fn extract_slot_updates(intent: Intent, raw_content: &str, message: &str) -> SlotState {
    let mut updates = SlotState::new();

    match intent {
        Intent::Calculate => {
            // The operation is the raw trimmed message, verbatim. Arithmetic
            // validation happens in the calculator tool, not here.
            updates.set("operation", raw_content.trim());
        }
        Intent::ProductInfo => {
            if let Some(canonical) = extract_product_keyword(message) {
                updates.set("product_type", canonical);
            }
        }
        Intent::OutletInfo => {
            if let Some(location) = extract_location(message) {
                updates.set("location", location);
            }
        }
        Intent::SmallTalk | Intent::Reset | Intent::Unknown => {}
    }

    updates
}

/// Token-wise product lookup: canonical set, then alias table, then the
/// token with a trailing "s" stripped. First canonical match wins.
fn extract_product_keyword(message: &str) -> Option<&'static str> {
    for raw_token in message.split_whitespace() {
        let token = raw_token.trim_matches(|ch: char| " ,.!?;:\"'()".contains(ch));
        if token.is_empty() {
            continue;
        }

        if let Some(keyword) = PRODUCT_KEYWORDS.iter().find(|keyword| **keyword == token) {
            return Some(keyword);
        }
        if let Some((_, canonical)) =
            PRODUCT_KEYWORD_ALIASES.iter().find(|(alias, _)| *alias == token)
        {
            return Some(canonical);
        }
        let stripped = token.trim_end_matches('s');
        if let Some(keyword) = PRODUCT_KEYWORDS.iter().find(|keyword| **keyword == stripped) {
            return Some(keyword);
        }
    }
    None
}

fn extract_location(message: &str) -> Option<&'static str> {
    LOCATION_ALIASES
        .iter()
        .find(|(alias, _)| message.contains(alias))
        .map(|(_, location)| *location)
}

/// Decision table mapping (intent, requirement state) to an action.
/// Deterministic and side-effect free.
fn select_action(intent: Intent, required_slots: &BTreeMap<String, bool>) -> PlannerAction {
    let satisfied = |slot: &str| required_slots.get(slot).copied().unwrap_or(false);

    match intent {
        Intent::Calculate if satisfied("operation") => PlannerAction::CallCalculator,
        Intent::ProductInfo if satisfied("product_type") => PlannerAction::CallProducts,
        Intent::OutletInfo if satisfied("location") => PlannerAction::CallOutlets,
        Intent::Reset => PlannerAction::Finish,
        Intent::Unknown | Intent::SmallTalk => PlannerAction::Fallback,
        Intent::Calculate | Intent::ProductInfo | Intent::OutletInfo => PlannerAction::AskFollowUp,
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::{ConversationSnapshot, MessageTurn, SlotState};
    use crate::domain::decision::{Intent, PlannerAction};
    use crate::planner::{Planner, PlannerContext};

    use super::RuleBasedPlanner;

    fn snapshot_with(slots: SlotState) -> ConversationSnapshot {
        ConversationSnapshot { conversation_id: "conv-1".to_string(), turns: Vec::new(), slots }
    }

    fn decide(content: &str, slots: SlotState) -> crate::domain::decision::PlannerDecision {
        let planner = RuleBasedPlanner::new();
        let turn = MessageTurn::user("conv-1", content);
        let snapshot = snapshot_with(slots);
        planner.decide(&PlannerContext { turn: &turn, snapshot: &snapshot })
    }

    #[test]
    fn extracts_product_slot_when_missing() {
        let decision = decide("Do you have a stainless tumbler?", SlotState::new());

        assert_eq!(decision.intent, Intent::ProductInfo);
        assert_eq!(decision.action, PlannerAction::CallProducts);
        assert_eq!(decision.slot_updates.get("product_type"), Some("tumbler"));
        assert_eq!(decision.required_slots.get("product_type"), Some(&true));
    }

    #[test]
    fn respects_existing_product_slot_on_continuation() {
        let slots: SlotState = [("product_type", "tumbler")].into_iter().collect();
        let decision = decide("Show me more options please", slots);

        assert_eq!(decision.intent, Intent::ProductInfo);
        assert_eq!(decision.action, PlannerAction::CallProducts);
        assert!(decision.slot_updates.is_empty());
        assert_eq!(decision.required_slots.get("product_type"), Some(&true));
    }

    #[test]
    fn continuation_prefers_product_over_location() {
        let slots: SlotState =
            [("product_type", "mug"), ("location", "Damansara")].into_iter().collect();
        let decision = decide("what else do you have?", slots);

        assert_eq!(decision.intent, Intent::ProductInfo);
    }

    #[test]
    fn continuation_with_location_only_reclassifies_to_outlets() {
        let slots: SlotState = [("location", "Damansara")].into_iter().collect();
        let decision = decide("show me more", slots);

        assert_eq!(decision.intent, Intent::OutletInfo);
        assert_eq!(decision.action, PlannerAction::CallOutlets);
    }

    #[test]
    fn extracts_operation_for_calculator() {
        let decision = decide("calc 5 * 7", SlotState::new());

        assert_eq!(decision.intent, Intent::Calculate);
        assert_eq!(decision.action, PlannerAction::CallCalculator);
        assert_eq!(decision.slot_updates.get("operation"), Some("calc 5 * 7"));
        assert!((decision.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_location_requests_follow_up() {
        let decision = decide("What are the opening hours?", SlotState::new());

        assert_eq!(decision.intent, Intent::OutletInfo);
        assert_eq!(decision.action, PlannerAction::AskFollowUp);
        assert_eq!(decision.required_slots.get("location"), Some(&false));
        assert!(decision.slot_updates.is_empty());
    }

    #[test]
    fn outlet_message_with_alias_resolves_canonical_location() {
        let decision = decide("Damansara outlet please.", SlotState::new());

        assert_eq!(decision.intent, Intent::OutletInfo);
        assert_eq!(decision.action, PlannerAction::CallOutlets);
        assert_eq!(decision.slot_updates.get("location"), Some("Damansara"));
    }

    #[test]
    fn location_alias_scan_order_is_the_tie_break() {
        // "pj" appears before "damansara" in the alias table, so a message
        // containing both resolves to Petaling Jaya.
        let decision = decide("outlet in pj or damansara?", SlotState::new());
        assert_eq!(decision.slot_updates.get("location"), Some("Petaling Jaya"));
    }

    #[test]
    fn plural_and_typo_product_forms_resolve_to_canonical() {
        for (message, expected) in [
            ("any tumblers left", "tumbler"),
            ("do you have tumblrs merch", "tumbler"),
            ("looking for mugs", "mug"),
            ("any flasks in your merch", "flask"),
        ] {
            let decision = decide(message, SlotState::new());
            assert_eq!(decision.slot_updates.get("product_type"), Some(expected), "{message}");
        }
    }

    #[test]
    fn gibberish_falls_back_with_lower_confidence() {
        let decision = decide("blorbledygook", SlotState::new());

        assert_eq!(decision.intent, Intent::Unknown);
        assert_eq!(decision.action, PlannerAction::Fallback);
        assert!((decision.confidence - 0.65).abs() < f64::EPSILON);
        assert!(decision.required_slots.is_empty());
    }

    #[test]
    fn small_talk_falls_back_without_required_slots() {
        let decision = decide("hello there", SlotState::new());

        assert_eq!(decision.intent, Intent::SmallTalk);
        assert_eq!(decision.action, PlannerAction::Fallback);
        assert!(decision.required_slots.is_empty());
    }

    #[test]
    fn reset_always_finishes() {
        let slots: SlotState = [("product_type", "tumbler")].into_iter().collect();
        let decision = decide("please reset everything", slots);

        assert_eq!(decision.intent, Intent::Reset);
        assert_eq!(decision.action, PlannerAction::Finish);
    }

    #[test]
    fn classification_priority_prefers_arithmetic_over_products() {
        // "add" cue outranks the product cue in the ordered checks.
        let decision = decide("add the tumbler price", SlotState::new());
        assert_eq!(decision.intent, Intent::Calculate);
    }

    #[test]
    fn decision_is_idempotent_for_identical_inputs() {
        let first = decide("calc 1 + 2", SlotState::new());
        let second = decide("calc 1 + 2", SlotState::new());

        assert_eq!(first.action, second.action);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(first, second);
    }

    #[test]
    fn unsatisfied_required_slot_never_dispatches_a_tool() {
        for message in ["which stores do you have", "where can i find your products"] {
            let decision = decide(message, SlotState::new());
            assert!(
                !decision.action.is_tool_call(),
                "{message} must not dispatch: {:?}",
                decision.action
            );
        }
    }
}
