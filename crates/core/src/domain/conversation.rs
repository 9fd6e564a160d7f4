use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Slot names the store is allowed to persist.
pub const SLOT_NAMES: &[&str] =
    &["topic", "operation", "location", "time_range", "product_type", "loyalty_status"];

/// Ordered (slot, human-readable label) pairs. Follow-up question wording walks
/// this list, so the ordering is part of the observable behavior.
pub const SLOT_LABELS: &[(&str, &str)] = &[
    ("operation", "the calculation you need"),
    ("product_type", "the product type"),
    ("location", "the location"),
    ("topic", "the topic"),
    ("time_range", "the time range"),
    ("loyalty_status", "your loyalty status"),
];

pub fn slot_label(slot: &str) -> Option<&'static str> {
    SLOT_LABELS.iter().find(|(name, _)| *name == slot).map(|(_, label)| *label)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// Single conversational turn. Immutable once appended to the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageTurn {
    pub conversation_id: String,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl MessageTurn {
    pub fn new(
        conversation_id: impl Into<String>,
        role: TurnRole,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, TurnRole::User, content)
    }
}

/// Tracked slot values for one conversation. Absence means "unsatisfied";
/// values are overwritten, never merged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState(BTreeMap<String, String>);

impl SlotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: &str) -> Option<&str> {
        self.0.get(slot).map(String::as_str)
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.0.contains_key(slot)
    }

    pub fn set(&mut self, slot: impl Into<String>, value: impl Into<String>) {
        self.0.insert(slot.into(), value.into());
    }

    /// Overwrite only the keys present in `updates`; other slots are untouched.
    pub fn apply(&mut self, updates: &SlotState) {
        for (slot, value) in updates.iter() {
            self.0.insert(slot.to_string(), value.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(slot, value)| (slot.as_str(), value.as_str()))
    }
}

impl<S, V> FromIterator<(S, V)> for SlotState
where
    S: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(slot, value)| (slot.into(), value.into())).collect())
    }
}

/// Read-only composite of recent turns and current slot state, constructed
/// fresh per incoming turn and never cached across requests.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub turns: Vec<MessageTurn>,
    pub slots: SlotState,
}

impl ConversationSnapshot {
    pub fn empty(conversation_id: impl Into<String>) -> Self {
        Self { conversation_id: conversation_id.into(), turns: Vec::new(), slots: SlotState::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::{slot_label, ConversationSnapshot, MessageTurn, SlotState, TurnRole, SLOT_LABELS};

    #[test]
    fn apply_overwrites_only_updated_slots() {
        let mut slots: SlotState = [("product_type", "tumbler"), ("location", "Damansara")]
            .into_iter()
            .collect();
        let updates: SlotState = [("product_type", "mug")].into_iter().collect();

        slots.apply(&updates);

        assert_eq!(slots.get("product_type"), Some("mug"));
        assert_eq!(slots.get("location"), Some("Damansara"));
    }

    #[test]
    fn every_labeled_slot_is_a_known_slot() {
        for (slot, label) in SLOT_LABELS {
            assert!(super::SLOT_NAMES.contains(slot));
            assert_eq!(slot_label(slot), Some(*label));
        }
    }

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(TurnRole::parse("User"), Some(TurnRole::User));
        assert_eq!(TurnRole::parse(" assistant "), Some(TurnRole::Assistant));
        assert_eq!(TurnRole::parse("system"), None);
        assert_eq!(TurnRole::User.as_str(), "user");
    }

    #[test]
    fn empty_snapshot_has_no_state() {
        let snapshot = ConversationSnapshot::empty("conv-1");
        assert!(snapshot.turns.is_empty());
        assert!(snapshot.slots.is_empty());
        let turn = MessageTurn::user("conv-1", "hello");
        assert_eq!(turn.role, TurnRole::User);
    }
}
