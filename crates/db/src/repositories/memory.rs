use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use kopi_core::domain::conversation::{ConversationSnapshot, MessageTurn, SlotState};

use super::{MemoryStore, RepositoryError};

#[derive(Default)]
struct Conversation {
    turns: Vec<MessageTurn>,
    slots: SlotState,
}

/// Non-persistent store used in tests and local experiments.
#[derive(Default)]
pub struct InMemoryMemoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn append_turn(&self, turn: &MessageTurn) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(turn.conversation_id.clone())
            .or_default()
            .turns
            .push(turn.clone());
        Ok(())
    }

    async fn fetch_recent_turns(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageTurn>, RepositoryError> {
        let conversations = self.conversations.read().await;
        let turns = conversations
            .get(conversation_id)
            .map(|conversation| {
                let skip = conversation.turns.len().saturating_sub(limit as usize);
                conversation.turns[skip..].to_vec()
            })
            .unwrap_or_default();
        Ok(turns)
    }

    async fn load_snapshot(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationSnapshot, RepositoryError> {
        let conversations = self.conversations.read().await;
        let snapshot = conversations
            .get(conversation_id)
            .map(|conversation| ConversationSnapshot {
                conversation_id: conversation_id.to_string(),
                turns: conversation.turns.clone(),
                slots: conversation.slots.clone(),
            })
            .unwrap_or_else(|| ConversationSnapshot::empty(conversation_id));
        Ok(snapshot)
    }

    async fn upsert_slots(
        &self,
        conversation_id: &str,
        updates: &SlotState,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.entry(conversation_id.to_string()).or_default().slots.apply(updates);
        Ok(())
    }

    async fn reset(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.remove(conversation_id);
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<String>, RepositoryError> {
        let conversations = self.conversations.read().await;
        let mut ids: Vec<String> = conversations.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use kopi_core::domain::conversation::{MessageTurn, SlotState};

    use crate::repositories::{InMemoryMemoryStore, MemoryStore};

    #[tokio::test]
    async fn in_memory_round_trip_matches_sql_contract() {
        let store = InMemoryMemoryStore::new();

        store.append_turn(&MessageTurn::user("conv-1", "hi")).await.expect("append");
        let updates: SlotState = [("product_type", "tumbler")].into_iter().collect();
        store.upsert_slots("conv-1", &updates).await.expect("upsert");

        let snapshot = store.load_snapshot("conv-1").await.expect("snapshot");
        assert_eq!(snapshot.turns.len(), 1);
        assert_eq!(snapshot.slots.get("product_type"), Some("tumbler"));

        store.reset("conv-1").await.expect("reset");
        let cleared = store.load_snapshot("conv-1").await.expect("snapshot");
        assert!(cleared.turns.is_empty());
        assert!(cleared.slots.is_empty());
    }

    #[tokio::test]
    async fn fetch_recent_turns_keeps_newest_window() {
        let store = InMemoryMemoryStore::new();
        for content in ["a", "b", "c"] {
            store.append_turn(&MessageTurn::user("conv-1", content)).await.expect("append");
        }

        let turns = store.fetch_recent_turns("conv-1", 2).await.expect("fetch");
        let contents: Vec<&str> = turns.iter().map(|turn| turn.content.as_str()).collect();
        assert_eq!(contents, vec!["b", "c"]);
    }
}
