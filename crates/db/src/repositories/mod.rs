use async_trait::async_trait;
use thiserror::Error;

use kopi_core::domain::conversation::{ConversationSnapshot, MessageTurn, SlotState};
use kopi_core::domain::outlet::Outlet;

pub mod conversation;
pub mod memory;
pub mod outlet;

pub use conversation::SqlMemoryStore;
pub use memory::InMemoryMemoryStore;
pub use outlet::SqlOutletRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Per-conversation turn log and slot state. Atomic read-modify-write per
/// conversation is provided by SQLite; concurrent writers to the same
/// conversation id are last-writer-wins.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn append_turn(&self, turn: &MessageTurn) -> Result<(), RepositoryError>;

    async fn fetch_recent_turns(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageTurn>, RepositoryError>;

    async fn load_snapshot(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationSnapshot, RepositoryError>;

    /// Overwrite only the slots present in `updates`; other slots keep their
    /// stored values.
    async fn upsert_slots(
        &self,
        conversation_id: &str,
        updates: &SlotState,
    ) -> Result<(), RepositoryError>;

    /// Clear the turn log and slot state. The conversation id can be reused.
    async fn reset(&self, conversation_id: &str) -> Result<(), RepositoryError>;

    async fn list_conversations(&self) -> Result<Vec<String>, RepositoryError>;
}

#[async_trait]
pub trait OutletRepository: Send + Sync {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<Outlet>, RepositoryError>;

    async fn insert(&self, outlet: &Outlet) -> Result<(), RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}
