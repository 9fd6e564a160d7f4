use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use kopi_core::domain::conversation::{ConversationSnapshot, MessageTurn, SlotState, TurnRole};

use crate::DbPool;

use super::{MemoryStore, RepositoryError};

/// How many turns a snapshot carries. Bounded so snapshots stay cheap to
/// build per request.
const SNAPSHOT_TURN_LIMIT: u32 = 100;

const SLOT_COLUMNS: &[&str] =
    &["topic", "operation", "location", "time_range", "product_type", "loyalty_status"];

pub struct SqlMemoryStore {
    pool: DbPool,
}

impl SqlMemoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemoryStore for SqlMemoryStore {
    async fn append_turn(&self, turn: &MessageTurn) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&turn.metadata)
            .map_err(|err| RepositoryError::Decode(format!("metadata encode failed: {err}")))?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO conversations (conversation_id) VALUES (?)")
            .bind(&turn.conversation_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO messages (conversation_id, role, content, created_at, metadata)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&turn.conversation_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.created_at.to_rfc3339())
        .bind(metadata)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn fetch_recent_turns(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageTurn>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT conversation_id, role, content, created_at, metadata
             FROM messages
             WHERE conversation_id = ?
             ORDER BY datetime(created_at) DESC, id DESC
             LIMIT ?",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut turns = rows
            .iter()
            .map(decode_turn)
            .collect::<Result<Vec<MessageTurn>, RepositoryError>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn load_snapshot(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationSnapshot, RepositoryError> {
        let turns = self.fetch_recent_turns(conversation_id, SNAPSHOT_TURN_LIMIT).await?;

        let row = sqlx::query(
            "SELECT topic, operation, location, time_range, product_type, loyalty_status
             FROM slots
             WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        let mut slots = SlotState::new();
        if let Some(row) = row {
            for column in SLOT_COLUMNS {
                if let Some(value) = row.try_get::<Option<String>, _>(*column)? {
                    slots.set(*column, value);
                }
            }
        }

        Ok(ConversationSnapshot { conversation_id: conversation_id.to_string(), turns, slots })
    }

    async fn upsert_slots(
        &self,
        conversation_id: &str,
        updates: &SlotState,
    ) -> Result<(), RepositoryError> {
        if updates.is_empty() {
            return Ok(());
        }

        let value = |slot: &str| updates.get(slot).map(str::to_string);

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT OR IGNORE INTO conversations (conversation_id) VALUES (?)")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO slots
                 (conversation_id, topic, operation, location, time_range, product_type, loyalty_status)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 topic = COALESCE(excluded.topic, topic),
                 operation = COALESCE(excluded.operation, operation),
                 location = COALESCE(excluded.location, location),
                 time_range = COALESCE(excluded.time_range, time_range),
                 product_type = COALESCE(excluded.product_type, product_type),
                 loyalty_status = COALESCE(excluded.loyalty_status, loyalty_status)",
        )
        .bind(conversation_id)
        .bind(value("topic"))
        .bind(value("operation"))
        .bind(value("location"))
        .bind(value("time_range"))
        .bind(value("product_type"))
        .bind(value("loyalty_status"))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn reset(&self, conversation_id: &str) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM slots WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE conversation_id = ?")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<String>, RepositoryError> {
        let rows =
            sqlx::query("SELECT conversation_id FROM conversations ORDER BY conversation_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.iter().map(|row| row.get::<String, _>("conversation_id")).collect())
    }
}

fn decode_turn(row: &sqlx::sqlite::SqliteRow) -> Result<MessageTurn, RepositoryError> {
    let role_raw: String = row.try_get("role").map_err(RepositoryError::Database)?;
    let role = TurnRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown turn role `{role_raw}`")))?;

    let created_raw: String = row.try_get("created_at").map_err(RepositoryError::Database)?;
    let created_at = DateTime::parse_from_rfc3339(&created_raw)
        .map_err(|err| RepositoryError::Decode(format!("bad created_at `{created_raw}`: {err}")))?
        .with_timezone(&Utc);

    let metadata_raw: String = row.try_get("metadata").map_err(RepositoryError::Database)?;
    let metadata: BTreeMap<String, serde_json::Value> = serde_json::from_str(&metadata_raw)
        .map_err(|err| RepositoryError::Decode(format!("metadata decode failed: {err}")))?;

    Ok(MessageTurn {
        conversation_id: row.try_get("conversation_id").map_err(RepositoryError::Database)?,
        role,
        content: row.try_get("content").map_err(RepositoryError::Database)?,
        created_at,
        metadata,
    })
}
