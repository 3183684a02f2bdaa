//! PostgreSQL message store backend.
//!
//! Table structure:
//! - `chat_messages` (id TEXT PK, user_id TEXT, message TEXT,
//!   timestamp TIMESTAMPTZ, deleted BOOLEAN DEFAULT FALSE)

use async_trait::async_trait;
use sqlx::PgPool;

use super::store::{MessageStore, StoreError};
use super::ChatMessage;

pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, user_id, message, timestamp, deleted)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&message.id)
        .bind(&message.user_id)
        .bind(&message.message)
        .bind(message.timestamp)
        .bind(message.deleted)
        .execute(&self.pool)
        .await?;

        tracing::trace!(message_id = %message.id, "Chat message persisted");

        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, user_id, message, timestamp, deleted
            FROM chat_messages
            WHERE NOT deleted
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }
}
