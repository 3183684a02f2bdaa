use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::error::AppError;

use super::memory_store::MemoryMessageStore;
use super::postgres_store::PostgresMessageStore;
use super::ChatMessage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Append-only log of chat messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message to the log. Callers must not broadcast a message
    /// until this has returned Ok.
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError>;

    /// The `limit` most recently created non-deleted messages, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError>;
}

/// Create a message store backend from configuration.
///
/// With a PostgreSQL pool messages survive restarts; without one an
/// in-memory log is used (development and tests).
pub fn create_message_store(pool: Option<PgPool>) -> Arc<dyn MessageStore> {
    match pool {
        Some(pool) => {
            tracing::info!("Using PostgreSQL message store");
            Arc::new(PostgresMessageStore::new(pool))
        }
        None => {
            tracing::info!("Using in-memory message store");
            Arc::new(MemoryMessageStore::new())
        }
    }
}
