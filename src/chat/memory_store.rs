//! In-memory message store backend.
//!
//! Messages are kept in append order and lost on restart. Used in
//! development and tests, and whenever no database URL is configured.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::store::{MessageStore, StoreError};
use super::ChatMessage;

pub struct MemoryMessageStore {
    /// Append-ordered log; ordering is the contract, so this is a Vec
    /// under one lock rather than a concurrent map.
    messages: Mutex<Vec<ChatMessage>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatMessage>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark a message as deleted. Returns false if the id is unknown.
    /// Deleted messages stay in the log but are excluded from reads.
    pub fn soft_delete(&self, id: &str) -> bool {
        let mut messages = self.lock();
        match messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.deleted = true;
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        self.lock().push(message.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let messages = self.lock();
        Ok(messages
            .iter()
            .rev()
            .filter(|m| !m.deleted)
            .take(limit)
            .cloned()
            .collect())
    }
}
