use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::UserProfile;

/// Display name substituted when a message's author no longer exists.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Inbound chat frame (client -> server), one per message.
#[derive(Debug, Deserialize)]
pub struct ChatFrame {
    pub message: String,
}

/// A persisted chat message. Never mutated after creation except by the
/// moderation path that sets `deleted`; never physically removed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub deleted: bool,
}

impl ChatMessage {
    /// Build a fresh message from already-trimmed text.
    pub fn new(user_id: String, message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            message,
            timestamp: Utc::now(),
            deleted: false,
        }
    }
}

/// Wire representation of a message enriched with its author's current
/// public profile. Built per fan-out or history read; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl BroadcastEnvelope {
    pub fn new(message: &ChatMessage, profile: &UserProfile) -> Self {
        Self {
            id: message.id.clone(),
            user_id: message.user_id.clone(),
            username: profile.username.clone(),
            avatar: profile.avatar.clone(),
            message: message.message.clone(),
            timestamp: message.timestamp,
        }
    }
}
