//! Chat history retrieval over the request/response surface.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::error::Result;
use crate::server::AppState;
use crate::users::UserProfile;

use super::message::{BroadcastEnvelope, UNKNOWN_USER};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<BroadcastEnvelope>,
    pub total: usize,
}

/// Most recent non-deleted messages, presented in chronological order.
///
/// Author display fields are resolved at read time: a vanished author gets
/// the fixed placeholder name and no avatar.
pub async fn chat_history(
    State(state): State<AppState>,
    _claims: Claims,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let limit = query
        .limit
        .unwrap_or(state.settings.chat.history_default_limit)
        .clamp(1, state.settings.chat.history_max_limit);

    // Newest-first fetch, then reverse to chronological
    let mut messages = state.message_store.recent(limit).await?;
    messages.reverse();

    let mut enriched = Vec::with_capacity(messages.len());
    for message in &messages {
        let profile = match state.user_directory.lookup_profile(&message.user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => placeholder_profile(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %message.user_id,
                    "Profile lookup failed during history read"
                );
                placeholder_profile()
            }
        };
        enriched.push(BroadcastEnvelope::new(message, &profile));
    }

    let total = enriched.len();
    Ok(Json(HistoryResponse {
        messages: enriched,
        total,
    }))
}

fn placeholder_profile() -> UserProfile {
    UserProfile {
        username: UNKNOWN_USER.to_string(),
        avatar: None,
    }
}
