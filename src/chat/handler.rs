use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::server::AppState;

use super::message::{BroadcastEnvelope, ChatFrame, ChatMessage};
use super::registry::ConnectionHandle;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Chat WebSocket upgrade handler.
///
/// The user identity comes from the validated token, never from the
/// request path or client-supplied fields.
#[tracing::instrument(
    name = "chat.upgrade",
    skip(ws, state, query, headers),
    fields(has_query_token = query.token.is_some())
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> Response {
    // Extract token from query parameter or Authorization header
    let token = match extract_token(&query, &headers) {
        Some(t) => t,
        None => {
            return (StatusCode::UNAUTHORIZED, "Missing authentication token").into_response();
        }
    };

    let claims = match state.jwt.validate(&token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(error = %e, "JWT validation failed");
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    tracing::info!(user_id = %claims.sub, "Chat WebSocket upgrade requested");

    ws.on_upgrade(move |socket| handle_socket(socket, state, claims.sub))
}

/// Extract token from query parameter or Authorization header
fn extract_token(query: &WsQuery, headers: &HeaderMap) -> Option<String> {
    if let Some(ref token) = query.token {
        return Some(token.clone());
    }

    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    None
}

/// Run one chat session: register, pump frames, clean up on every exit path.
#[tracing::instrument(
    name = "chat.session",
    skip(socket, state),
    fields(user_id = %user_id)
)]
async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let (tx, mut rx) = mpsc::channel::<String>(state.settings.chat.channel_buffer);

    // CONNECTING -> OPEN once the registry knows about us
    let handle = state.registry.register(user_id.clone(), tx);
    let connection_id = handle.id;

    tracing::info!(connection_id = %connection_id, "Chat connection established");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task for writing queued outbound frames to the socket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Task for the receive loop; also watches the handle's close signal
    // (supersede or server shutdown)
    let state_clone = state.clone();
    let handle_clone = handle.clone();
    let recv_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = handle_clone.wait_closed() => {
                    tracing::debug!(connection_id = %handle_clone.id, "Connection closed by registry");
                    break;
                }
                frame = ws_receiver.next() => match frame {
                    Some(Ok(msg)) => {
                        if !process_frame(msg, &state_clone, &handle_clone).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket receive error");
                        break;
                    }
                    None => break,
                },
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {
            tracing::debug!(connection_id = %connection_id, "Send task completed");
        }
        _ = recv_task => {
            tracing::debug!(connection_id = %connection_id, "Receive task completed");
        }
    }

    // OPEN -> CLOSED: always unregister, whatever ended the session
    state.registry.unregister(&handle);

    tracing::info!(connection_id = %connection_id, "Chat connection closed");
}

/// Process a received WebSocket frame.
/// Returns false if the connection should be closed.
async fn process_frame(msg: Message, state: &AppState, handle: &Arc<ConnectionHandle>) -> bool {
    match msg {
        Message::Text(text) => {
            handle_chat_frame(&text, state, handle).await;
            true
        }
        // Malformed input never tears down the connection
        Message::Binary(_) => {
            tracing::debug!(connection_id = %handle.id, "Ignoring binary frame");
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %handle.id, "Received close frame");
            false
        }
    }
}

/// Handle one inbound chat frame: validate, persist, enrich, fan out.
#[tracing::instrument(
    name = "chat.message",
    skip(text, state, handle),
    fields(connection_id = %handle.id, user_id = %handle.user_id)
)]
async fn handle_chat_frame(text: &str, state: &AppState, handle: &Arc<ConnectionHandle>) {
    let frame: ChatFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed chat frame");
            return;
        }
    };

    let trimmed = frame.message.trim();
    if trimmed.is_empty() {
        tracing::debug!("Ignoring empty chat message");
        return;
    }

    let message = ChatMessage::new(handle.user_id.clone(), trimmed.to_string());

    // Persist before fan-out: an unpersisted message must never be broadcast
    if let Err(e) = state.message_store.append(&message).await {
        tracing::error!(
            error = %e,
            message_id = %message.id,
            "Failed to persist chat message, dropping it"
        );
        return;
    }

    // Enrich with the author's current profile; if the author vanished the
    // message stays persisted but is not fanned out
    let profile = match state.user_directory.lookup_profile(&handle.user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            tracing::warn!(user_id = %handle.user_id, "Author no longer exists, skipping broadcast");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Profile lookup failed, skipping broadcast");
            return;
        }
    };

    let envelope = BroadcastEnvelope::new(&message, &profile);
    let payload = match serde_json::to_string(&envelope) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize broadcast envelope");
            return;
        }
    };

    let outcome = state.registry.broadcast(payload).await;

    tracing::debug!(
        message_id = %message.id,
        delivered = outcome.delivered,
        failed = outcome.failed,
        "Chat message broadcast"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{MemoryMessageStore, MessageStore};
    use crate::config::{
        ChatConfig, DatabaseConfig, JwtConfig, SearchConfig, ServerConfig, Settings,
    };
    use crate::users::{create_user_directory, User};

    fn test_state() -> (AppState, Arc<MemoryMessageStore>) {
        let settings = Settings {
            server: ServerConfig::default(),
            jwt: JwtConfig {
                secret: "test-secret".to_string(),
                issuer: None,
                audience: None,
                access_token_expire_minutes: 30,
            },
            database: DatabaseConfig::default(),
            search: SearchConfig::default(),
            chat: ChatConfig::default(),
        };
        let store = Arc::new(MemoryMessageStore::new());
        let directory = create_user_directory(None);
        let state = AppState::new(settings, store.clone(), directory, None);
        (state, store)
    }

    async fn create_user(state: &AppState, username: &str) -> User {
        let user = User::new(
            username.to_string(),
            format!("{}@example.com", username),
            "hash".to_string(),
        );
        state.user_directory.create(user.clone()).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_message_is_trimmed_persisted_and_broadcast() {
        let (state, store) = test_state();
        let alice = create_user(&state, "alice").await;

        let (tx, mut rx) = mpsc::channel(8);
        let handle = state.registry.register(alice.id.clone(), tx);

        handle_chat_frame(r#"{"message": "  hi  "}"#, &state, &handle).await;

        let stored = store.recent(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message, "hi");

        let payload = rx.recv().await.unwrap();
        let envelope: BroadcastEnvelope = serde_json::from_str(&payload).unwrap();
        assert_eq!(envelope.message, "hi");
        assert_eq!(envelope.username, "alice");
        assert_eq!(envelope.user_id, alice.id);
    }

    #[tokio::test]
    async fn test_empty_message_never_persisted_or_broadcast() {
        let (state, store) = test_state();
        let alice = create_user(&state, "alice").await;

        let (tx, mut rx) = mpsc::channel(8);
        let handle = state.registry.register(alice.id.clone(), tx);

        handle_chat_frame(r#"{"message": ""}"#, &state, &handle).await;
        handle_chat_frame(r#"{"message": "   \t\n "}"#, &state, &handle).await;

        assert!(store.recent(10).await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_ignored() {
        let (state, store) = test_state();
        let alice = create_user(&state, "alice").await;

        let (tx, mut rx) = mpsc::channel(8);
        let handle = state.registry.register(alice.id.clone(), tx);

        handle_chat_frame("not json", &state, &handle).await;
        handle_chat_frame(r#"{"text": "wrong field"}"#, &state, &handle).await;

        assert!(store.recent(10).await.unwrap().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_vanished_author_message_persists_without_broadcast() {
        let (state, store) = test_state();

        // Connection for a user the directory has never heard of
        let (tx, mut rx) = mpsc::channel(8);
        let handle = state.registry.register("ghost-user".to_string(), tx);

        handle_chat_frame(r#"{"message": "hello?"}"#, &state, &handle).await;

        // Persisted, but nothing fanned out
        let stored = store.recent(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].message, "hello?");
        assert!(rx.try_recv().is_err());
    }
}
