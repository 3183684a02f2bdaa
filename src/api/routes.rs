use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::chat_history;
use crate::server::AppState;

use super::auth::{login, me, register};
use super::health::health;
use super::search::search_songs;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest(
            "/api",
            Router::new()
                // Accounts
                .route("/auth/register", post(register))
                .route("/auth/login", post(login))
                .route("/auth/me", get(me))
                // Delegated music search
                .route("/search", get(search_songs))
                // Chat history (the live channel is at /api/chat/ws)
                .route("/chat/messages", get(chat_history)),
        )
}
