//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: ConnectionHealthResponse,
    pub database: DatabaseHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct ConnectionHealthResponse {
    pub total: usize,
    pub unique_users: usize,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealthResponse {
    pub backend: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<u32>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let registry_stats = state.registry.stats();

    let database = match state.database {
        Some(ref pool) => DatabaseHealthResponse {
            backend: "postgres".to_string(),
            connected: !pool.is_closed(),
            pool_size: Some(pool.size()),
        },
        None => DatabaseHealthResponse {
            backend: "memory".to_string(),
            connected: true,
            pool_size: None,
        },
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        connections: ConnectionHealthResponse {
            total: registry_stats.total_connections,
            unique_users: registry_stats.unique_users,
        },
        database,
    })
}
