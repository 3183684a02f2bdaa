use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::error::{AppError, Result};
use crate::search::Song;
use crate::server::AppState;

/// Upper bound accepted from clients, matching the YouTube API maximum.
const MAX_RESULTS_CEILING: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub max_results: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub songs: Vec<Song>,
}

pub async fn search_songs(
    State(state): State<AppState>,
    _claims: Claims,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(AppError::Validation(
            "Search query cannot be empty".to_string(),
        ));
    }

    let max_results = query
        .max_results
        .unwrap_or(state.settings.search.max_results)
        .clamp(1, MAX_RESULTS_CEILING);

    let songs = state.search.search(q, max_results).await?;

    Ok(Json(SearchResponse { songs }))
}
