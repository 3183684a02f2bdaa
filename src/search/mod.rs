//! Delegated music search against the YouTube Data API.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::AppError;

/// A search result mapped to the application's song shape.
#[derive(Debug, Clone, Serialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    pub duration: String,
    pub published_at: String,
}

// Serde views of the YouTube search payload

#[derive(Debug, Deserialize)]
struct YoutubeSearchResponse {
    #[serde(default)]
    items: Vec<YoutubeItem>,
}

#[derive(Debug, Deserialize)]
struct YoutubeItem {
    id: YoutubeVideoId,
    snippet: YoutubeSnippet,
}

#[derive(Debug, Deserialize)]
struct YoutubeVideoId {
    #[serde(rename = "videoId", default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YoutubeSnippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
    #[serde(default)]
    thumbnails: YoutubeThumbnails,
    #[serde(rename = "publishedAt")]
    published_at: String,
}

#[derive(Debug, Default, Deserialize)]
struct YoutubeThumbnails {
    medium: Option<YoutubeThumbnail>,
}

#[derive(Debug, Deserialize)]
struct YoutubeThumbnail {
    url: String,
}

pub struct SearchClient {
    http: Client,
    config: SearchConfig,
}

impl SearchClient {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Search for music videos matching `query`.
    ///
    /// The query is suffixed with "music" to bias results, matching the
    /// behavior the web client expects.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<Vec<Song>, AppError> {
        let key = self
            .config
            .youtube_api_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream("Search API key not configured".to_string()))?;

        let params: Vec<(&str, String)> = vec![
            ("part", "snippet".to_string()),
            ("q", format!("{} music", query)),
            ("type", "video".to_string()),
            ("maxResults", max_results.to_string()),
            ("key", key.to_string()),
        ];

        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Search API returned {}",
                response.status()
            )));
        }

        let body: YoutubeSearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Malformed search response: {}", e)))?;

        Ok(map_songs(body))
    }
}

fn map_songs(response: YoutubeSearchResponse) -> Vec<Song> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id?;
            Some(Song {
                id,
                title: item.snippet.title,
                artist: item.snippet.channel_title,
                thumbnail: item
                    .snippet
                    .thumbnails
                    .medium
                    .map(|t| t.url)
                    .unwrap_or_default(),
                // A duration would need a second API call per item
                duration: "Unknown".to_string(),
                published_at: item.snippet.published_at,
            })
        })
        .collect()
}
