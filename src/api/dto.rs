//! Request and response bodies of the ingest API

use serde::{Deserialize, Serialize};

/// Source recorded when the caller names none
pub const DEFAULT_SOURCE: &str = "scraped";

/// `POST /api/scrape-videos` body
///
/// `videos` stays untyped until it is checked to be an array.
#[derive(Debug, Deserialize)]
pub struct ScrapeVideosRequest {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub videos: Option<serde_json::Value>,
}

/// One scraped video as submitted by the caller
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedVideo {
    pub video_url: String,
    pub thumbnail_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hashtags: Option<Vec<String>>,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// `GET /api/scrape-videos` query
#[derive(Debug, Default, Deserialize)]
pub struct ListVideosParams {
    pub source: Option<String>,
    /// Kept as text so a bad value gets a JSON error, not a rejection
    pub limit: Option<String>,
}

/// Success body of both routes
#[derive(Debug, Serialize)]
pub struct VideosResponse {
    pub success: bool,
    pub count: usize,
    pub videos: Vec<serde_json::Value>,
}

impl VideosResponse {
    pub fn new(videos: Vec<serde_json::Value>) -> Self {
        Self {
            success: true,
            count: videos.len(),
            videos,
        }
    }
}
