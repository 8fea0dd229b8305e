//! Scraped video ingest and listing
//!
//! `POST /api/scrape-videos` bulk-inserts videos owned by the caller;
//! `GET /api/scrape-videos` lists the newest videos, optionally by source.

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::Json,
};

use super::dto::{DEFAULT_SOURCE, ListVideosParams, ScrapeVideosRequest, ScrapedVideo, VideosResponse};
use crate::AppState;
use crate::auth::{BearerToken, authenticate};
use crate::data::{VideoInsert, tables};
use crate::error::AppError;

const LISTING_COLUMNS: &str = "
    *,
    users (
        username,
        photo_url
    )
";

/// POST /api/scrape-videos
pub async fn ingest_videos(
    State(state): State<AppState>,
    token: BearerToken,
    body: Bytes,
) -> Result<Json<VideosResponse>, AppError> {
    let request: ScrapeVideosRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON body: {e}")))?;

    let videos = match request.videos {
        Some(serde_json::Value::Array(videos)) => videos,
        _ => return Err(AppError::Validation("Videos array is required".to_string())),
    };

    let caller = authenticate(&state, token).await?;

    let source = request
        .source
        .filter(|source| !source.is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

    let rows = videos
        .into_iter()
        .enumerate()
        .map(|(index, video)| {
            let video: ScrapedVideo = serde_json::from_value(video)
                .map_err(|e| AppError::Validation(format!("videos[{index}]: {e}")))?;
            Ok(to_insert(video, &caller.user.id, &source))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let inserted = state
        .backend
        .from(tables::VIDEOS)
        .with_token(&caller.access_token)
        .insert(&rows)
        .select("*")
        .execute::<serde_json::Value>()
        .await?;

    tracing::info!(
        user_id = %caller.user.id,
        %source,
        count = inserted.len(),
        "Scraped videos ingested"
    );

    Ok(Json(VideosResponse::new(inserted)))
}

/// GET /api/scrape-videos?source=&limit=
pub async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<ListVideosParams>,
) -> Result<Json<VideosResponse>, AppError> {
    let limit = match params.limit.as_deref() {
        None | Some("") => state.config.feed.default_limit,
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| AppError::Validation(format!("Invalid limit: {raw}")))?,
    };

    let mut query = state
        .backend
        .from(tables::VIDEOS)
        .select(LISTING_COLUMNS)
        .order("created_at", false)
        .limit(limit);

    if let Some(source) = params.source.as_deref().filter(|source| !source.is_empty()) {
        query = query.eq("source", source);
    }

    let videos = query.execute::<serde_json::Value>().await?;

    Ok(Json(VideosResponse::new(videos)))
}

fn to_insert(video: ScrapedVideo, user_id: &str, source: &str) -> VideoInsert {
    VideoInsert {
        user_id: user_id.to_string(),
        video_url: video.video_url,
        thumbnail_url: video.thumbnail_url,
        description: Some(video.description.unwrap_or_default()),
        hashtags: Some(video.hashtags.unwrap_or_default()),
        source: Some(source.to_string()),
        source_url: Some(video.source_url.unwrap_or_default()),
        ..Default::default()
    }
}
