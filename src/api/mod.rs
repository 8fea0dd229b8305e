//! API layer
//!
//! HTTP handlers for:
//! - Scraped video ingest and listing
//! - Metrics (Prometheus)

mod dto;
pub mod metrics;
mod videos;

use axum::{Router, routing::get};

use crate::AppState;

pub use dto::*;
pub use metrics::{metrics_router, track_http_metrics};

/// Routes nested under `/api`
pub fn api_router() -> Router<AppState> {
    Router::new().route(
        "/scrape-videos",
        get(videos::list_videos).post(videos::ingest_videos),
    )
}
