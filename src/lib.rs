//! Clipfeed - a short-form video social client over a hosted backend
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        UI Layer                              │
//! │  - Animated tab bar (headless layout + springs)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Store Layer                            │
//! │  - Auth, video, chat and notification stores                │
//! │  - Observable state via `watch` channels                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Backend Layer                           │
//! │  - Hosted Postgres REST (filters, embeds, rpc)              │
//! │  - Auth (password sign-in, refresh, persisted session)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The crate also ships a small ingest service (`api`) that accepts
//! scraped videos from trusted scrapers and lists them back.
//!
//! # Modules
//!
//! - `api`: HTTP handlers for the ingest service
//! - `auth`: Bearer-token verification for the ingest service
//! - `backend`: Hosted backend client (REST, auth, session storage)
//! - `data`: Table rows, view models and row-to-view conversion
//! - `store`: Reactive client stores
//! - `ui`: Tab bar animation model
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus metrics

pub mod api;
pub mod auth;
pub mod backend;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod store;
pub mod ui;

use std::sync::Arc;

/// Request bodies above this size are rejected before parsing
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Hosted backend client
    ///
    /// The service never signs in itself; handlers forward the caller's
    /// token with each write.
    pub backend: Arc<backend::BackendClient>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Errors
    /// Returns error if the backend client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let storage: Arc<dyn backend::KeyValueStorage> = Arc::new(backend::MemoryStorage::new());
        let backend = backend::BackendClient::new(&config.backend, storage)?;

        tracing::info!(backend = %config.backend.url, "Backend client ready");

        Ok(Self {
            config: Arc::new(config),
            backend: Arc::new(backend),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::api_router())
        .route_layer(middleware::from_fn(api::track_http_metrics))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Invalid CORS origin; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
