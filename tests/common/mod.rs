//! Common test utilities for E2E tests

#![allow(dead_code)]

pub mod fake_backend;
pub mod schema_validator;

use clipfeed::{AppState, config};
use tokio::net::TcpListener;

pub use fake_backend::FakeBackend;

/// Ingest service running against a fake backend
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub backend: FakeBackend,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let backend = FakeBackend::start().await;

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "test.example.com".to_string(),
                protocol: "http".to_string(),
            },
            backend: backend.config(),
            session: config::SessionConfig::default(),
            feed: config::FeedConfig { default_limit: 50 },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        clipfeed::metrics::init_metrics();

        // Initialize app state
        let state = AppState::new(config).unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = clipfeed::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            backend,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a scraper account and return its user id and access token
    pub fn create_scraper(&self, username: &str) -> (String, String) {
        let user_id = self.backend.create_user(
            &format!("{username}@example.com"),
            "scraper-password",
            username,
        );
        let token = self.backend.token_for(&user_id);
        (user_id, token)
    }
}
