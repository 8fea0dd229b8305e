//! Hosted backend (BaaS) client
//!
//! Talks to two managed APIs over HTTP:
//! - the REST data API (`/rest/v1`), one resource per table
//! - the auth API (`/auth/v1`), password sign-in and sessions
//!
//! The client owns the current session and attaches its access token to
//! every data request; without a session the anon key is used as bearer.

mod auth;
mod error;
mod rest;
mod storage;

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use tokio::sync::{Mutex, RwLock};

pub use auth::{AuthResponse, AuthUser, SESSION_STORAGE_KEY, Session};
pub use error::{BackendError, NOT_SINGLE_ROW, UNIQUE_VIOLATION};
pub use rest::QueryBuilder;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};

use crate::config::BackendConfig;
use crate::metrics::{BACKEND_REQUEST_DURATION_SECONDS, BACKEND_REQUESTS_TOTAL};

/// Client for the hosted REST and auth APIs
pub struct BackendClient {
    http: reqwest::Client,
    rest_url: String,
    auth_url: String,
    anon_key: String,
    session: RwLock<Option<Session>>,
    /// Held across a token refresh so only one refresh is in flight
    refresh_lock: Mutex<()>,
    storage: Arc<dyn KeyValueStorage>,
}

impl BackendClient {
    /// Create a client for the configured project
    ///
    /// # Errors
    /// Returns error if the project URL is malformed or the HTTP client
    /// cannot be built
    pub fn new(
        config: &BackendConfig,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Result<Self, BackendError> {
        let base = url::Url::parse(&config.url)?;
        let base = base.as_str().trim_end_matches('/').to_string();

        let http = reqwest::Client::builder()
            .user_agent(concat!("clipfeed/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            http,
            rest_url: format!("{base}/rest/v1"),
            auth_url: format!("{base}/auth/v1"),
            anon_key: config.anon_key.clone(),
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            storage,
        })
    }

    /// Start a query against a table
    pub fn from(&self, table: &str) -> QueryBuilder<'_> {
        QueryBuilder::new(self, table)
    }

    /// Call a database function
    ///
    /// Returns `Value::Null` for functions without a result.
    pub async fn rpc<A>(&self, function: &str, args: &A) -> Result<serde_json::Value, BackendError>
    where
        A: serde::Serialize + ?Sized,
    {
        let url = format!("{}/rpc/{}", self.rest_url, function);
        let bearer = self.current_bearer().await;
        let request = self
            .request(Method::POST, &url, &bearer)
            .json(args);

        let body = self.send("rpc", function, request).await?;
        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Storage used for the persisted session
    pub fn storage(&self) -> Arc<dyn KeyValueStorage> {
        Arc::clone(&self.storage)
    }

    /// Access token of the current session, or the anon key
    pub(crate) async fn current_bearer(&self) -> String {
        match self.get_session().await {
            Ok(Some(session)) => session.access_token,
            Ok(None) => self.anon_key.clone(),
            Err(error) => {
                tracing::warn!(%error, "Session unavailable, using anon key");
                self.anon_key.clone()
            }
        }
    }

    pub(crate) fn rest_url(&self) -> &str {
        &self.rest_url
    }

    pub(crate) fn auth_url(&self) -> &str {
        &self.auth_url
    }

    pub(crate) fn request(&self, method: Method, url: &str, bearer: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Send a request and return the raw body of a successful response
    pub(crate) async fn send(
        &self,
        operation: &'static str,
        target: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, BackendError> {
        let started = Instant::now();
        tracing::debug!(operation, target, "Backend request");

        let result = request.send().await;
        BACKEND_REQUEST_DURATION_SECONDS
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(error) => {
                BACKEND_REQUESTS_TOTAL
                    .with_label_values(&[operation, target, "transport_error"])
                    .inc();
                tracing::warn!(operation, target, %error, "Backend unreachable");
                return Err(error.into());
            }
        };

        let status = response.status();
        BACKEND_REQUESTS_TOTAL
            .with_label_values(&[operation, target, status.as_str()])
            .inc();

        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }

        let error = BackendError::from_response(status, &body);
        tracing::warn!(
            operation,
            target,
            status = status.as_u16(),
            code = ?error.code(),
            %error,
            "Backend request failed"
        );
        Err(error)
    }
}
