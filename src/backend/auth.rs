//! Auth API: password sign-in, sign-up, sessions
//!
//! Sessions are persisted through the client's `KeyValueStorage` under
//! [`SESSION_STORAGE_KEY`] and refreshed when they are about to expire.

use chrono::Utc;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::{BackendClient, BackendError};

/// Storage key of the persisted session
pub const SESSION_STORAGE_KEY: &str = "auth-session";

/// Refresh this many seconds before the token actually expires
const EXPIRY_MARGIN_SECONDS: i64 = 10;

/// Identity issued by the auth API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Signed-in session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds at issue time
    #[serde(default)]
    pub expires_in: i64,
    /// Absolute expiry (unix seconds)
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Fill `expires_at` from `expires_in` when the API omitted it
    fn normalized(mut self) -> Self {
        if self.expires_at.is_none() && self.expires_in > 0 {
            self.expires_at = Some(Utc::now().timestamp() + self.expires_in);
        }
        self
    }

    /// Check if the access token is expired (or about to be)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - EXPIRY_MARGIN_SECONDS <= Utc::now().timestamp(),
            None => false,
        }
    }
}

/// Result of a sign-up
///
/// `session` is `None` when the project requires email confirmation.
#[derive(Debug, Clone, Default)]
pub struct AuthResponse {
    pub user: Option<AuthUser>,
    pub session: Option<Session>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(Session),
    User(AuthUser),
}

#[derive(Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

impl BackendClient {
    /// Sign in with email and password and store the session
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let url = format!("{}/token?grant_type=password", self.auth_url());
        let request = self
            .request(Method::POST, &url, &self.anon_key)
            .json(&PasswordCredentials { email, password });

        let body = self.send("auth", "token", request).await?;
        let session = serde_json::from_str::<Session>(&body)?.normalized();
        self.save_session(Some(session.clone())).await?;

        tracing::info!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Create an account
    ///
    /// Stores the session when the API issued one.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, BackendError> {
        let url = format!("{}/signup", self.auth_url());
        let request = self
            .request(Method::POST, &url, &self.anon_key)
            .json(&PasswordCredentials { email, password });

        let body = self.send("auth", "signup", request).await?;
        match serde_json::from_str::<SignUpBody>(&body)? {
            SignUpBody::Session(session) => {
                let session = session.normalized();
                self.save_session(Some(session.clone())).await?;
                tracing::info!(user_id = %session.user.id, "Signed up");
                Ok(AuthResponse {
                    user: Some(session.user.clone()),
                    session: Some(session),
                })
            }
            SignUpBody::User(user) => {
                tracing::info!(user_id = %user.id, "Signed up, confirmation pending");
                Ok(AuthResponse {
                    user: Some(user),
                    session: None,
                })
            }
        }
    }

    /// Revoke the session remotely and forget it locally
    ///
    /// A failed remote revoke is logged; the local session is cleared
    /// regardless.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        let current = self.session.read().await.clone();

        if let Some(session) = current {
            let url = format!("{}/logout", self.auth_url());
            let request = self.request(Method::POST, &url, &session.access_token);
            if let Err(error) = self.send("auth", "logout", request).await {
                tracing::warn!(%error, "Remote sign-out failed, clearing local session");
            }
        }

        self.save_session(None).await
    }

    /// Current session, refreshed first when expired
    ///
    /// Concurrent callers share one refresh: whoever waits on the lock
    /// picks up the session the first caller stored.
    pub async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let current = self.session.read().await.clone();
        match current {
            Some(session) if session.is_expired() => self.refresh_if_expired().await,
            other => Ok(other),
        }
    }

    /// Exchange the refresh token for a new session
    ///
    /// A rejected refresh token clears the stored session.
    pub async fn refresh_session(&self) -> Result<Session, BackendError> {
        let _refreshing = self.refresh_lock.lock().await;

        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.refresh_token.clone())
            .ok_or(BackendError::SessionMissing)?;

        self.exchange_refresh_token(&refresh_token).await
    }

    async fn refresh_if_expired(&self) -> Result<Option<Session>, BackendError> {
        let _refreshing = self.refresh_lock.lock().await;

        let current = self.session.read().await.clone();
        match current {
            Some(session) if session.is_expired() => self
                .exchange_refresh_token(&session.refresh_token)
                .await
                .map(Some),
            other => Ok(other),
        }
    }

    /// Caller must hold `refresh_lock`
    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let url = format!("{}/token?grant_type=refresh_token", self.auth_url());
        let request = self
            .request(Method::POST, &url, &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }));

        let body = match self.send("auth", "token", request).await {
            Ok(body) => body,
            Err(error @ BackendError::Api { .. }) => {
                tracing::warn!(%error, "Refresh token rejected, signing out locally");
                self.save_session(None).await?;
                return Err(error);
            }
            Err(error) => return Err(error),
        };

        let session = serde_json::from_str::<Session>(&body)?.normalized();
        self.save_session(Some(session.clone())).await?;
        tracing::debug!(user_id = %session.user.id, "Session refreshed");
        Ok(session)
    }

    /// User of the current session, verified by the auth API
    ///
    /// `None` when there is no session or the token was rejected.
    pub async fn get_user(&self) -> Result<Option<AuthUser>, BackendError> {
        let Some(session) = self.get_session().await? else {
            return Ok(None);
        };

        match self.get_user_for_token(&session.access_token).await {
            Ok(user) => Ok(Some(user)),
            Err(error) if error.is_unauthorized() => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Verify an arbitrary access token
    pub async fn get_user_for_token(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let url = format!("{}/user", self.auth_url());
        let request = self.request(Method::GET, &url, access_token);
        let body = self.send("auth", "user", request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Stored session without refreshing
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Load the persisted session into memory
    ///
    /// An unreadable entry is discarded rather than failing startup.
    pub async fn restore_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(raw) = self.storage.get_item(SESSION_STORAGE_KEY).await? else {
            return Ok(None);
        };

        let session = match serde_json::from_str::<Session>(&raw) {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(%error, "Discarding unreadable persisted session");
                self.storage.remove_item(SESSION_STORAGE_KEY).await?;
                return Ok(None);
            }
        };

        *self.session.write().await = Some(session);
        self.get_session().await
    }

    async fn save_session(&self, session: Option<Session>) -> Result<(), BackendError> {
        match &session {
            Some(session) => {
                let raw = serde_json::to_string(session)?;
                self.storage.set_item(SESSION_STORAGE_KEY, &raw).await?;
            }
            None => self.storage.remove_item(SESSION_STORAGE_KEY).await?,
        }
        *self.session.write().await = session;
        Ok(())
    }
}
