//! Auth store: session bootstrap, sign-in/up/out, profile update
//!
//! The signed-in user survives restarts: `{user, isAuthenticated}` is
//! persisted under [`AUTH_STORAGE_KEY`] and rehydrated on construction.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::{LoadState, Store, StoreError};
use crate::backend::{BackendClient, BackendError, KeyValueStorage};
use crate::data::{User, UserInsert, UserRow, UserUpdate, tables, user_from_row};

/// Storage key of the persisted auth state
pub const AUTH_STORAGE_KEY: &str = "auth-storage";

/// Avatar given to new accounts
pub const DEFAULT_AVATAR_URL: &str =
    "https://images.unsplash.com/photo-1535713875002-d1d0cf377fde";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl LoadState for AuthState {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
}

/// Profile fields to change
///
/// `None` leaves a field alone. Empty `username`, `display_name` and
/// `photo_url` are ignored; an empty `bio` clears the bio.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
}

impl ProfileUpdate {
    fn into_patch(self) -> UserUpdate {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        UserUpdate {
            username: non_empty(self.username),
            display_name: non_empty(self.display_name),
            photo_url: non_empty(self.photo_url),
            bio: self.bio,
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedAuth {
    state: PersistedAuthState,
    version: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedAuthState {
    user: Option<User>,
    is_authenticated: bool,
}

pub struct AuthStore {
    backend: Arc<BackendClient>,
    storage: Arc<dyn KeyValueStorage>,
    state: Store<AuthState>,
}

impl AuthStore {
    /// Create the store, rehydrating persisted auth state
    pub async fn new(backend: Arc<BackendClient>) -> Self {
        let storage = backend.storage();
        let initial = Self::hydrate(storage.as_ref()).await;
        Self {
            backend,
            storage,
            state: Store::new(initial),
        }
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Restore the persisted session and load its profile
    ///
    /// Without a session the store is reset to signed-out. When the
    /// session cannot be restored (backend unreachable) the rehydrated
    /// state is kept.
    pub async fn initialize(&self) {
        let session = match self.backend.restore_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                if self.state.snapshot().is_authenticated {
                    tracing::info!("No session found, clearing persisted user");
                    self.set_user(None).await;
                }
                return;
            }
            Err(error) => {
                tracing::warn!(%error, "Could not restore session, keeping persisted state");
                return;
            }
        };

        match self.fetch_profile(&session.user.id).await {
            Ok(Some(user)) => self.set_user(Some(user)).await,
            Ok(None) => {
                tracing::warn!(user_id = %session.user.id, "Session has no profile row");
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to load profile during initialize");
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) {
        self.state.begin_loading();

        match self.try_login(email, password).await {
            Ok(Some(user)) => {
                self.state.update(|state| {
                    state.user = Some(user);
                    state.is_authenticated = true;
                    state.is_loading = false;
                });
                self.persist().await;
            }
            Ok(None) => {
                tracing::warn!("Signed in but no profile row exists");
                self.state.update(|state| state.is_loading = false);
            }
            Err(error) => self.state.fail("login", error, true),
        }
    }

    pub async fn register(&self, email: &str, password: &str, username: &str) {
        self.state.begin_loading();

        match self.try_register(email, password, username).await {
            Ok(user) => {
                self.state.update(|state| {
                    state.user = Some(user);
                    state.is_authenticated = true;
                    state.is_loading = false;
                });
                self.persist().await;
            }
            Err(error) => self.state.fail("register", error, true),
        }
    }

    pub async fn logout(&self) {
        if let Err(error) = self.backend.sign_out().await {
            tracing::warn!(%error, "Sign-out failed");
        }
        self.set_user(None).await;
    }

    pub async fn update_profile(&self, update: ProfileUpdate) {
        self.state.begin_loading();

        match self.try_update_profile(update).await {
            Ok(patch) => {
                self.state.update(|state| {
                    if let Some(user) = state.user.as_mut() {
                        merge_profile(user, &patch);
                    }
                    state.is_loading = false;
                });
                self.persist().await;
            }
            Err(error) => self.state.fail("update_profile", error, true),
        }
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<Option<User>, StoreError> {
        let session = self.backend.sign_in_with_password(email, password).await?;
        Ok(self.fetch_profile(&session.user.id).await?)
    }

    async fn try_register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<User, StoreError> {
        let response = self.backend.sign_up(email, password).await?;
        let auth_user = response.user.ok_or(StoreError::RegistrationFailed)?;

        let profile = UserInsert {
            id: Some(auth_user.id.clone()),
            username: username.to_string(),
            email: email.to_string(),
            display_name: username.to_string(),
            photo_url: Some(DEFAULT_AVATAR_URL.to_string()),
            ..Default::default()
        };
        self.backend
            .from(tables::USERS)
            .insert(&profile)
            .execute_empty()
            .await?;

        tracing::info!(user_id = %auth_user.id, %username, "Profile created");

        Ok(User {
            id: auth_user.id,
            username: username.to_string(),
            email: email.to_string(),
            display_name: username.to_string(),
            photo_url: DEFAULT_AVATAR_URL.to_string(),
            bio: String::new(),
            followers: 0,
            following: 0,
            created_at: Utc::now().timestamp_millis(),
        })
    }

    async fn try_update_profile(&self, update: ProfileUpdate) -> Result<UserUpdate, StoreError> {
        let current = self.state.snapshot().user.ok_or(StoreError::NoUser)?;
        let patch = update.into_patch();

        if patch.is_empty() {
            return Ok(patch);
        }

        self.backend
            .from(tables::USERS)
            .update(&patch)
            .eq("id", &current.id)
            .execute_empty()
            .await?;

        Ok(patch)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<User>, BackendError> {
        let row = self
            .backend
            .from(tables::USERS)
            .select("*")
            .eq("id", user_id)
            .maybe_single::<UserRow>()
            .await?;
        Ok(row.map(user_from_row))
    }

    async fn set_user(&self, user: Option<User>) {
        self.state.update(|state| {
            state.is_authenticated = user.is_some();
            state.user = user;
        });
        self.persist().await;
    }

    async fn hydrate(storage: &dyn KeyValueStorage) -> AuthState {
        let raw = match storage.get_item(AUTH_STORAGE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return AuthState::default(),
            Err(error) => {
                tracing::warn!(%error, "Could not read persisted auth state");
                return AuthState::default();
            }
        };

        match serde_json::from_str::<PersistedAuth>(&raw) {
            Ok(persisted) => AuthState {
                user: persisted.state.user,
                is_authenticated: persisted.state.is_authenticated,
                ..Default::default()
            },
            Err(error) => {
                tracing::warn!(%error, "Ignoring unreadable persisted auth state");
                AuthState::default()
            }
        }
    }

    async fn persist(&self) {
        let snapshot = self.state.snapshot();
        let persisted = PersistedAuth {
            state: PersistedAuthState {
                user: snapshot.user,
                is_authenticated: snapshot.is_authenticated,
            },
            version: 0,
        };

        let result = match serde_json::to_string(&persisted) {
            Ok(raw) => self.storage.set_item(AUTH_STORAGE_KEY, &raw).await,
            Err(error) => Err(BackendError::from(error)),
        };
        if let Err(error) = result {
            tracing::warn!(%error, "Failed to persist auth state");
        }
    }
}

fn merge_profile(user: &mut User, patch: &UserUpdate) {
    if let Some(username) = &patch.username {
        user.username = username.clone();
    }
    if let Some(display_name) = &patch.display_name {
        user.display_name = display_name.clone();
    }
    if let Some(bio) = &patch.bio {
        user.bio = bio.clone();
    }
    if let Some(photo_url) = &patch.photo_url {
        user.photo_url = photo_url.clone();
    }
}
