//! Reactive state containers
//!
//! Each store holds its state in a `watch` channel: UI code calls
//! `subscribe()` to re-render on change and `snapshot()` to read.
//! Actions query the hosted backend, map rows into view models and
//! patch the state. A failed action records its message in
//! `state.error` and leaves the rest of the state as it was.

mod auth;
mod chat;
mod notification;
mod video;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

pub use auth::{AUTH_STORAGE_KEY, AuthState, AuthStore, DEFAULT_AVATAR_URL, ProfileUpdate};
pub use chat::{ChatState, ChatStore};
pub use notification::{NotificationState, NotificationStore};
pub use video::{VideoState, VideoStore};

use crate::backend::{BackendClient, BackendError, FileStorage, KeyValueStorage, MemoryStorage};
use crate::config::AppConfig;

/// Failure of a store action, shown to the user as text
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("No user logged in")]
    NoUser,

    #[error("Registration failed")]
    RegistrationFailed,
}

/// Loading/error flags shared by every store state
pub trait LoadState {
    fn set_loading(&mut self, loading: bool);
    fn set_error(&mut self, error: Option<String>);
}

/// Observable state cell
pub struct Store<S> {
    tx: watch::Sender<S>,
}

impl<S: Clone> Store<S> {
    pub fn new(initial: S) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> S {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }

    pub(crate) fn update(&self, patch: impl FnOnce(&mut S)) {
        self.tx.send_modify(patch);
    }
}

impl<S: Clone + LoadState> Store<S> {
    /// Enter loading and clear the previous error
    pub(crate) fn begin_loading(&self) {
        self.update(|state| {
            state.set_loading(true);
            state.set_error(None);
        });
    }

    /// Record a failed action
    pub(crate) fn fail(&self, action: &'static str, error: StoreError, stop_loading: bool) {
        tracing::warn!(action, %error, "Store action failed");
        let message = error.to_string();
        self.update(|state| {
            state.set_error(Some(message));
            if stop_loading {
                state.set_loading(false);
            }
        });
    }
}

/// Every store of the client, wired to one backend session
pub struct Stores {
    pub backend: Arc<BackendClient>,
    pub auth: AuthStore,
    pub videos: VideoStore,
    pub chats: ChatStore,
    pub notifications: NotificationStore,
}

impl Stores {
    /// Build the client from configuration
    ///
    /// Sessions and auth state persist under `session.storage_dir` when
    /// set, in memory otherwise.
    pub async fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        let storage: Arc<dyn KeyValueStorage> = match &config.session.storage_dir {
            Some(dir) => Arc::new(FileStorage::new(dir)),
            None => Arc::new(MemoryStorage::new()),
        };
        let backend = Arc::new(BackendClient::new(&config.backend, storage)?);
        Ok(Self::new(backend).await)
    }

    /// Rehydrates the auth store from the backend's storage
    pub async fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            auth: AuthStore::new(Arc::clone(&backend)).await,
            videos: VideoStore::new(Arc::clone(&backend)),
            chats: ChatStore::new(Arc::clone(&backend)),
            notifications: NotificationStore::new(Arc::clone(&backend)),
            backend,
        }
    }
}
