//! Notification store: inbox, mark-one-read, mark-all-read

use std::sync::Arc;

use tokio::sync::watch;

use super::{LoadState, Store, StoreError};
use crate::backend::BackendClient;
use crate::data::{
    Notification, NotificationUpdate, NotificationWithSenderRow, notification_from_row, tables,
};

const NOTIFICATION_COLUMNS: &str = "
    *,
    from_user:users!notifications_from_user_id_fkey (
        username,
        photo_url
    )
";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationState {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl LoadState for NotificationState {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
}

impl NotificationState {
    fn recount(&mut self) {
        self.unread_count = self
            .notifications
            .iter()
            .filter(|notification| !notification.read)
            .count();
    }
}

pub struct NotificationStore {
    backend: Arc<BackendClient>,
    state: Store<NotificationState>,
}

impl NotificationStore {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            state: Store::new(NotificationState::default()),
        }
    }

    pub fn snapshot(&self) -> NotificationState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.state.subscribe()
    }

    pub async fn fetch_notifications(&self, user_id: &str) {
        self.state.begin_loading();

        match self.try_fetch_notifications(user_id).await {
            Ok(notifications) => self.state.update(|state| {
                state.notifications = notifications;
                state.recount();
                state.is_loading = false;
            }),
            Err(error) => self.state.fail("fetch_notifications", error, true),
        }
    }

    pub async fn mark_as_read(&self, notification_id: &str) {
        let result = self
            .backend
            .from(tables::NOTIFICATIONS)
            .update(&NotificationUpdate { read: Some(true) })
            .eq("id", notification_id)
            .execute_empty()
            .await;

        match result {
            Ok(()) => self.state.update(|state| {
                for notification in state
                    .notifications
                    .iter_mut()
                    .filter(|notification| notification.id == notification_id)
                {
                    notification.read = true;
                }
                state.recount();
            }),
            Err(error) => self.state.fail("mark_as_read", error.into(), false),
        }
    }

    /// Does nothing when signed out
    pub async fn mark_all_as_read(&self) {
        match self.try_mark_all_as_read().await {
            Ok(true) => self.state.update(|state| {
                for notification in state.notifications.iter_mut() {
                    notification.read = true;
                }
                state.unread_count = 0;
            }),
            Ok(false) => {}
            Err(error) => self.state.fail("mark_all_as_read", error, false),
        }
    }

    async fn try_fetch_notifications(&self, user_id: &str) -> Result<Vec<Notification>, StoreError> {
        let rows = self
            .backend
            .from(tables::NOTIFICATIONS)
            .select(NOTIFICATION_COLUMNS)
            .eq("user_id", user_id)
            .order("created_at", false)
            .execute::<NotificationWithSenderRow>()
            .await?;

        Ok(rows.into_iter().map(notification_from_row).collect())
    }

    async fn try_mark_all_as_read(&self) -> Result<bool, StoreError> {
        let Some(user) = self.backend.get_user().await? else {
            return Ok(false);
        };

        self.backend
            .from(tables::NOTIFICATIONS)
            .update(&NotificationUpdate { read: Some(true) })
            .eq("user_id", &user.id)
            .eq("read", false)
            .execute_empty()
            .await?;

        Ok(true)
    }
}
