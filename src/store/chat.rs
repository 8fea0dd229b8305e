//! Chat store: conversation list, history, sending, read receipts

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use super::{LoadState, Store, StoreError};
use crate::backend::BackendClient;
use crate::data::{
    Chat, ChatParticipantUpdate, ChatUpdate, ChatWithParticipantsRow, Message, MessageInsert,
    MessageRow, MessageUpdate, ParticipantUserId, ParticipationWithChatRow, chat_from_participation,
    chat_from_row, message_from_row, tables,
};

/// Concurrent participant lookups per `fetch_chats`
const PARTICIPANT_LOOKUPS: usize = 8;

const PARTICIPATION_COLUMNS: &str = "
    *,
    chats (
        id,
        last_message,
        last_message_time
    )
";

const CHAT_COLUMNS: &str = "
    *,
    chat_participants (
        user_id
    )
";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub chats: Vec<Chat>,
    pub current_chat: Option<Chat>,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl LoadState for ChatState {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
}

pub struct ChatStore {
    backend: Arc<BackendClient>,
    state: Store<ChatState>,
}

impl ChatStore {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            state: Store::new(ChatState::default()),
        }
    }

    pub fn snapshot(&self) -> ChatState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    /// Load the conversations `user_id` takes part in
    pub async fn fetch_chats(&self, user_id: &str) {
        self.state.begin_loading();

        match self.try_fetch_chats(user_id).await {
            Ok(chats) => self.state.update(|state| {
                state.chats = chats;
                state.is_loading = false;
            }),
            Err(error) => self.state.fail("fetch_chats", error, true),
        }
    }

    /// Load the history of one conversation and open it
    pub async fn fetch_messages(&self, chat_id: &str) {
        self.state.begin_loading();

        match self.try_fetch_messages(chat_id).await {
            Ok((messages, chat)) => self.state.update(|state| {
                state.messages = messages;
                state.current_chat = Some(chat);
                state.is_loading = false;
            }),
            Err(error) => self.state.fail("fetch_messages", error, true),
        }
    }

    pub async fn send_message(&self, chat_id: &str, sender_id: &str, receiver_id: &str, text: &str) {
        match self.try_send_message(chat_id, sender_id, text).await {
            Ok(row) => {
                let message = Message {
                    id: row.id,
                    sender_id: sender_id.to_string(),
                    receiver_id: receiver_id.to_string(),
                    text: text.to_string(),
                    created_at: row.created_at.timestamp_millis(),
                    read: false,
                };
                let now = Utc::now().timestamp_millis();

                self.state.update(|state| {
                    state.messages.push(message);
                    let touched = state
                        .chats
                        .iter_mut()
                        .chain(state.current_chat.as_mut())
                        .filter(|chat| chat.id == chat_id);
                    for chat in touched {
                        chat.last_message = text.to_string();
                        chat.last_message_time = now;
                    }
                });
            }
            Err(error) => self.state.fail("send_message", error, false),
        }
    }

    /// Reset the current user's unread count and mark the history read
    ///
    /// Does nothing when signed out.
    pub async fn mark_chat_as_read(&self, chat_id: &str) {
        match self.try_mark_chat_as_read(chat_id).await {
            Ok(true) => self.state.update(|state| {
                for chat in state.chats.iter_mut().filter(|chat| chat.id == chat_id) {
                    chat.unread_count = 0;
                }
                for message in state.messages.iter_mut() {
                    message.read = true;
                }
            }),
            Ok(false) => {}
            Err(error) => self.state.fail("mark_chat_as_read", error, false),
        }
    }

    async fn try_fetch_chats(&self, user_id: &str) -> Result<Vec<Chat>, StoreError> {
        let participations = self
            .backend
            .from(tables::CHAT_PARTICIPANTS)
            .select(PARTICIPATION_COLUMNS)
            .eq("user_id", user_id)
            .order("created_at", false)
            .execute::<ParticipationWithChatRow>()
            .await?;

        // Lookups run concurrently; `buffered` keeps them in chat order
        let participants: Vec<Vec<String>> = stream::iter(&participations)
            .map(|participation| self.participants_of(&participation.participant.chat_id))
            .buffered(PARTICIPANT_LOOKUPS)
            .collect()
            .await;

        Ok(participations
            .into_iter()
            .zip(participants)
            .map(|(participation, participants)| chat_from_participation(participation, participants))
            .collect())
    }

    /// A failed lookup yields no participants rather than failing the list
    async fn participants_of(&self, chat_id: &str) -> Vec<String> {
        let result = self
            .backend
            .from(tables::CHAT_PARTICIPANTS)
            .select("user_id")
            .eq("chat_id", chat_id)
            .execute::<ParticipantUserId>()
            .await;

        match result {
            Ok(rows) => rows.into_iter().map(|row| row.user_id).collect(),
            Err(error) => {
                tracing::warn!(%error, %chat_id, "Failed to load chat participants");
                Vec::new()
            }
        }
    }

    async fn try_fetch_messages(&self, chat_id: &str) -> Result<(Vec<Message>, Chat), StoreError> {
        let messages = self
            .backend
            .from(tables::MESSAGES)
            .select("*")
            .eq("chat_id", chat_id)
            .order("created_at", true)
            .execute::<MessageRow>()
            .await?;

        let chat = self
            .backend
            .from(tables::CHATS)
            .select(CHAT_COLUMNS)
            .eq("id", chat_id)
            .single::<ChatWithParticipantsRow>()
            .await?;

        Ok((
            messages.into_iter().map(message_from_row).collect(),
            chat_from_row(chat),
        ))
    }

    async fn try_send_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: &str,
    ) -> Result<MessageRow, StoreError> {
        let row = self
            .backend
            .from(tables::MESSAGES)
            .insert(&MessageInsert {
                chat_id,
                sender_id,
                text,
            })
            .select("*")
            .single::<MessageRow>()
            .await?;

        let summary = ChatUpdate {
            last_message: Some(text.to_string()),
            last_message_time: Some(Utc::now()),
        };
        if let Err(error) = self
            .backend
            .from(tables::CHATS)
            .update(&summary)
            .eq("id", chat_id)
            .execute_empty()
            .await
        {
            tracing::warn!(%error, %chat_id, "Failed to update chat summary");
        }

        Ok(row)
    }

    /// `Ok(false)` when there is no signed-in user
    async fn try_mark_chat_as_read(&self, chat_id: &str) -> Result<bool, StoreError> {
        let Some(user) = self.backend.get_user().await? else {
            return Ok(false);
        };

        self.backend
            .from(tables::CHAT_PARTICIPANTS)
            .update(&ChatParticipantUpdate {
                unread_count: Some(0),
            })
            .eq("chat_id", chat_id)
            .eq("user_id", &user.id)
            .execute_empty()
            .await?;

        self.backend
            .from(tables::MESSAGES)
            .update(&MessageUpdate {
                read: Some(true),
                ..Default::default()
            })
            .eq("chat_id", chat_id)
            .execute_empty()
            .await?;

        Ok(true)
    }
}
