//! UI-ready view models
//!
//! Serialized camelCase; timestamps are milliseconds since the Unix epoch.

use serde::{Deserialize, Serialize};

/// Profile of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub bio: String,
    pub followers: i64,
    pub following: i64,
    pub created_at: i64,
}

/// Feed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub user_id: String,
    pub username: String,
    #[serde(rename = "userPhotoURL")]
    pub user_photo_url: String,
    #[serde(rename = "videoURL")]
    pub video_url: String,
    #[serde(rename = "thumbnailURL")]
    pub thumbnail_url: String,
    pub description: String,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub created_at: i64,
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub video_id: String,
    pub user_id: String,
    pub username: String,
    #[serde(rename = "userPhotoURL")]
    pub user_photo_url: String,
    pub text: String,
    pub likes: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    /// Not stored remotely; empty for fetched history
    pub receiver_id: String,
    pub text: String,
    pub created_at: i64,
    pub read: bool,
}

/// Conversation as seen by one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub participants: Vec<String>,
    pub last_message: String,
    pub last_message_time: i64,
    pub unread_count: i64,
}

/// Kind of activity a notification reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    Like,
    Comment,
    Follow,
    Message,
    /// Value the client does not know about yet
    Other(String),
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
            Self::Message => "message",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "like" => Self::Like,
            "comment" => Self::Comment,
            "follow" => Self::Follow,
            "message" => Self::Message,
            _ => Self::Other(value),
        }
    }
}

impl From<NotificationType> for String {
    fn from(value: NotificationType) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub from_user_id: String,
    pub from_username: String,
    #[serde(rename = "fromUserPhotoURL")]
    pub from_user_photo_url: String,
    pub content_id: Option<String>,
    pub text: String,
    pub read: bool,
    pub created_at: i64,
}
