//! Remote table shapes
//!
//! One `*Row` per table as returned by `select *`, an `*Insert` whose
//! absent optional fields are omitted so column defaults apply, and an
//! `*Update` patch where the table allows updates. Embedded-resource
//! rows (`select *,users(...)`) are modelled as separate structs with
//! the base row flattened in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Table names
// =============================================================================

pub mod tables {
    pub const USERS: &str = "users";
    pub const VIDEOS: &str = "videos";
    pub const COMMENTS: &str = "comments";
    pub const MESSAGES: &str = "messages";
    pub const CHATS: &str = "chats";
    pub const CHAT_PARTICIPANTS: &str = "chat_participants";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const FOLLOWS: &str = "follows";
    pub const LIKES: &str = "likes";
}

/// Database functions called through rpc
pub mod functions {
    pub const INCREMENT_VIDEO_LIKES: &str = "increment_video_likes";
    pub const INCREMENT_VIDEO_COMMENTS: &str = "increment_video_comments";
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// users
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub photo_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bio: String,
    #[serde(default)]
    pub followers: i64,
    #[serde(default)]
    pub following: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserInsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub username: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `users(id, username, photo_url)` embedded in another row
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AuthorEmbed {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub photo_url: String,
}

// =============================================================================
// videos
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRow {
    pub id: String,
    pub user_id: String,
    pub video_url: String,
    pub thumbnail_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(default)]
    pub shares: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

/// `select *, users(id, username, photo_url)` on videos
#[derive(Debug, Clone, Deserialize)]
pub struct VideoWithAuthorRow {
    #[serde(flatten)]
    pub video: VideoRow,
    #[serde(default)]
    pub users: Option<AuthorEmbed>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoInsert {
    pub user_id: String,
    pub video_url: String,
    pub thumbnail_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VideoUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashtags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares: Option<i64>,
}

/// Argument of the counter functions
#[derive(Debug, Clone, Serialize)]
pub struct VideoIdArgs<'a> {
    pub video_id: &'a str,
}

// =============================================================================
// comments
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: String,
    pub video_id: String,
    pub user_id: String,
    pub text: String,
    #[serde(default)]
    pub likes: i64,
    pub created_at: DateTime<Utc>,
}

/// `select *, users(username, photo_url)` on comments
#[derive(Debug, Clone, Deserialize)]
pub struct CommentWithAuthorRow {
    #[serde(flatten)]
    pub comment: CommentRow,
    #[serde(default)]
    pub users: Option<AuthorEmbed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentInsert<'a> {
    pub video_id: &'a str,
    pub user_id: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CommentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
}

// =============================================================================
// messages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageInsert<'a> {
    pub chat_id: &'a str,
    pub sender_id: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

// =============================================================================
// chats / chat_participants
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRow {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_message: String,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// `chats(id, last_message, last_message_time)` embedded in a participation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatEmbed {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_message: String,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
}

/// `select *, chat_participants(user_id)` on chats
#[derive(Debug, Clone, Deserialize)]
pub struct ChatWithParticipantsRow {
    #[serde(flatten)]
    pub chat: ChatRow,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chat_participants: Vec<ParticipantUserId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatInsert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatParticipantRow {
    pub id: String,
    pub chat_id: String,
    pub user_id: String,
    #[serde(default)]
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
}

/// `select *, chats(id, last_message, last_message_time)` on chat_participants
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipationWithChatRow {
    #[serde(flatten)]
    pub participant: ChatParticipantRow,
    #[serde(default)]
    pub chats: Option<ChatEmbed>,
}

/// `select user_id` on chat_participants
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParticipantUserId {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatParticipantInsert<'a> {
    pub chat_id: &'a str,
    pub user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatParticipantUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<i64>,
}

// =============================================================================
// notifications
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub from_user_id: String,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// `select *, from_user:users!notifications_from_user_id_fkey(username, photo_url)`
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationWithSenderRow {
    #[serde(flatten)]
    pub notification: NotificationRow,
    #[serde(default)]
    pub from_user: Option<AuthorEmbed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationInsert<'a> {
    pub user_id: &'a str,
    #[serde(rename = "type")]
    pub notification_type: &'a str,
    pub from_user_id: &'a str,
    pub content_id: Option<&'a str>,
    pub text: &'a str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

// =============================================================================
// follows / likes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowRow {
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowInsert<'a> {
    pub follower_id: &'a str,
    pub following_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikeRow {
    pub id: String,
    pub user_id: String,
    pub video_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeInsert<'a> {
    pub user_id: &'a str,
    pub video_id: &'a str,
}
