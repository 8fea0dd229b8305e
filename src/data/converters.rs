//! Conversion functions from remote rows to view models

use chrono::{DateTime, Utc};

use super::models::*;
use super::views::*;

/// Epoch milliseconds; a missing timestamp maps to 0
pub fn epoch_millis(timestamp: Option<&DateTime<Utc>>) -> i64 {
    timestamp.map(DateTime::timestamp_millis).unwrap_or(0)
}

pub fn user_from_row(row: UserRow) -> User {
    User {
        created_at: row.created_at.timestamp_millis(),
        id: row.id,
        username: row.username,
        email: row.email,
        display_name: row.display_name,
        photo_url: row.photo_url,
        bio: row.bio,
        followers: row.followers,
        following: row.following,
    }
}

/// Missing author embeds (deleted user, RLS-hidden row) give empty names
pub fn video_from_row(row: VideoWithAuthorRow) -> Video {
    let author = row.users.unwrap_or_default();
    let video = row.video;

    Video {
        created_at: video.created_at.timestamp_millis(),
        id: video.id,
        user_id: video.user_id,
        username: author.username,
        user_photo_url: author.photo_url,
        video_url: video.video_url,
        thumbnail_url: video.thumbnail_url,
        description: video.description,
        likes: video.likes,
        comments: video.comments_count,
        shares: video.shares,
        hashtags: video.hashtags,
    }
}

pub fn comment_from_row(row: CommentWithAuthorRow) -> Comment {
    let author = row.users.unwrap_or_default();
    let comment = row.comment;

    Comment {
        created_at: comment.created_at.timestamp_millis(),
        id: comment.id,
        video_id: comment.video_id,
        user_id: comment.user_id,
        username: author.username,
        user_photo_url: author.photo_url,
        text: comment.text,
        likes: comment.likes,
    }
}

/// Receiver is not stored remotely
pub fn message_from_row(row: MessageRow) -> Message {
    Message {
        created_at: row.created_at.timestamp_millis(),
        id: row.id,
        sender_id: row.sender_id,
        receiver_id: String::new(),
        text: row.text,
        read: row.read,
    }
}

/// Chat list entry for one participation of the current user
pub fn chat_from_participation(row: ParticipationWithChatRow, participants: Vec<String>) -> Chat {
    let chat = row.chats.unwrap_or_default();

    Chat {
        id: row.participant.chat_id,
        participants,
        last_message: chat.last_message,
        last_message_time: epoch_millis(chat.last_message_time.as_ref()),
        unread_count: row.participant.unread_count,
    }
}

/// Open conversation; unread is reset since the user is looking at it
pub fn chat_from_row(row: ChatWithParticipantsRow) -> Chat {
    Chat {
        last_message_time: epoch_millis(row.chat.last_message_time.as_ref()),
        id: row.chat.id,
        participants: row
            .chat_participants
            .into_iter()
            .map(|participant| participant.user_id)
            .collect(),
        last_message: row.chat.last_message,
        unread_count: 0,
    }
}

pub fn notification_from_row(row: NotificationWithSenderRow) -> Notification {
    let sender = row.from_user.unwrap_or_default();
    let notification = row.notification;

    Notification {
        created_at: notification.created_at.timestamp_millis(),
        id: notification.id,
        user_id: notification.user_id,
        notification_type: NotificationType::from(notification.notification_type),
        from_user_id: notification.from_user_id,
        from_username: sender.username,
        from_user_photo_url: sender.photo_url,
        content_id: notification.content_id,
        text: notification.text,
        read: notification.read,
    }
}
