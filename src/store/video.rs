//! Video store: feed, likes, comments

use std::sync::Arc;

use tokio::sync::watch;

use super::{LoadState, Store, StoreError};
use crate::backend::BackendClient;
use crate::data::{
    Comment, CommentInsert, CommentRow, CommentWithAuthorRow, LikeInsert, Video, VideoIdArgs,
    VideoWithAuthorRow, comment_from_row, functions, tables, video_from_row,
};

const FEED_COLUMNS: &str = "
    *,
    users (
        id,
        username,
        photo_url
    )
";

const COMMENT_COLUMNS: &str = "
    *,
    users (
        username,
        photo_url
    )
";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoState {
    pub videos: Vec<Video>,
    pub current_video: Option<Video>,
    pub comments: Vec<Comment>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl LoadState for VideoState {
    fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }
}

impl VideoState {
    /// Apply `patch` to the video everywhere it is shown
    fn patch_video(&mut self, video_id: &str, patch: impl Fn(&mut Video)) {
        for video in self.videos.iter_mut().filter(|video| video.id == video_id) {
            patch(video);
        }
        if let Some(current) = self.current_video.as_mut().filter(|video| video.id == video_id) {
            patch(current);
        }
    }
}

pub struct VideoStore {
    backend: Arc<BackendClient>,
    state: Store<VideoState>,
}

impl VideoStore {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self {
            backend,
            state: Store::new(VideoState::default()),
        }
    }

    pub fn snapshot(&self) -> VideoState {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<VideoState> {
        self.state.subscribe()
    }

    /// Load the feed, newest first
    pub async fn fetch_videos(&self) {
        self.state.begin_loading();

        match self.try_fetch_videos().await {
            Ok(videos) => self.state.update(|state| {
                state.videos = videos;
                state.is_loading = false;
            }),
            Err(error) => self.state.fail("fetch_videos", error, true),
        }
    }

    /// Focus a loaded video; unknown ids clear the focus
    pub fn set_current_video(&self, video_id: &str) {
        self.state.update(|state| {
            state.current_video = state
                .videos
                .iter()
                .find(|video| video.id == video_id)
                .cloned();
        });
    }

    /// Like a video once
    ///
    /// Liking an already-liked video is a silent no-op.
    pub async fn like_video(&self, video_id: &str) {
        match self.try_like_video(video_id).await {
            Ok(true) => self.state.update(|state| {
                state.patch_video(video_id, |video| video.likes += 1);
            }),
            Ok(false) => {}
            Err(error) => self.state.fail("like_video", error, false),
        }
    }

    pub async fn add_comment(
        &self,
        video_id: &str,
        user_id: &str,
        username: &str,
        user_photo_url: &str,
        text: &str,
    ) {
        let result = self.try_add_comment(video_id, user_id, text).await;

        match result {
            Ok(row) => {
                let comment = Comment {
                    id: row.id,
                    video_id: video_id.to_string(),
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                    user_photo_url: user_photo_url.to_string(),
                    text: text.to_string(),
                    likes: 0,
                    created_at: row.created_at.timestamp_millis(),
                };
                self.state.update(|state| {
                    state.comments.insert(0, comment);
                    state.patch_video(video_id, |video| video.comments += 1);
                });
            }
            Err(error) => self.state.fail("add_comment", error, false),
        }
    }

    /// Load comments of a video, newest first
    pub async fn fetch_comments(&self, video_id: &str) {
        self.state.begin_loading();

        match self.try_fetch_comments(video_id).await {
            Ok(comments) => self.state.update(|state| {
                state.comments = comments;
                state.is_loading = false;
            }),
            Err(error) => self.state.fail("fetch_comments", error, true),
        }
    }

    async fn try_fetch_videos(&self) -> Result<Vec<Video>, StoreError> {
        let rows = self
            .backend
            .from(tables::VIDEOS)
            .select(FEED_COLUMNS)
            .order("created_at", false)
            .execute::<VideoWithAuthorRow>()
            .await?;

        Ok(rows.into_iter().map(video_from_row).collect())
    }

    /// `Ok(false)` when the like already existed
    async fn try_like_video(&self, video_id: &str) -> Result<bool, StoreError> {
        let user = self
            .backend
            .get_user()
            .await?
            .ok_or(StoreError::NotAuthenticated)?;

        let inserted = self
            .backend
            .from(tables::LIKES)
            .insert(&LikeInsert {
                user_id: &user.id,
                video_id,
            })
            .execute_empty()
            .await;

        match inserted {
            Ok(()) => {}
            Err(error) if error.is_unique_violation() => {
                tracing::debug!(%video_id, user_id = %user.id, "Video already liked");
                return Ok(false);
            }
            Err(error) => return Err(error.into()),
        }

        if let Err(error) = self
            .backend
            .rpc(functions::INCREMENT_VIDEO_LIKES, &VideoIdArgs { video_id })
            .await
        {
            tracing::warn!(%error, %video_id, "Failed to increment like counter");
        }

        Ok(true)
    }

    async fn try_add_comment(
        &self,
        video_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<CommentRow, StoreError> {
        let row = self
            .backend
            .from(tables::COMMENTS)
            .insert(&CommentInsert {
                video_id,
                user_id,
                text,
            })
            .select("*")
            .single::<CommentRow>()
            .await?;

        if let Err(error) = self
            .backend
            .rpc(functions::INCREMENT_VIDEO_COMMENTS, &VideoIdArgs { video_id })
            .await
        {
            tracing::warn!(%error, %video_id, "Failed to increment comment counter");
        }

        Ok(row)
    }

    async fn try_fetch_comments(&self, video_id: &str) -> Result<Vec<Comment>, StoreError> {
        let rows = self
            .backend
            .from(tables::COMMENTS)
            .select(COMMENT_COLUMNS)
            .eq("video_id", video_id)
            .order("created_at", false)
            .execute::<CommentWithAuthorRow>()
            .await?;

        Ok(rows.into_iter().map(comment_from_row).collect())
    }
}
