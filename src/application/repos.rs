//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::CommentCursor;
use crate::domain::entities::CommentRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub tweet_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub image_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateCommentParams {
    pub id: Uuid,
    pub text: String,
    pub image_name: Option<String>,
}

/// Durable, authoritative comment storage.
#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Insert a comment and return the identifier assigned by the store.
    async fn create_comment(&self, params: CreateCommentParams) -> Result<Uuid, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    /// Comments of `tweet_id` ordered by `(created_at, id)` ascending, starting
    /// strictly after `after`, at most `limit` rows.
    async fn list_for_tweet(
        &self,
        tweet_id: Uuid,
        after: CommentCursor,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    /// Replace text and image reference and refresh `updated_at`.
    ///
    /// Returns [`RepoError::NotFound`] when the row no longer exists.
    async fn update_comment(&self, params: UpdateCommentParams)
    -> Result<CommentRecord, RepoError>;

    /// Remove the row, returning `false` when nothing was deleted.
    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepoError>;
}
