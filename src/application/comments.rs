//! Comment orchestration across the durable store, the read cache and image
//! storage.
//!
//! Write ordering is fixed: images are uploaded before the row that references
//! them, the cache entry is invalidated only after the durable write succeeds,
//! and superseded images are removed last. Cache failures never reach the
//! caller; durable-store and image-store failures always do.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use metrics::counter;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::pagination::{CommentCursor, CursorPage, PaginationError};
use crate::application::repos::{
    CommentsRepo, CreateCommentParams, RepoError, UpdateCommentParams,
};
use crate::application::stores::{CommentCache, ImageStore, ImageStoreError};
use crate::domain::entities::CommentRecord;
use crate::domain::images::ImagePayload;


pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = match NonZeroU32::new(10) {
    Some(size) => size,
    None => unreachable!(),
};
pub const DEFAULT_IMAGE_URL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub const CACHE_HIT_METRIC: &str = "commentary_comment_cache_hit_total";
pub const CACHE_MISS_METRIC: &str = "commentary_comment_cache_miss_total";
pub const CACHE_ERROR_METRIC: &str = "commentary_comment_cache_error_total";

/// Tunables the orchestrator depends on.
#[derive(Debug, Clone, Copy)]
pub struct CommentSettings {
    pub cache_ttl: Duration,
    pub page_size: NonZeroU32,
    pub image_url_ttl: Duration,
}

impl Default for CommentSettings {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            page_size: DEFAULT_PAGE_SIZE,
            image_url_ttl: DEFAULT_IMAGE_URL_TTL,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error("comment store: {0}")]
    Comments(#[from] RepoError),
    #[error("image store: {0}")]
    Images(#[from] ImageStoreError),
}

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("comment not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("malformed cursor: {0}")]
    MalformedCursor(#[from] PaginationError),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageFailure),
}

impl From<RepoError> for CommentError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => Self::NotFound,
            other => Self::StorageUnavailable(StorageFailure::Comments(other)),
        }
    }
}

impl From<ImageStoreError> for CommentError {
    fn from(err: ImageStoreError) -> Self {
        Self::StorageUnavailable(StorageFailure::Images(err))
    }
}

#[derive(Debug, Clone)]
pub struct CreateCommentCommand {
    pub tweet_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Clone)]
pub struct UpdateCommentCommand {
    pub comment_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub image: Option<ImagePayload>,
}

/// A comment as returned to callers, with a freshly signed image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentView {
    pub record: CommentRecord,
    pub image_url: Option<String>,
}

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentsRepo>,
    cache: Arc<dyn CommentCache>,
    images: Arc<dyn ImageStore>,
    settings: CommentSettings,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentsRepo>,
        cache: Arc<dyn CommentCache>,
        images: Arc<dyn ImageStore>,
        settings: CommentSettings,
    ) -> Self {
        Self {
            comments,
            cache,
            images,
            settings,
        }
    }

    pub async fn create_comment(&self, command: CreateCommentCommand) -> Result<Uuid, CommentError> {
        let CreateCommentCommand {
            tweet_id,
            author_id,
            text,
            image,
        } = command;

        let image_name = match image.as_ref() {
            Some(image) => Some(self.upload_image(image).await?),
            None => None,
        };

        let params = CreateCommentParams {
            tweet_id,
            author_id,
            text,
            image_name: image_name.clone(),
        };

        match self.comments.create_comment(params).await {
            Ok(id) => {
                info!(
                    target = "commentary::application::comments",
                    comment_id = %id,
                    tweet_id = %tweet_id,
                    has_image = image_name.is_some(),
                    "comment created"
                );
                Ok(id)
            }
            Err(err) => {
                if let Some(name) = image_name.as_deref() {
                    self.discard_image(name).await;
                }
                Err(err.into())
            }
        }
    }

    /// Cache-aside read of a single comment.
    pub async fn get_comment(&self, id: Uuid) -> Result<CommentView, CommentError> {
        if let Some(record) = self.cached(id).await {
            return self.present(record).await;
        }

        let record = self
            .comments
            .find_comment(id)
            .await?
            .ok_or(CommentError::NotFound)?;

        if let Err(err) = self.cache.set(&record, self.settings.cache_ttl).await {
            counter!(CACHE_ERROR_METRIC).increment(1);
            warn!(
                target = "commentary::application::comments",
                comment_id = %id,
                error = %err,
                "failed to populate comment cache"
            );
        }

        self.present(record).await
    }

    /// One page of a tweet's comments in `(created_at, id)` order.
    ///
    /// An empty `cursor` starts from the beginning. The returned cursor is
    /// `None` only when the page is empty.
    pub async fn list_tweet_comments(
        &self,
        tweet_id: Uuid,
        cursor: &str,
    ) -> Result<CursorPage<CommentView>, CommentError> {
        let after = CommentCursor::parse(cursor)?;
        let records = self
            .comments
            .list_for_tweet(tweet_id, after, self.settings.page_size.get())
            .await?;

        let next_cursor = records
            .last()
            .map(|record| CommentCursor::new(record.created_at, record.id).encode());

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            items.push(self.present(record).await?);
        }

        debug!(
            target = "commentary::application::comments",
            tweet_id = %tweet_id,
            from_start = after.is_start(),
            returned = items.len(),
            "listed tweet comments"
        );

        Ok(CursorPage::new(items, next_cursor))
    }

    pub async fn update_comment(
        &self,
        command: UpdateCommentCommand,
    ) -> Result<CommentView, CommentError> {
        let UpdateCommentCommand {
            comment_id,
            author_id,
            text,
            image,
        } = command;

        let current = self.owned_comment(comment_id, author_id, "update").await?;

        let replacement = match image.as_ref() {
            Some(image) => Some(self.upload_image(image).await?),
            None => None,
        };

        let params = UpdateCommentParams {
            id: current.id,
            text,
            image_name: replacement.clone().or_else(|| current.image_name.clone()),
        };

        let updated = match self.comments.update_comment(params).await {
            Ok(updated) => updated,
            Err(err) => {
                if let Some(name) = replacement.as_deref() {
                    self.discard_image(name).await;
                }
                return Err(err.into());
            }
        };

        self.invalidate(updated.id).await;

        if replacement.is_some()
            && let Some(previous) = current.image_name.as_deref()
            && let Err(err) = self.images.delete(previous).await
        {
            error!(
                target = "commentary::application::comments",
                comment_id = %updated.id,
                image_name = previous,
                error = %err,
                "replaced image could not be deleted; blob is orphaned"
            );
        }

        info!(
            target = "commentary::application::comments",
            comment_id = %updated.id,
            image_replaced = replacement.is_some(),
            "comment updated"
        );

        self.present(updated).await
    }

    pub async fn delete_comment(&self, comment_id: Uuid, author_id: Uuid) -> Result<(), CommentError> {
        let current = self.owned_comment(comment_id, author_id, "delete").await?;

        if !self.comments.delete_comment(current.id).await? {
            return Err(CommentError::NotFound);
        }

        self.invalidate(current.id).await;

        if let Some(name) = current.image_name.as_deref() {
            self.images.delete(name).await.map_err(|err| {
                error!(
                    target = "commentary::application::comments",
                    comment_id = %current.id,
                    image_name = name,
                    error = %err,
                    "comment deleted but its image could not be removed"
                );
                CommentError::from(err)
            })?;
        }

        info!(
            target = "commentary::application::comments",
            comment_id = %current.id,
            "comment deleted"
        );
        Ok(())
    }

    async fn owned_comment(
        &self,
        id: Uuid,
        user_id: Uuid,
        action: &'static str,
    ) -> Result<CommentRecord, CommentError> {
        let record = self
            .comments
            .find_comment(id)
            .await?
            .ok_or(CommentError::NotFound)?;

        if !record.is_owned_by(user_id) {
            warn!(
                target = "commentary::application::comments",
                comment_id = %id,
                user_id = %user_id,
                action,
                "permission denied"
            );
            return Err(CommentError::PermissionDenied);
        }

        Ok(record)
    }

    async fn cached(&self, id: Uuid) -> Option<CommentRecord> {
        match self.cache.get(id).await {
            Ok(Some(record)) => {
                counter!(CACHE_HIT_METRIC).increment(1);
                debug!(
                    target = "commentary::application::comments",
                    comment_id = %id,
                    "comment served from cache"
                );
                Some(record)
            }
            Ok(None) => {
                counter!(CACHE_MISS_METRIC).increment(1);
                None
            }
            Err(err) => {
                counter!(CACHE_ERROR_METRIC).increment(1);
                warn!(
                    target = "commentary::application::comments",
                    comment_id = %id,
                    error = %err,
                    "comment cache lookup failed; reading from store"
                );
                None
            }
        }
    }

    async fn invalidate(&self, id: Uuid) {
        if let Err(err) = self.cache.delete(id).await {
            counter!(CACHE_ERROR_METRIC).increment(1);
            warn!(
                target = "commentary::application::comments",
                comment_id = %id,
                error = %err,
                "failed to invalidate cached comment"
            );
        }
    }

    async fn upload_image(&self, image: &ImagePayload) -> Result<String, CommentError> {
        let name = image.blob_name();
        self.images
            .put(&name, image.data().clone(), image.content_type())
            .await?;
        Ok(name)
    }

    async fn discard_image(&self, name: &str) {
        if let Err(err) = self.images.delete(name).await {
            warn!(
                target = "commentary::application::comments",
                image_name = name,
                error = %err,
                "failed to remove image uploaded for an aborted write"
            );
        }
    }

    async fn present(&self, record: CommentRecord) -> Result<CommentView, CommentError> {
        let image_url = match record.image_name.as_deref() {
            Some(name) => Some(self.images.url(name, self.settings.image_url_ttl).await?),
            None => None,
        };
        Ok(CommentView { record, image_url })
    }
}
