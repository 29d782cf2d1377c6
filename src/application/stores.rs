//! Ports for the read cache and the image blob store.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::CommentRecord;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Backend(String),
    #[error("cached payload could not be encoded or decoded: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("cache ttl of {0:?} cannot be represented")]
    TtlOutOfRange(Duration),
}

impl CacheError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Cache key under which a comment snapshot is stored.
pub fn comment_cache_key(id: Uuid) -> String {
    format!("comment:{id}")
}

/// Volatile, non-authoritative comment snapshots.
///
/// Every call may fail independently; callers treat failures as misses.
#[async_trait]
pub trait CommentCache: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<CommentRecord>, CacheError>;

    async fn set(&self, record: &CommentRecord, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, id: Uuid) -> Result<(), CacheError>;
}

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("failed to upload image `{name}`: {message}")]
    Upload { name: String, message: String },
    #[error("failed to delete image `{name}`: {message}")]
    Delete { name: String, message: String },
    #[error("failed to sign retrieval url for image `{name}`: {message}")]
    Presign { name: String, message: String },
}

impl ImageStoreError {
    pub fn upload(name: &str, message: impl Into<String>) -> Self {
        Self::Upload {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn delete(name: &str, message: impl Into<String>) -> Self {
        Self::Delete {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn presign(name: &str, message: impl Into<String>) -> Self {
        Self::Presign {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Blob storage for comment images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn put(&self, name: &str, data: Bytes, content_type: &str)
    -> Result<(), ImageStoreError>;

    /// Time-limited retrieval URL for a stored image.
    async fn url(&self, name: &str, expires_in: Duration) -> Result<String, ImageStoreError>;

    async fn delete(&self, name: &str) -> Result<(), ImageStoreError>;
}
