//! In-memory adapters for local runs and tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::{
    pagination::CommentCursor,
    repos::{CommentsRepo, CreateCommentParams, RepoError, UpdateCommentParams},
    stores::{ImageStore, ImageStoreError},
};
use crate::domain::entities::CommentRecord;

#[derive(Clone, Default)]
pub struct MemoryCommentsRepo {
    rows: Arc<RwLock<BTreeMap<Uuid, CommentRecord>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryCommentsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed record, bypassing identifier and timestamp
    /// assignment.
    pub async fn insert(&self, record: CommentRecord) {
        let mut guard = self.rows.write().await;
        guard.insert(record.id, record);
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Make every subsequent call fail as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("comment store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryCommentsRepo {
    async fn create_comment(&self, params: CreateCommentParams) -> Result<Uuid, RepoError> {
        self.ensure_available()?;
        let now = OffsetDateTime::now_utc();
        let record = CommentRecord {
            id: Uuid::new_v4(),
            tweet_id: params.tweet_id,
            author_id: params.author_id,
            text: params.text,
            image_name: params.image_name,
            created_at: now,
            updated_at: now,
        };
        let id = record.id;
        self.insert(record).await;
        Ok(id)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        self.ensure_available()?;
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_for_tweet(
        &self,
        tweet_id: Uuid,
        after: CommentCursor,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        self.ensure_available()?;
        let after_key = (after.created_at(), after.id());
        let guard = self.rows.read().await;
        let mut rows: Vec<CommentRecord> = guard
            .values()
            .filter(|record| record.tweet_id == tweet_id)
            .filter(|record| (record.created_at, record.id) > after_key)
            .cloned()
            .collect();
        rows.sort_by_key(|record| (record.created_at, record.id));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn update_comment(
        &self,
        params: UpdateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        self.ensure_available()?;
        let mut guard = self.rows.write().await;
        let record = guard.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.text = params.text;
        record.image_name = params.image_name;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool, RepoError> {
        self.ensure_available()?;
        Ok(self.rows.write().await.remove(&id).is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub data: Bytes,
    pub content_type: String,
}

/// Image store keeping blobs in a map and handing out `memory://` URLs.
#[derive(Clone, Default)]
pub struct MemoryImageStore {
    blobs: Arc<RwLock<HashMap<String, StoredImage>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, name: &str) -> Option<StoredImage> {
        self.blobs.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ImageStoreError> {
        if self.is_unavailable() {
            return Err(ImageStoreError::upload(name, "image store unavailable"));
        }
        let image = StoredImage {
            data,
            content_type: content_type.to_string(),
        };
        self.blobs.write().await.insert(name.to_string(), image);
        Ok(())
    }

    async fn url(&self, name: &str, expires_in: Duration) -> Result<String, ImageStoreError> {
        if self.is_unavailable() {
            return Err(ImageStoreError::presign(name, "image store unavailable"));
        }
        Ok(format!(
            "memory://images/{name}?expires_in={}",
            expires_in.as_secs()
        ))
    }

    async fn delete(&self, name: &str) -> Result<(), ImageStoreError> {
        if self.is_unavailable() {
            return Err(ImageStoreError::delete(name, "image store unavailable"));
        }
        self.blobs.write().await.remove(name);
        Ok(())
    }
}
