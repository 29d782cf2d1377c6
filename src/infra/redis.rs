//! Redis-backed comment cache.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::{
    RedisConnectionManager, bb8,
    redis::{AsyncCommands, RedisError},
};
use uuid::Uuid;

use crate::application::stores::{CacheError, CommentCache, comment_cache_key};
use crate::domain::entities::CommentRecord;

const CONNECTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Comment snapshots stored as JSON strings under `comment:{id}`.
#[derive(Clone)]
pub struct RedisCommentCache {
    pool: bb8::Pool<RedisConnectionManager>,
}

impl RedisCommentCache {
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, RedisError> {
        let manager = RedisConnectionManager::new(url)?;
        let pool = bb8::Pool::builder()
            .max_size(pool_size)
            .connection_timeout(CONNECTION_TIMEOUT)
            .build(manager)
            .await?;
        Ok(Self { pool })
    }

    async fn connection(
        &self,
    ) -> Result<bb8::PooledConnection<'_, RedisConnectionManager>, CacheError> {
        self.pool.get().await.map_err(CacheError::backend)
    }
}

#[async_trait]
impl CommentCache for RedisCommentCache {
    async fn get(&self, id: Uuid) -> Result<Option<CommentRecord>, CacheError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .get(comment_cache_key(id))
            .await
            .map_err(CacheError::backend)?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, record: &CommentRecord, ttl: Duration) -> Result<(), CacheError> {
        let payload = serde_json::to_string(record)?;
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(comment_cache_key(record.id), payload, seconds)
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .del(comment_cache_key(id))
            .await
            .map_err(CacheError::backend)?;
        Ok(())
    }
}
