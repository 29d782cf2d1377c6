//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A comment row as persisted by the durable store.
///
/// This is also the snapshot held by the read cache. The image retrieval URL is
/// derived on demand and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub tweet_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    /// Blob name of the attached image, `None` when there is no attachment.
    pub image_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CommentRecord {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }
}
