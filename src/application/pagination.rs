//! Keyset cursor for comment listings.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, macros::datetime};
use uuid::Uuid;

/// Lowest `created_at` the start-of-sequence cursor compares against.
const START_CREATED_AT: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CommentCursorPayload {
    created_at: OffsetDateTime,
    id: Uuid,
}

/// Position in the `(created_at, comment_id)` ordering of a tweet's comments.
///
/// A page holds the rows strictly after the cursor, so the cursor built from a
/// page's last row resumes exactly where that page ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentCursor {
    created_at: OffsetDateTime,
    id: Uuid,
}

impl CommentCursor {
    pub fn new(created_at: OffsetDateTime, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// The key that sorts before every stored comment.
    pub fn start() -> Self {
        Self {
            created_at: START_CREATED_AT,
            id: Uuid::nil(),
        }
    }

    pub fn is_start(&self) -> bool {
        *self == Self::start()
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encode(&self) -> String {
        let payload = CommentCursorPayload {
            created_at: self.created_at,
            id: self.id,
        };
        let serialized = serde_json::to_vec(&payload)
            .expect("serializing comment cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: CommentCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            created_at: payload.created_at,
            id: payload.id,
        })
    }

    /// Decode a client-supplied cursor, treating an empty one as the start of
    /// the sequence.
    pub fn parse(cursor: &str) -> Result<Self, PaginationError> {
        let trimmed = cursor.trim();
        if trimmed.is_empty() {
            return Ok(Self::start());
        }
        Self::decode(trimmed)
    }
}

/// Cursor-aware page result.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
