//! Image attachments and blob naming.

use std::path::Path;

use bytes::Bytes;
use slug::slugify;
use uuid::Uuid;

use super::error::DomainError;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// An image supplied by a caller alongside a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    file_name: String,
    content_type: String,
    data: Bytes,
}

impl ImagePayload {
    /// Build a payload, inferring the content type from the file name when the
    /// caller did not supply one.
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        data: Bytes,
    ) -> Result<Self, DomainError> {
        let file_name = file_name.into();
        if file_name.trim().is_empty() {
            return Err(DomainError::validation("image name must not be empty"));
        }
        if data.is_empty() {
            return Err(DomainError::validation("image payload must not be empty"));
        }

        let content_type = content_type
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| {
                mime_guess::from_path(&file_name)
                    .first_raw()
                    .unwrap_or(FALLBACK_CONTENT_TYPE)
                    .to_string()
            });

        Ok(Self {
            file_name,
            content_type,
            data,
        })
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Allocate a fresh blob name for this payload.
    ///
    /// Every call yields a distinct name, so a replacement upload never
    /// overwrites the blob it replaces.
    pub fn blob_name(&self) -> String {
        format!("{}-{}", Uuid::new_v4(), sanitize_filename(&self.file_name))
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}
