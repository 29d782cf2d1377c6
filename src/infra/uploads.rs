//! S3-compatible image storage.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Builder as S3ConfigBuilder, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use bytes::Bytes;
use tracing::debug;

use crate::application::stores::{ImageStore, ImageStoreError};

/// Connection settings for the image bucket.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services; forces path-style addressing.
    pub endpoint: Option<String>,
}

#[derive(Clone)]
pub struct S3ImageStore {
    client: Client,
    bucket: String,
}

impl S3ImageStore {
    /// Build a client from the ambient AWS credential chain.
    pub async fn connect(settings: &S3Settings) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .load()
            .await;

        let mut builder = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = settings.endpoint.as_deref() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn put(
        &self,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), ImageStoreError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| ImageStoreError::upload(name, DisplayErrorContext(&err).to_string()))?;

        debug!(
            target = "commentary::infra::uploads",
            bucket = %self.bucket,
            image_name = name,
            size,
            "image uploaded"
        );
        Ok(())
    }

    async fn url(&self, name: &str, expires_in: Duration) -> Result<String, ImageStoreError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| ImageStoreError::presign(name, err.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .presigned(presigning)
            .await
            .map_err(|err| ImageStoreError::presign(name, DisplayErrorContext(&err).to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn delete(&self, name: &str) -> Result<(), ImageStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|err| ImageStoreError::delete(name, DisplayErrorContext(&err).to_string()))?;

        debug!(
            target = "commentary::infra::uploads",
            bucket = %self.bucket,
            image_name = name,
            "image deleted"
        );
        Ok(())
    }
}
