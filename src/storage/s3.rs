//! AWS S3 snapshot backend.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::{SNAPSHOT_KEY, SnapshotStorage};

/// Stores the snapshot as `{prefix}/history.json` in a bucket.
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 storage from the default AWS environment and the storage settings.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        if config.s3_bucket.trim().is_empty() {
            return Err(AppError::config("storage.s3_bucket is required for S3 storage"));
        }
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self::new(
            Client::new(&aws),
            &config.s3_bucket,
            &config.s3_prefix,
        ))
    }

    fn key(&self) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            SNAPSHOT_KEY.to_string()
        } else {
            format!("{prefix}/{SNAPSHOT_KEY}")
        }
    }
}

#[async_trait]
impl SnapshotStorage for S3Storage {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        let key = self.key();
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(AppError::storage)?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing snapshot at s3://{}/{}", self.bucket, key);
                    Ok(None)
                } else {
                    Err(AppError::storage(service_err))
                }
            }
        }
    }

    async fn save(&self, bytes: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key())
            .body(ByteStream::from(bytes.to_vec()))
            .content_type("application/json")
            .send()
            .await
            .map_err(AppError::storage)?;
        Ok(())
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key())
    }
}
