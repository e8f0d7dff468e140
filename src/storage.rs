use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::errors::{AppError, AppResult};
use crate::secrets::StorageCredentials;

/// Bucket-scoped object access.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, key: &str) -> AppResult<Vec<u8>>;

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> AppResult<()>;
}

/// Opens an [`ObjectStore`] once credentials are known.
#[async_trait]
pub trait StorageConnector: Send + Sync {
    async fn connect(&self, credentials: StorageCredentials) -> AppResult<Box<dyn ObjectStore>>;
}

/// S3-compatible storage, path-style addressed.
#[derive(Debug, Clone)]
pub struct S3Connector {
    region: String,
    endpoint_url: String,
    bucket: String,
}

impl S3Connector {
    pub fn new(region: &str, endpoint_url: &str, bucket: &str) -> Self {
        Self {
            region: region.to_string(),
            endpoint_url: endpoint_url.to_string(),
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageConnector for S3Connector {
    async fn connect(&self, credentials: StorageCredentials) -> AppResult<Box<dyn ObjectStore>> {
        let credentials = Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            None,
            None,
            "secret-store",
        );

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .endpoint_url(&self.endpoint_url)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        log::debug!(
            "Connected to bucket {} at {} ({})",
            self.bucket,
            self.endpoint_url,
            self.region
        );

        Ok(Box::new(S3ObjectStore {
            client: Client::from_conf(config),
            bucket: self.bucket.clone(),
        }))
    }
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, key: &str) -> AppResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let no_such_key = e
                    .as_service_error()
                    .map(|service| service.is_no_such_key())
                    .unwrap_or(false);
                if no_such_key {
                    AppError::object_not_found(key)
                } else {
                    AppError::storage(key, DisplayErrorContext(&e).to_string())
                }
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::storage(key, e.to_string()))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> AppResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AppError::storage(key, DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}
