use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use thiserror::Error;
use tracing::info;

pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("Upload of {key} failed: {reason}")]
    UploadFailed { key: String, reason: String },
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, key: &str) -> Result<(), BlobStoreError>;
    /// Canonical public URL for `key`. Pure, no I/O.
    fn public_url(&self, key: &str) -> String;
}

pub fn public_object_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
    region: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String, region: String) -> Self {
        Self {
            client,
            bucket,
            region,
        }
    }

    /// Credentials come from the standard AWS provider chain.
    pub async fn from_region(bucket: String, region: String) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.clone()))
            .load()
            .await;

        Self::new(Client::new(&sdk_config), bucket, region)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, bytes: Vec<u8>, key: &str) -> Result<(), BlobStoreError> {
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(IMAGE_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| BlobStoreError::UploadFailed {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        info!(bucket = %self.bucket, key, size, "Uploaded blob");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        public_object_url(&self.bucket, &self.region, key)
    }
}
