//! S3 operations for UploadTrail

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::errors::{Error, Result};
use crate::store::ObjectStore;

/// S3-backed object store
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Virtual-hosted style URL of an object.
///
/// Only readable if the bucket grants public or pre-authorized access.
pub fn object_url(bucket: &str, key: &str) -> String {
    format!("https://{}.s3.amazonaws.com/{}", bucket, key)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let head = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(DisplayErrorContext(&e).to_string()))?;

        Ok(head.content_length().unwrap_or(0).max(0) as u64)
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(DisplayErrorContext(&e).to_string()))?;

        let body = object
            .body
            .collect()
            .await
            .map_err(|e| Error::ObjectStore(format!("Failed to read s3://{}/{}: {}", bucket, key, e)))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Error::ObjectStore(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url() {
        assert_eq!(
            object_url("weekly-reports", "weekly-report_2024-10-08.csv"),
            "https://weekly-reports.s3.amazonaws.com/weekly-report_2024-10-08.csv"
        );
    }
}
