//! Ports for the external services each handler talks to.
//!
//! The AWS-backed implementations live in `dynamo`, `s3`, `sns` and
//! `bedrock`; `memory` holds in-process ones for tests.

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{ReportWindow, UploadRecord};

/// Key-value table holding one record per upload
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Write a record, replacing any record with the same file name
    async fn put_record(&self, record: &UploadRecord) -> Result<()>;

    /// Every record with `window.start <= uploaded_at <= window.end`, in store order
    async fn records_in(&self, window: &ReportWindow) -> Result<Vec<UploadRecord>>;
}

/// Blob store holding uploads and generated reports
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size in bytes of an existing object
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64>;

    /// Full object content
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Create or overwrite an object
    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

/// Pub/sub topic; fan-out to subscribers is the service's job
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publish a message, returning the service's message ID
    async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<String>;
}

/// Hosted language model
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Complete a single-turn prompt. `None` when the model returned no text.
    async fn complete(&self, prompt: &str) -> Result<Option<String>>;
}
