//! In-memory implementations of the service ports.
//!
//! Each one can be told to fail, so handlers can be exercised against
//! throttling or permission errors without touching AWS.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::{Error, Result};
use crate::models::{ReportWindow, UploadRecord};
use crate::store::{MetadataStore, NotificationChannel, ObjectStore, TextModel};

/// Metadata table backed by a vector (insertion order stands in for scan order)
#[derive(Default)]
pub struct InMemoryMetadataStore {
    records: Mutex<Vec<UploadRecord>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<UploadRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            failure: Mutex::new(None),
        }
    }

    /// Make every following call fail with a database error
    pub async fn fail_with(&self, message: &str) {
        *self.failure.lock().await = Some(message.to_string());
    }

    pub async fn records(&self) -> Vec<UploadRecord> {
        self.records.lock().await.clone()
    }

    async fn check(&self) -> Result<()> {
        match self.failure.lock().await.as_ref() {
            Some(message) => Err(Error::Database(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put_record(&self, record: &UploadRecord) -> Result<()> {
        self.check().await?;
        let mut records = self.records.lock().await;
        match records.iter_mut().find(|r| r.file_name == record.file_name) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    async fn records_in(&self, window: &ReportWindow) -> Result<Vec<UploadRecord>> {
        self.check().await?;
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .filter(|r| window.contains(&r.uploaded_at))
            .cloned()
            .collect())
    }
}

/// Object as written to the in-memory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Object store keyed by (bucket, key)
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    write_count: Mutex<usize>,
    read_failure: Mutex<Option<String>>,
    write_failure: Mutex<Option<String>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a write
    pub async fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects.lock().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of `write_object` calls that succeeded
    pub async fn write_count(&self) -> usize {
        *self.write_count.lock().await
    }

    pub async fn fail_reads_with(&self, message: &str) {
        *self.read_failure.lock().await = Some(message.to_string());
    }

    pub async fn fail_writes_with(&self, message: &str) {
        *self.write_failure.lock().await = Some(message.to_string());
    }

    async fn lookup(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        if let Some(message) = self.read_failure.lock().await.as_ref() {
            return Err(Error::ObjectStore(message.clone()));
        }
        self.get(bucket, key)
            .await
            .ok_or_else(|| Error::ObjectStore(format!("NoSuchKey: s3://{}/{}", bucket, key)))
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        Ok(self.lookup(bucket, key).await?.body.len() as u64)
    }

    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        Ok(self.lookup(bucket, key).await?.body)
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        if let Some(message) = self.write_failure.lock().await.as_ref() {
            return Err(Error::ObjectStore(message.clone()));
        }
        self.objects.lock().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        *self.write_count.lock().await += 1;
        Ok(())
    }
}

/// A message captured by `InMemoryChannel`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic_arn: String,
    pub subject: String,
    pub message: String,
}

/// Notification channel that records what was published
#[derive(Default)]
pub struct InMemoryChannel {
    published: Mutex<Vec<PublishedMessage>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_with(&self, message: &str) {
        *self.failure.lock().await = Some(message.to_string());
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for InMemoryChannel {
    async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<String> {
        if let Some(reason) = self.failure.lock().await.as_ref() {
            return Err(Error::Notification(reason.clone()));
        }
        let mut published = self.published.lock().await;
        published.push(PublishedMessage {
            topic_arn: topic_arn.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        });
        Ok(format!("msg-{}", published.len()))
    }
}

/// Model that answers every prompt with the same canned reply
#[derive(Default)]
pub struct ScriptedModel {
    reply: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Mutex::new(Some(reply.to_string())),
            ..Self::default()
        }
    }

    /// A model whose responses carry no text content
    pub fn silent() -> Self {
        Self::default()
    }

    pub async fn fail_with(&self, message: &str) {
        *self.failure.lock().await = Some(message.to_string());
    }

    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl TextModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<Option<String>> {
        if let Some(message) = self.failure.lock().await.as_ref() {
            return Err(Error::Model(message.clone()));
        }
        self.prompts.lock().await.push(prompt.to_string());
        Ok(self.reply.lock().await.clone())
    }
}
