//! Upload ingestion: turn S3 `ObjectCreated` events into metadata records,
//! optionally announcing each one on a topic.

use std::sync::Arc;

use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use tracing::{error, info};

use crate::errors::{Error, Result};
use crate::models::{timestamp, HandlerResponse, StatusBody, UploadRecord, UploadRecordedBody};
use crate::sns::subject_line;
use crate::store::{MetadataStore, NotificationChannel, ObjectStore};

const FAILURE_MESSAGE: &str = "Error processing file";

/// Bucket and decoded object key of one event record
pub fn upload_location(record: &S3EventRecord) -> Result<(String, String)> {
    let bucket = record
        .s3
        .bucket
        .name
        .clone()
        .ok_or_else(|| Error::InvalidEvent("Missing bucket name".to_string()))?;
    let raw_key = record
        .s3
        .object
        .key
        .as_deref()
        .ok_or_else(|| Error::InvalidEvent("Missing object key".to_string()))?;

    Ok((bucket, decode_key(raw_key)?))
}

/// S3 event keys are form-encoded: `+` is a space, everything else percent-escaped
pub fn decode_key(raw: &str) -> Result<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|key| key.into_owned())
        .map_err(|e| Error::InvalidEvent(format!("Undecodable object key '{}': {}", raw, e)))
}

struct UploadNotifier {
    channel: Arc<dyn NotificationChannel>,
    topic_arn: String,
}

/// Records upload metadata, and publishes an upload notice when configured
pub struct UploadRecorder {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: Option<UploadNotifier>,
}

impl UploadRecorder {
    pub fn new(metadata: Arc<dyn MetadataStore>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            metadata,
            objects,
            notifier: None,
        }
    }

    /// Publish a notice to `topic_arn` after every recorded upload
    pub fn with_notifications(
        mut self,
        channel: Arc<dyn NotificationChannel>,
        topic_arn: impl Into<String>,
    ) -> Self {
        self.notifier = Some(UploadNotifier {
            channel,
            topic_arn: topic_arn.into(),
        });
        self
    }

    /// Head the object, store its record, then notify
    pub async fn record_upload(&self, bucket: &str, key: &str) -> Result<UploadRecord> {
        let size_bytes = self.objects.object_size(bucket, key).await?;
        let record = UploadRecord::new(key.to_string(), size_bytes);

        self.metadata.put_record(&record).await?;
        info!(
            bucket = %bucket,
            file_name = %record.file_name,
            size_bytes = record.size_bytes,
            "Recorded upload"
        );

        if let Some(notifier) = &self.notifier {
            let subject = subject_line(&format!("New upload: {}", record.file_name));
            let message = upload_message(bucket, &record);
            notifier
                .channel
                .publish(&notifier.topic_arn, &subject, &message)
                .await?;
        }

        Ok(record)
    }

    /// Process every record of an S3 event, stopping at the first failure
    pub async fn handle_event(&self, event: &S3Event) -> HandlerResponse {
        let mut last = None;

        for event_record in &event.records {
            let outcome = match upload_location(event_record) {
                Ok((bucket, key)) => self
                    .record_upload(&bucket, &key)
                    .await
                    .map_err(|e| (bucket, key, e)),
                Err(e) => Err((String::new(), String::new(), e)),
            };

            match outcome {
                Ok(record) => last = Some(record),
                Err((bucket, key, e)) => {
                    error!(
                        bucket = %bucket,
                        key = %key,
                        code = e.code(),
                        error = %e,
                        "Failed to process upload"
                    );
                    return HandlerResponse::failure(FAILURE_MESSAGE, e);
                }
            }
        }

        let response = match &last {
            Some(record) => HandlerResponse::success(&UploadRecordedBody::from(record)),
            None => HandlerResponse::success(&StatusBody::new("No records in event")),
        };
        response.unwrap_or_else(|e| HandlerResponse::failure(FAILURE_MESSAGE, e))
    }
}

fn upload_message(bucket: &str, record: &UploadRecord) -> String {
    format!(
        "The file '{}' was uploaded to S3 bucket '{}'.\nSize: {} bytes\nUpload date: {}",
        record.file_name,
        bucket,
        record.size_bytes,
        timestamp::format(&record.uploaded_at)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryChannel, InMemoryMetadataStore, InMemoryObjectStore};
    use serde_json::json;

    const TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:uploads";

    fn s3_event(bucket: &str, keys: &[&str]) -> S3Event {
        let records: Vec<serde_json::Value> = keys
            .iter()
            .map(|key| {
                json!({
                    "eventVersion": "2.1",
                    "eventSource": "aws:s3",
                    "awsRegion": "us-east-1",
                    "eventTime": "2024-10-08T12:00:00.000Z",
                    "eventName": "ObjectCreated:Put",
                    "userIdentity": {"principalId": "EXAMPLE"},
                    "requestParameters": {"sourceIPAddress": "127.0.0.1"},
                    "responseElements": {
                        "x-amz-request-id": "EXAMPLE123456789",
                        "x-amz-id-2": "EXAMPLE123/5678abcdefghijklambdaisawesome/mnopqrstuvwxyzABCDEFGH"
                    },
                    "s3": {
                        "s3SchemaVersion": "1.0",
                        "configurationId": "uploads",
                        "bucket": {
                            "name": bucket,
                            "ownerIdentity": {"principalId": "EXAMPLE"},
                            "arn": format!("arn:aws:s3:::{}", bucket)
                        },
                        "object": {
                            "key": key,
                            "size": 1024,
                            "eTag": "0123456789abcdef0123456789abcdef",
                            "sequencer": "0A1B2C3D4E5F678901"
                        }
                    }
                })
            })
            .collect();
        serde_json::from_value(json!({ "Records": records })).unwrap()
    }

    struct Fixture {
        metadata: Arc<InMemoryMetadataStore>,
        objects: Arc<InMemoryObjectStore>,
        channel: Arc<InMemoryChannel>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                metadata: Arc::new(InMemoryMetadataStore::new()),
                objects: Arc::new(InMemoryObjectStore::new()),
                channel: Arc::new(InMemoryChannel::new()),
            }
        }

        fn recorder(&self) -> UploadRecorder {
            UploadRecorder::new(self.metadata.clone(), self.objects.clone())
        }

        fn notifying_recorder(&self) -> UploadRecorder {
            self.recorder().with_notifications(self.channel.clone(), TOPIC)
        }
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("reports/q3+summary.txt").unwrap(), "reports/q3 summary.txt");
        assert_eq!(decode_key("a%2Bb%C3%A9.txt").unwrap(), "a+bé.txt");
        assert!(decode_key("bad%FF.txt").is_err());
    }

    #[tokio::test]
    async fn test_records_upload_metadata() {
        let fx = Fixture::new();
        fx.objects.insert("uploads", "notes.txt", vec![0u8; 42]).await;

        let response = fx.recorder().handle_event(&s3_event("uploads", &["notes.txt"])).await;
        assert!(response.is_success());

        let body = response.body_json().unwrap();
        assert_eq!(body["file_name"], "notes.txt");
        assert_eq!(body["size_bytes"], 42);

        let records = fx.metadata.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_name, "notes.txt");
        assert_eq!(records[0].size_bytes, 42);
        assert!(fx.channel.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_decodes_key_before_head() {
        let fx = Fixture::new();
        fx.objects.insert("uploads", "q3 summary.txt", "hello").await;

        let response = fx
            .recorder()
            .handle_event(&s3_event("uploads", &["q3+summary.txt"]))
            .await;
        assert!(response.is_success());
        assert_eq!(fx.metadata.records().await[0].file_name, "q3 summary.txt");
    }

    #[tokio::test]
    async fn test_missing_object_fails() {
        let fx = Fixture::new();

        let response = fx.recorder().handle_event(&s3_event("uploads", &["ghost.txt"])).await;
        assert_eq!(response.status_code, 500);

        let body = response.body_json().unwrap();
        assert_eq!(body["message"], "Error processing file");
        assert!(body["error"].as_str().unwrap().contains("NoSuchKey"));
        assert!(fx.metadata.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_head_failure_fails_without_record() {
        let fx = Fixture::new();
        fx.objects.insert("uploads", "notes.txt", "hello").await;
        fx.objects.fail_reads_with("AccessDenied").await;

        let response = fx
            .notifying_recorder()
            .handle_event(&s3_event("uploads", &["notes.txt"]))
            .await;
        assert_eq!(response.status_code, 500);
        assert!(response.body_json().unwrap()["error"]
            .as_str()
            .unwrap()
            .contains("AccessDenied"));
        assert!(fx.metadata.records().await.is_empty());
        assert!(fx.channel.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_stops_batch() {
        let fx = Fixture::new();
        fx.objects.insert("uploads", "a.txt", "a").await;
        fx.objects.insert("uploads", "b.txt", "b").await;
        fx.metadata.fail_with("ProvisionedThroughputExceededException").await;

        let response = fx
            .notifying_recorder()
            .handle_event(&s3_event("uploads", &["a.txt", "b.txt"]))
            .await;
        assert_eq!(response.status_code, 500);
        assert!(fx.channel.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_event() {
        let fx = Fixture::new();
        let response = fx.recorder().handle_event(&s3_event("uploads", &[])).await;
        assert!(response.is_success());
        assert_eq!(response.body_json().unwrap()["message"], "No records in event");
    }

    #[tokio::test]
    async fn test_notifies_after_recording() {
        let fx = Fixture::new();
        fx.objects.insert("uploads", "contract.pdf", vec![1u8; 300]).await;

        let response = fx
            .notifying_recorder()
            .handle_event(&s3_event("uploads", &["contract.pdf"]))
            .await;
        assert!(response.is_success());

        let published = fx.channel.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic_arn, TOPIC);
        assert_eq!(published[0].subject, "New upload: contract.pdf");
        assert!(published[0]
            .message
            .starts_with("The file 'contract.pdf' was uploaded to S3 bucket 'uploads'.\nSize: 300 bytes\n"));
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_record() {
        let fx = Fixture::new();
        fx.objects.insert("uploads", "contract.pdf", "x").await;
        fx.channel.fail_with("AuthorizationError").await;

        let response = fx
            .notifying_recorder()
            .handle_event(&s3_event("uploads", &["contract.pdf"]))
            .await;
        assert_eq!(response.status_code, 500);
        assert_eq!(fx.metadata.records().await.len(), 1);
    }
}
