//! Weekly upload report
//!
//! One pass per invocation: read the trailing window from the metadata
//! table, render it as CSV, store the CSV in the report bucket, then publish
//! a link to it. The steps are independent; a failed publish leaves the
//! stored report in place, and nothing is retried here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::errors::{Error, Result};
use crate::models::{
    timestamp, HandlerResponse, ReportArtifact, ReportPublishedBody, ReportWindow, StatusBody,
    UploadRecord,
};
use crate::s3::object_url;
use crate::sns::subject_line;
use crate::store::{MetadataStore, NotificationChannel, ObjectStore};

/// Length of the trailing window, in days
pub const REPORT_WINDOW_DAYS: i64 = 7;

pub const CSV_HEADER: [&str; 3] = ["File name", "Upload date", "File size (bytes)"];
pub const CSV_CONTENT_TYPE: &str = "text/csv";

const NO_UPLOADS_MESSAGE: &str = "No files uploaded in the last week.";
const PUBLISHED_MESSAGE: &str = "Weekly report generated and published successfully!";
const FAILURE_MESSAGE: &str = "Error generating the report";

/// Result of one report run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Nothing uploaded in the window; nothing written or published
    NoUploads,
    /// Report stored and announced
    Published(ReportArtifact),
}

impl ReportOutcome {
    pub fn into_response(self) -> HandlerResponse {
        let response = match self {
            ReportOutcome::NoUploads => HandlerResponse::success(&StatusBody::new(NO_UPLOADS_MESSAGE)),
            ReportOutcome::Published(artifact) => HandlerResponse::success(&ReportPublishedBody {
                message: PUBLISHED_MESSAGE.to_string(),
                report_url: artifact.location,
            }),
        };
        response.unwrap_or_else(|e| HandlerResponse::failure(FAILURE_MESSAGE, e))
    }
}

/// Object key for a report generated at `now`; stable for the whole UTC day
pub fn report_key(now: DateTime<Utc>) -> String {
    format!("weekly-report_{}.csv", now.format("%Y-%m-%d"))
}

/// Render records as CSV: fixed header, then one row per record in the given order
pub fn render_csv(records: &[UploadRecord]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.write_record([
            record.file_name.as_str(),
            timestamp::format(&record.uploaded_at).as_str(),
            record.size_bytes.to_string().as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Csv(e.to_string()))
}

fn report_message(artifact: &ReportArtifact) -> String {
    format!(
        "Weekly S3 upload report - {}\nThe report was generated and is available at the link below:\n{}",
        artifact.key, artifact.location
    )
}

/// Builds, stores and announces the weekly upload report
pub struct ReportBuilder {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    channel: Arc<dyn NotificationChannel>,
    bucket: String,
    topic_arn: String,
}

impl ReportBuilder {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        channel: Arc<dyn NotificationChannel>,
        bucket: impl Into<String>,
        topic_arn: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            objects,
            channel,
            bucket: bucket.into(),
            topic_arn: topic_arn.into(),
        }
    }

    /// Run for the window ending now
    pub async fn generate_and_publish(&self) -> Result<ReportOutcome> {
        self.generate_and_publish_at(Utc::now()).await
    }

    /// Run for the window ending at `now`
    pub async fn generate_and_publish_at(&self, now: DateTime<Utc>) -> Result<ReportOutcome> {
        let window = ReportWindow::ending_at(now, REPORT_WINDOW_DAYS);

        let records = self.metadata.records_in(&window).await.map_err(|e| {
            error!(code = e.code(), error = %e, "Failed to read upload records");
            e
        })?;

        if records.is_empty() {
            info!(
                start = %timestamp::format(&window.start),
                end = %timestamp::format(&window.end),
                "No uploads in report window"
            );
            return Ok(ReportOutcome::NoUploads);
        }

        let key = report_key(now);
        let artifact = ReportArtifact {
            content: render_csv(&records)?,
            location: object_url(&self.bucket, &key),
            key,
        };

        self.objects
            .write_object(
                &self.bucket,
                &artifact.key,
                artifact.content.clone().into_bytes(),
                CSV_CONTENT_TYPE,
            )
            .await
            .map_err(|e| {
                error!(bucket = %self.bucket, key = %artifact.key, code = e.code(), error = %e, "Failed to store report");
                e
            })?;
        info!(
            bucket = %self.bucket,
            key = %artifact.key,
            rows = records.len(),
            "Stored weekly report"
        );

        let subject = subject_line(&format!("Weekly S3 upload report - {}", artifact.key));
        self.channel
            .publish(&self.topic_arn, &subject, &report_message(&artifact))
            .await
            .map_err(|e| {
                error!(topic_arn = %self.topic_arn, code = e.code(), error = %e, "Failed to publish report");
                e
            })?;

        Ok(ReportOutcome::Published(artifact))
    }
}

/// Convert a run result into the Lambda response
pub fn respond(result: Result<ReportOutcome>) -> HandlerResponse {
    match result {
        Ok(outcome) => outcome.into_response(),
        Err(e) => HandlerResponse::failure(FAILURE_MESSAGE, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryChannel, InMemoryMetadataStore, InMemoryObjectStore};
    use chrono::{Duration, TimeZone};
    use tokio_test::{assert_err, assert_ok};

    const BUCKET: &str = "weekly-reports";
    const TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:reports";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 8, 9, 30, 0).unwrap()
    }

    fn record(name: &str, age: Duration, size_bytes: u64) -> UploadRecord {
        UploadRecord {
            file_name: name.to_string(),
            uploaded_at: now() - age,
            size_bytes,
        }
    }

    struct Fixture {
        metadata: Arc<InMemoryMetadataStore>,
        objects: Arc<InMemoryObjectStore>,
        channel: Arc<InMemoryChannel>,
    }

    impl Fixture {
        fn with_records(records: Vec<UploadRecord>) -> Self {
            Self {
                metadata: Arc::new(InMemoryMetadataStore::with_records(records)),
                objects: Arc::new(InMemoryObjectStore::new()),
                channel: Arc::new(InMemoryChannel::new()),
            }
        }

        fn builder(&self) -> ReportBuilder {
            ReportBuilder::new(
                self.metadata.clone(),
                self.objects.clone(),
                self.channel.clone(),
                BUCKET,
                TOPIC,
            )
        }

        async fn stored_report(&self) -> Option<String> {
            self.objects
                .get(BUCKET, &report_key(now()))
                .await
                .map(|object| String::from_utf8(object.body).unwrap())
        }
    }

    #[test]
    fn test_report_key_is_daily() {
        let morning = Utc.with_ymd_and_hms(2024, 10, 8, 0, 0, 1).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 10, 8, 23, 59, 59).unwrap();
        assert_eq!(report_key(morning), "weekly-report_2024-10-08.csv");
        assert_eq!(report_key(morning), report_key(evening));
    }

    #[test]
    fn test_render_csv_quotes_only_when_needed() {
        let records = vec![
            record("plain.txt", Duration::hours(1), 10),
            record("a,b.txt", Duration::hours(2), 20),
        ];
        let csv = render_csv(&records).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "File name,Upload date,File size (bytes)");
        assert_eq!(lines[1], "plain.txt,2024-10-08T08:30:00.000000Z,10");
        assert_eq!(lines[2], "\"a,b.txt\",2024-10-08T07:30:00.000000Z,20");
        assert!(csv.ends_with("\r\n"));
    }

    #[tokio::test]
    async fn test_scenario_one_recent_one_stale() {
        let fx = Fixture::with_records(vec![
            record("a.txt", Duration::days(1), 100),
            record("b.txt", Duration::days(10), 200),
        ]);

        let outcome = assert_ok!(fx.builder().generate_and_publish_at(now()).await);
        let ReportOutcome::Published(artifact) = outcome else {
            panic!("expected a published report");
        };

        let lines: Vec<&str> = artifact.content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("a.txt,"));
        assert!(!artifact.content.contains("b.txt"));

        assert_eq!(artifact.key, "weekly-report_2024-10-08.csv");
        assert_eq!(
            artifact.location,
            "https://weekly-reports.s3.amazonaws.com/weekly-report_2024-10-08.csv"
        );

        let stored = fx.objects.get(BUCKET, &artifact.key).await.unwrap();
        assert_eq!(stored.content_type, "text/csv");
        assert_eq!(stored.body, artifact.content.as_bytes());
    }

    #[tokio::test]
    async fn test_one_row_per_qualifying_record() {
        let fx = Fixture::with_records(vec![
            record("one.txt", Duration::hours(1), 1),
            record("old.txt", Duration::days(8), 2),
            record("two.txt", Duration::days(3), 3),
            record("three.txt", Duration::days(6), 4),
        ]);

        assert_ok!(fx.builder().generate_and_publish_at(now()).await);

        let content = fx.stored_report().await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER.join(","));
        assert!(!content.contains("old.txt"));
    }

    #[tokio::test]
    async fn test_no_uploads_writes_and_publishes_nothing() {
        let fx = Fixture::with_records(vec![
            record("stale.txt", Duration::days(8), 1),
            record("ancient.txt", Duration::days(400), 2),
        ]);

        let outcome = assert_ok!(fx.builder().generate_and_publish_at(now()).await);
        assert_eq!(outcome, ReportOutcome::NoUploads);
        assert_eq!(fx.objects.write_count().await, 0);
        assert!(fx.channel.published().await.is_empty());

        let response = respond(fx.builder().generate_and_publish_at(now()).await);
        assert!(response.is_success());
        assert_eq!(
            response.body_json().unwrap()["message"],
            "No files uploaded in the last week."
        );
    }

    #[tokio::test]
    async fn test_records_after_window_end_are_excluded() {
        let fx = Fixture::with_records(vec![record("future.txt", -Duration::minutes(5), 1)]);

        let outcome = assert_ok!(fx.builder().generate_and_publish_at(now()).await);
        assert_eq!(outcome, ReportOutcome::NoUploads);
        assert_eq!(fx.objects.write_count().await, 0);

        fx.metadata
            .put_record(&record("today.txt", Duration::minutes(5), 2))
            .await
            .unwrap();
        let outcome = assert_ok!(fx.builder().generate_and_publish_at(now()).await);
        let ReportOutcome::Published(artifact) = outcome else {
            panic!("expected a published report");
        };
        assert!(artifact.content.contains("today.txt,"));
        assert!(!artifact.content.contains("future.txt"));
    }

    #[tokio::test]
    async fn test_same_day_rerun_overwrites_identical_content() {
        let fx = Fixture::with_records(vec![record("a.txt", Duration::days(1), 100)]);

        assert_ok!(fx.builder().generate_and_publish_at(now()).await);
        let first = fx.stored_report().await.unwrap();

        let later = now() + Duration::hours(5);
        assert_ok!(fx.builder().generate_and_publish_at(later).await);
        let second = fx.stored_report().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.objects.write_count().await, 2);
        // Notifications are not deduplicated
        assert_eq!(fx.channel.published().await.len(), 2);
    }

    #[tokio::test]
    async fn test_query_failure_writes_and_publishes_nothing() {
        let fx = Fixture::with_records(vec![record("a.txt", Duration::days(1), 100)]);
        fx.metadata.fail_with("AccessDeniedException").await;

        let err = assert_err!(fx.builder().generate_and_publish_at(now()).await);
        assert_eq!(err.code(), "database_error");
        assert_eq!(fx.objects.write_count().await, 0);
        assert!(fx.channel.published().await.is_empty());

        let response = respond(fx.builder().generate_and_publish_at(now()).await);
        assert_eq!(response.status_code, 500);
        let body = response.body_json().unwrap();
        assert_eq!(body["message"], "Error generating the report");
        assert!(body["error"].as_str().unwrap().contains("AccessDeniedException"));
    }

    #[tokio::test]
    async fn test_write_failure_skips_publish() {
        let fx = Fixture::with_records(vec![record("a.txt", Duration::days(1), 100)]);
        fx.objects.fail_writes_with("NoSuchBucket").await;

        let response = respond(fx.builder().generate_and_publish_at(now()).await);
        assert_eq!(response.status_code, 500);
        assert!(fx.channel.published().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_artifact() {
        let fx = Fixture::with_records(vec![record("a.txt", Duration::days(1), 100)]);
        fx.channel.fail_with("Throttling").await;

        let response = respond(fx.builder().generate_and_publish_at(now()).await);
        assert_eq!(response.status_code, 500);
        assert!(fx.stored_report().await.is_some());
    }

    #[tokio::test]
    async fn test_publish_carries_link_and_subject() {
        let fx = Fixture::with_records(vec![record("a.txt", Duration::days(1), 100)]);

        let response = respond(fx.builder().generate_and_publish_at(now()).await);
        assert!(response.is_success());
        let body = response.body_json().unwrap();
        assert_eq!(
            body["report_url"],
            "https://weekly-reports.s3.amazonaws.com/weekly-report_2024-10-08.csv"
        );

        let published = fx.channel.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic_arn, TOPIC);
        assert_eq!(
            published[0].subject,
            "Weekly S3 upload report - weekly-report_2024-10-08.csv"
        );
        assert!(published[0]
            .message
            .ends_with("https://weekly-reports.s3.amazonaws.com/weekly-report_2024-10-08.csv"));
    }
}
