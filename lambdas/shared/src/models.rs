//! Domain models for UploadTrail
//!
//! These types represent the core entities in the system:
//! - Upload records: Metadata captured for every object landing in the bucket
//! - Report windows and artifacts: The weekly CSV digest
//! - Processing jobs: Queued requests to summarize a file
//! - Handler responses: What every Lambda returns to its invoker

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Metadata for one uploaded object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Object key within the bucket
    pub file_name: String,
    /// When the upload was processed (not when S3 received it)
    #[serde(with = "timestamp")]
    pub uploaded_at: DateTime<Utc>,
    /// Object size reported by S3
    pub size_bytes: u64,
}

impl UploadRecord {
    pub fn new(file_name: String, size_bytes: u64) -> Self {
        Self {
            file_name,
            uploaded_at: Utc::now(),
            size_bytes,
        }
    }

    /// Calendar day of the upload, used as the index partition key
    pub fn upload_day(&self) -> NaiveDate {
        self.uploaded_at.date_naive()
    }
}

/// Fixed-width timestamp encoding for stored records.
///
/// Every value is written as `YYYY-MM-DDTHH:MM:SS.ffffffZ` so that string
/// comparison in DynamoDB filter and key conditions is chronological.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Parses RFC 3339, falling back to a naive ISO-8601 value read as UTC.
    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
    }
}

/// Trailing time range covered by a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// Window of `days` days ending at `end`
    pub fn ending_at(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts <= self.end
    }

    /// Every calendar day touched by the window, oldest first
    pub fn days(&self) -> Vec<NaiveDate> {
        self.start
            .date_naive()
            .iter_days()
            .take_while(|day| *day <= self.end.date_naive())
            .collect()
    }
}

/// A generated report stored in the object store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    /// Object key, derived from the generation date
    pub key: String,
    /// CSV content
    pub content: String,
    /// Public URL of the stored object
    pub location: String,
}

/// Queue message asking for a file summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub bucket_name: String,
    pub object_key: String,
}

impl ProcessingJob {
    /// Last path segment of the object key
    pub fn file_name(&self) -> &str {
        self.object_key.rsplit('/').next().unwrap_or(&self.object_key)
    }
}

/// Lambda return value: numeric status plus a JSON-encoded body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    pub const OK: u16 = 200;
    pub const FAILURE: u16 = 500;

    /// 200 response with a serialized body
    pub fn success<T: Serialize>(body: &T) -> Result<Self> {
        Ok(Self {
            status_code: Self::OK,
            body: serde_json::to_string(body)?,
        })
    }

    /// 500 response carrying a message and the error description
    pub fn failure(message: &str, error: impl std::fmt::Display) -> Self {
        let body = serde_json::json!({
            "message": message,
            "error": error.to_string(),
        });
        Self {
            status_code: Self::FAILURE,
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == Self::OK
    }

    /// Decoded body
    pub fn body_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Plain status message body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusBody {
    pub message: String,
}

impl StatusBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body returned after an upload has been recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecordedBody {
    pub message: String,
    pub file_name: String,
    pub size_bytes: u64,
    #[serde(with = "timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

impl From<&UploadRecord> for UploadRecordedBody {
    fn from(record: &UploadRecord) -> Self {
        Self {
            message: format!(
                "Metadata for file {} stored successfully",
                record.file_name
            ),
            file_name: record.file_name.clone(),
            size_bytes: record.size_bytes,
            uploaded_at: record.uploaded_at,
        }
    }
}

/// Body returned after a report was published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPublishedBody {
    pub message: String,
    pub report_url: String,
}
