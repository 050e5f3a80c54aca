//! Queued file summaries: read the file named by each SQS message, ask the
//! model for an executive summary, and mail it out through the summary topic.

use std::sync::Arc;

use aws_lambda_events::event::sqs::{SqsEvent, SqsMessage};
use chrono::{DateTime, FixedOffset, Utc};
use tracing::{error, info, warn};

use crate::errors::{Error, Result};
use crate::models::{HandlerResponse, ProcessingJob, StatusBody};
use crate::sns::subject_line;
use crate::store::{NotificationChannel, ObjectStore, TextModel};

/// Subject timestamps are shown in São Paulo time (UTC-3, no DST)
const SUBJECT_UTC_OFFSET_SECS: i32 = -3 * 3600;
const COMPLETED_MESSAGE: &str = "Processing completed successfully";

/// Instruction sent with every file
pub fn build_prompt(file_name: &str, content: &str, signature: &str) -> String {
    format!(
        "You are a business assistant analysing text files.\n\
         Given the file:\n\
         \n\
         {content}\n\
         \n\
         Follow these instructions:\n\
         \x20   - identify only the date, the organization and the location;\n\
         \x20   - bring relevant insights about the information in the file so the CEO can analyse the key points;\n\
         \x20   - state which file is being analysed ({file_name});\n\
         \n\
         After collecting the information, write a report addressed to the CEO of the company, \
         closing with kind regards and signed {signature}.\n"
    )
}

/// Subject line for a summary, stamped with the local time of `now`
pub fn summary_subject(file_name: &str, now: DateTime<Utc>) -> String {
    let local = match FixedOffset::east_opt(SUBJECT_UTC_OFFSET_SECS) {
        Some(offset) => now.with_timezone(&offset).format("%d/%m/%Y %H:%M:%S").to_string(),
        None => now.format("%d/%m/%Y %H:%M:%S").to_string(),
    };
    subject_line(&format!("Board summary - File: {} - {}", file_name, local))
}

/// Parse the job carried by one queue message
pub fn parse_job(message: &SqsMessage) -> Result<ProcessingJob> {
    let body = message
        .body
        .as_deref()
        .ok_or_else(|| Error::InvalidEvent("Message has no body".to_string()))?;
    Ok(serde_json::from_str(body)?)
}

/// Reads, summarizes and mails queued files
pub struct Summarizer {
    objects: Arc<dyn ObjectStore>,
    model: Arc<dyn TextModel>,
    channel: Arc<dyn NotificationChannel>,
    topic_arn: String,
    signature: String,
}

impl Summarizer {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        model: Arc<dyn TextModel>,
        channel: Arc<dyn NotificationChannel>,
        topic_arn: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            model,
            channel,
            topic_arn: topic_arn.into(),
            signature: signature.into(),
        }
    }

    /// Summarize one file. Returns the published message ID, or `None` when
    /// the model produced no text.
    pub async fn process_job(&self, job: &ProcessingJob, now: DateTime<Utc>) -> Result<Option<String>> {
        info!(bucket = %job.bucket_name, key = %job.object_key, "Processing file");

        let bytes = self.objects.read_object(&job.bucket_name, &job.object_key).await?;
        let content = String::from_utf8(bytes).map_err(|_| {
            Error::InvalidEvent(format!("s3://{}/{} is not UTF-8 text", job.bucket_name, job.object_key))
        })?;

        let file_name = job.file_name();
        let prompt = build_prompt(file_name, &content, &self.signature);

        let Some(summary) = self.model.complete(&prompt).await? else {
            warn!(key = %job.object_key, "Model response has no content; nothing sent");
            return Ok(None);
        };

        let message_id = self
            .channel
            .publish(&self.topic_arn, &summary_subject(file_name, now), &summary)
            .await?;
        info!(key = %job.object_key, message_id = %message_id, "Summary sent");

        Ok(Some(message_id))
    }

    /// Process every message; failures are logged and the batch moves on
    pub async fn handle_event(&self, event: &SqsEvent, now: DateTime<Utc>) -> HandlerResponse {
        for message in &event.records {
            let message_id = message.message_id.as_deref().unwrap_or("unknown");

            let result = match parse_job(message) {
                Ok(job) => self.process_job(&job, now).await,
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                error!(
                    message_id = %message_id,
                    code = e.code(),
                    error = %e,
                    "Failed to process queued file"
                );
            }
        }

        HandlerResponse::success(&StatusBody::new(COMPLETED_MESSAGE))
            .unwrap_or_else(|e| HandlerResponse::failure(COMPLETED_MESSAGE, e))
    }
}
