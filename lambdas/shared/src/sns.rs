//! SNS publishing for UploadTrail

use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::Client;
use tracing::info;

use crate::errors::{Error, Result};
use crate::store::NotificationChannel;

/// SNS rejects subjects of 100 characters or more
const MAX_SUBJECT_CHARS: usize = 99;

/// SNS-backed notification channel
#[derive(Clone)]
pub struct SnsChannel {
    client: Client,
}

impl SnsChannel {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Make a subject acceptable to SNS: no control characters, under the length limit.
///
/// Callers apply this before `NotificationChannel::publish`.
pub fn subject_line(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_SUBJECT_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[async_trait]
impl NotificationChannel for SnsChannel {
    async fn publish(&self, topic_arn: &str, subject: &str, message: &str) -> Result<String> {
        let output = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::Notification(DisplayErrorContext(&e).to_string()))?;

        let message_id = output.message_id().unwrap_or_default().to_string();
        info!(topic_arn = %topic_arn, message_id = %message_id, "Published notification");

        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_line_short_passthrough() {
        assert_eq!(subject_line("New upload: a.txt"), "New upload: a.txt");
    }

    #[test]
    fn test_subject_line_truncates() {
        let long = format!("New upload: {}", "x".repeat(200));
        let subject = subject_line(&long);
        assert_eq!(subject.chars().count(), 99);
        assert!(subject.starts_with("New upload: xxx"));
    }

    #[test]
    fn test_subject_line_strips_line_breaks() {
        assert_eq!(subject_line("New upload: a\nb.txt\r\n"), "New upload: a b.txt");
    }
}
