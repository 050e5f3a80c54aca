//! Error types for UploadTrail

use thiserror::Error;

/// Result type alias using UploadTrail Error
pub type Result<T> = std::result::Result<T, Error>;

/// UploadTrail error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed trigger payload (S3 event, queue message)
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// DynamoDB error
    #[error("Database error: {0}")]
    Database(String),

    /// S3 error
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// SNS error
    #[error("Notification error: {0}")]
    Notification(String),

    /// Bedrock error
    #[error("Model error: {0}")]
    Model(String),

    /// JSON Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// DynamoDB serialization error
    #[error("DynamoDB serialization error: {0}")]
    DynamoSerialization(String),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(String),
}

impl Error {
    /// Returns a stable label for structured logs
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidEvent(_) => "invalid_event",
            Error::Config(_) => "config_error",
            Error::Database(_) => "database_error",
            Error::ObjectStore(_) => "object_store_error",
            Error::Notification(_) => "notification_error",
            Error::Model(_) => "model_error",
            Error::Serialization(_) => "serialization_error",
            Error::DynamoSerialization(_) => "serialization_error",
            Error::Csv(_) => "csv_error",
        }
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = Error::Database("table not found".into());
        assert_eq!(err.code(), "database_error");

        let err = Error::Notification("throttled".into());
        assert_eq!(err.code(), "notification_error");
    }

    #[test]
    fn test_error_display() {
        let err = Error::ObjectStore("AccessDenied".into());
        assert_eq!(err.to_string(), "Object store error: AccessDenied");
    }

    #[test]
    fn test_serde_json_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert_eq!(err.code(), "serialization_error");
    }
}
