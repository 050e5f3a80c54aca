//! UploadTrail Core Library
//!
//! Shared functionality for UploadTrail Lambda functions including:
//! - Domain models and configuration
//! - Service ports (metadata table, object store, notifications, model)
//!   with AWS and in-memory implementations
//! - Upload ingestion, the weekly report, and queued file summaries
//! - Error types

pub mod models;
pub mod config;
pub mod errors;
pub mod store;
pub mod dynamo;
pub mod s3;
pub mod sns;
pub mod bedrock;
pub mod memory;
pub mod ingest;
pub mod report;
pub mod summarize;

pub use models::*;
pub use config::{Config, QueryStrategy};
pub use errors::{Error, Result};
pub use store::{MetadataStore, NotificationChannel, ObjectStore, TextModel};
pub use dynamo::DynamoMetadataStore;
pub use s3::S3ObjectStore;
pub use sns::SnsChannel;
pub use bedrock::BedrockModel;
pub use ingest::UploadRecorder;
pub use report::{ReportBuilder, ReportOutcome};
pub use summarize::Summarizer;
