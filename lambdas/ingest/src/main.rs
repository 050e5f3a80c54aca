//! UploadTrail Ingest Lambda
//!
//! Triggered by S3 `ObjectCreated` events. Stores one metadata record per
//! uploaded object in the upload table.

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uploadtrail_core::{Config, DynamoMetadataStore, HandlerResponse, S3ObjectStore, UploadRecorder};

async fn handler(
    recorder: &UploadRecorder,
    event: LambdaEvent<S3Event>,
) -> Result<HandlerResponse, LambdaError> {
    let (payload, _context) = event.into_parts();

    info!(record_count = payload.records.len(), "Processing S3 event");

    Ok(recorder.handle_event(&payload).await)
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;

    // Initialize AWS clients once per cold start
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let metadata = DynamoMetadataStore::new(
        aws_sdk_dynamodb::Client::new(&aws),
        config.table_name.clone(),
        config.query_strategy.clone(),
    );
    info!(table = %metadata.table_name(), "Starting ingest handler");

    let recorder = Arc::new(UploadRecorder::new(
        Arc::new(metadata),
        Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&aws))),
    ));

    run(service_fn(move |event: LambdaEvent<S3Event>| {
        let recorder = recorder.clone();
        async move { handler(&recorder, event).await }
    }))
    .await
}
