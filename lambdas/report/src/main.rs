//! UploadTrail Report Lambda
//!
//! Triggered on a schedule (EventBridge). Writes a CSV of the last week's
//! uploads to the report bucket and publishes a link to the report topic.
//! The trigger payload is only logged.

use std::sync::Arc;

use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uploadtrail_core::report::respond;
use uploadtrail_core::{
    Config, DynamoMetadataStore, HandlerResponse, ReportBuilder, S3ObjectStore, SnsChannel,
};

async fn handler(
    builder: &ReportBuilder,
    event: LambdaEvent<Value>,
) -> Result<HandlerResponse, LambdaError> {
    let (payload, context) = event.into_parts();

    let trigger = payload
        .get("detail-type")
        .and_then(Value::as_str)
        .unwrap_or("manual invocation");
    info!(request_id = %context.request_id, trigger = %trigger, "Generating weekly report");

    Ok(respond(builder.generate_and_publish().await))
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;
    let bucket = config.require_report_bucket()?.to_string();
    let topic_arn = config.require_report_topic()?.to_string();

    // Initialize AWS clients once per cold start
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let metadata = DynamoMetadataStore::new(
        aws_sdk_dynamodb::Client::new(&aws),
        config.table_name.clone(),
        config.query_strategy.clone(),
    );
    info!(
        table = %metadata.table_name(),
        strategy = ?config.query_strategy,
        bucket = %bucket,
        "Starting report handler"
    );

    let builder = Arc::new(ReportBuilder::new(
        Arc::new(metadata),
        Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&aws))),
        Arc::new(SnsChannel::new(aws_sdk_sns::Client::new(&aws))),
        bucket,
        topic_arn,
    ));

    run(service_fn(move |event: LambdaEvent<Value>| {
        let builder = builder.clone();
        async move { handler(&builder, event).await }
    }))
    .await
}
