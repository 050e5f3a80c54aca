//! UploadTrail Summarize Lambda
//!
//! Triggered by SQS. Each message names an S3 object; the file is summarized
//! by a Bedrock-hosted model and the summary is sent to the summary topic.

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_lambda_events::event::sqs::SqsEvent;
use chrono::Utc;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uploadtrail_core::{BedrockModel, Config, HandlerResponse, S3ObjectStore, SnsChannel, Summarizer};

async fn handler(
    summarizer: &Summarizer,
    event: LambdaEvent<SqsEvent>,
) -> Result<HandlerResponse, LambdaError> {
    let (payload, _context) = event.into_parts();

    info!(record_count = payload.records.len(), "Processing SQS batch");

    Ok(summarizer.handle_event(&payload, Utc::now()).await)
}

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env()?;
    let topic_arn = config.require_summary_topic()?.to_string();

    // Initialize AWS clients once per cold start
    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    info!(model_id = %config.model_id, topic_arn = %topic_arn, "Starting summarize handler");

    let summarizer = Arc::new(Summarizer::new(
        Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&aws))),
        Arc::new(BedrockModel::new(
            aws_sdk_bedrockruntime::Client::new(&aws),
            config.model_id.clone(),
            config.model_max_tokens,
        )),
        Arc::new(SnsChannel::new(aws_sdk_sns::Client::new(&aws))),
        topic_arn,
        config.summary_signature.clone(),
    ));

    run(service_fn(move |event: LambdaEvent<SqsEvent>| {
        let summarizer = summarizer.clone();
        async move { handler(&summarizer, event).await }
    }))
    .await
}
