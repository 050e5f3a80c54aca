//! DynamoDB operations for UploadTrail
//!
//! One item per uploaded object:
//!
//! | Attribute     | Type | Purpose                                     |
//! |---------------|------|---------------------------------------------|
//! | file_name     | S    | Partition key (object key)                  |
//! | uploaded_at   | S    | Fixed-width RFC 3339 processing timestamp   |
//! | size_bytes    | N    | Object size                                 |
//! | upload_day    | S    | `YYYY-MM-DD`, partition key of the time GSI |
//!
//! The optional GSI (`by-upload-day` by default) uses `upload_day` as its
//! partition key and `uploaded_at` as its sort key.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::NaiveDate;
use serde_dynamo::{from_item, to_item};
use tracing::{debug, warn};

use crate::config::QueryStrategy;
use crate::errors::{Error, Result};
use crate::models::{timestamp, ReportWindow, UploadRecord};
use crate::store::MetadataStore;

type Item = HashMap<String, AttributeValue>;

/// DynamoDB-backed metadata table
pub struct DynamoMetadataStore {
    client: Client,
    table_name: String,
    query_strategy: QueryStrategy,
}

impl DynamoMetadataStore {
    pub fn new(client: Client, table_name: impl Into<String>, query_strategy: QueryStrategy) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            query_strategy,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Full scan with a filter; every page is read
    async fn scan_window(&self, bounds: &WindowBounds) -> Result<Vec<UploadRecord>> {
        let mut records = Vec::new();
        let mut exclusive_start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("uploaded_at BETWEEN :start AND :end")
                .expression_attribute_values(":start", AttributeValue::S(bounds.start.clone()))
                .expression_attribute_values(":end", AttributeValue::S(bounds.end.clone()))
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(|e| Error::Database(DisplayErrorContext(&e).to_string()))?;

            records.extend(decode_items(result.items.unwrap_or_default()));

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                _ => break,
            }
        }

        Ok(records)
    }

    /// One GSI query per calendar day of the window
    async fn query_index_window(
        &self,
        index_name: &str,
        bounds: &WindowBounds,
    ) -> Result<Vec<UploadRecord>> {
        let mut records = Vec::new();

        for day in &bounds.days {
            let mut exclusive_start_key: Option<Item> = None;
            loop {
                let result = self
                    .client
                    .query()
                    .table_name(&self.table_name)
                    .index_name(index_name)
                    .key_condition_expression("upload_day = :day AND uploaded_at BETWEEN :start AND :end")
                    .expression_attribute_values(":day", AttributeValue::S(day.clone()))
                    .expression_attribute_values(":start", AttributeValue::S(bounds.start.clone()))
                    .expression_attribute_values(":end", AttributeValue::S(bounds.end.clone()))
                    .set_exclusive_start_key(exclusive_start_key.take())
                    .send()
                    .await
                    .map_err(|e| Error::Database(DisplayErrorContext(&e).to_string()))?;

                records.extend(decode_items(result.items.unwrap_or_default()));

                match result.last_evaluated_key {
                    Some(key) if !key.is_empty() => exclusive_start_key = Some(key),
                    _ => break,
                }
            }
        }

        Ok(records)
    }
}

/// Attribute values bounding a window query
#[derive(Debug, PartialEq, Eq)]
struct WindowBounds {
    start: String,
    end: String,
    /// `upload_day` partitions touched by the window, oldest first
    days: Vec<String>,
}

impl WindowBounds {
    fn new(window: &ReportWindow) -> Self {
        Self {
            start: timestamp::format(&window.start),
            end: timestamp::format(&window.end),
            days: window.days().iter().map(NaiveDate::to_string).collect(),
        }
    }
}

/// Items that fail to decode are skipped
fn decode_items(items: Vec<Item>) -> impl Iterator<Item = UploadRecord> {
    items.into_iter().filter_map(|item| match from_item(item) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "Skipping malformed upload record");
            None
        }
    })
}

#[async_trait]
impl MetadataStore for DynamoMetadataStore {
    async fn put_record(&self, record: &UploadRecord) -> Result<()> {
        let mut item: Item =
            to_item(record).map_err(|e| Error::DynamoSerialization(e.to_string()))?;
        item.insert(
            "upload_day".to_string(),
            AttributeValue::S(record.upload_day().to_string()),
        );

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| Error::Database(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    async fn records_in(&self, window: &ReportWindow) -> Result<Vec<UploadRecord>> {
        let bounds = WindowBounds::new(window);

        let records = match &self.query_strategy {
            QueryStrategy::Scan => self.scan_window(&bounds).await?,
            QueryStrategy::Index { index_name } => {
                self.query_index_window(index_name, &bounds).await?
            }
        };

        debug!(
            table = %self.table_name,
            start = %bounds.start,
            end = %bounds.end,
            count = records.len(),
            "Read upload records"
        );

        Ok(records)
    }
}
