//! Runtime configuration, read from the Lambda environment once per cold start

use std::str::FromStr;

use crate::errors::{Error, Result};

const TABLE_NAME_ENV: &str = "UPLOADTRAIL_TABLE";
const QUERY_STRATEGY_ENV: &str = "UPLOADTRAIL_QUERY_STRATEGY";
const TIME_INDEX_ENV: &str = "UPLOADTRAIL_TIME_INDEX";
const REPORT_BUCKET_ENV: &str = "UPLOADTRAIL_REPORT_BUCKET";
const REPORT_TOPIC_ENV: &str = "UPLOADTRAIL_REPORT_TOPIC_ARN";
const UPLOAD_TOPIC_ENV: &str = "UPLOADTRAIL_UPLOAD_TOPIC_ARN";
const SUMMARY_TOPIC_ENV: &str = "UPLOADTRAIL_SUMMARY_TOPIC_ARN";
const MODEL_ID_ENV: &str = "UPLOADTRAIL_MODEL_ID";
const MODEL_MAX_TOKENS_ENV: &str = "UPLOADTRAIL_MODEL_MAX_TOKENS";
const SIGNATURE_ENV: &str = "UPLOADTRAIL_SUMMARY_SIGNATURE";

const DEFAULT_TABLE_NAME: &str = "upload-metadata";
const DEFAULT_TIME_INDEX: &str = "by-upload-day";
const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";
const DEFAULT_MODEL_MAX_TOKENS: u32 = 1000;
const DEFAULT_SIGNATURE: &str = "The Operations Team";

/// How the report reads the upload window from the metadata table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStrategy {
    /// Full table scan with a filter expression
    Scan,
    /// Per-day queries against a GSI keyed by (upload_day, uploaded_at)
    Index { index_name: String },
}

impl FromStr for QueryStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "scan" => Ok(QueryStrategy::Scan),
            "index" => Ok(QueryStrategy::Index {
                index_name: DEFAULT_TIME_INDEX.to_string(),
            }),
            other => Err(Error::Config(format!(
                "{} must be 'scan' or 'index', got '{}'",
                QUERY_STRATEGY_ENV, other
            ))),
        }
    }
}

/// Settings shared by all handlers.
///
/// Topic and bucket settings are optional here; each binary asks for the
/// ones it needs through the `require_*` accessors.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub query_strategy: QueryStrategy,
    pub report_bucket: Option<String>,
    pub report_topic_arn: Option<String>,
    pub upload_topic_arn: Option<String>,
    pub summary_topic_arn: Option<String>,
    pub model_id: String,
    pub model_max_tokens: u32,
    pub summary_signature: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            query_strategy: QueryStrategy::Scan,
            report_bucket: None,
            report_topic_arn: None,
            upload_topic_arn: None,
            summary_topic_arn: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            model_max_tokens: DEFAULT_MODEL_MAX_TOKENS,
            summary_signature: DEFAULT_SIGNATURE.to_string(),
        }
    }
}

impl Config {
    /// Load from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (for testing)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut query_strategy = match non_empty(QUERY_STRATEGY_ENV) {
            Some(raw) => raw.parse::<QueryStrategy>()?,
            None => defaults.query_strategy,
        };
        if let (QueryStrategy::Index { index_name }, Some(name)) =
            (&mut query_strategy, non_empty(TIME_INDEX_ENV))
        {
            *index_name = name;
        }

        let model_max_tokens = match non_empty(MODEL_MAX_TOKENS_ENV) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                Error::Config(format!("{} is not a number: {}", MODEL_MAX_TOKENS_ENV, e))
            })?,
            None => defaults.model_max_tokens,
        };

        Ok(Self {
            table_name: non_empty(TABLE_NAME_ENV).unwrap_or(defaults.table_name),
            query_strategy,
            report_bucket: non_empty(REPORT_BUCKET_ENV),
            report_topic_arn: non_empty(REPORT_TOPIC_ENV),
            upload_topic_arn: non_empty(UPLOAD_TOPIC_ENV),
            summary_topic_arn: non_empty(SUMMARY_TOPIC_ENV),
            model_id: non_empty(MODEL_ID_ENV).unwrap_or(defaults.model_id),
            model_max_tokens,
            summary_signature: non_empty(SIGNATURE_ENV).unwrap_or(defaults.summary_signature),
        })
    }

    pub fn require_report_bucket(&self) -> Result<&str> {
        required(&self.report_bucket, REPORT_BUCKET_ENV)
    }

    pub fn require_report_topic(&self) -> Result<&str> {
        required(&self.report_topic_arn, REPORT_TOPIC_ENV)
    }

    pub fn require_upload_topic(&self) -> Result<&str> {
        required(&self.upload_topic_arn, UPLOAD_TOPIC_ENV)
    }

    pub fn require_summary_topic(&self) -> Result<&str> {
        required(&self.summary_topic_arn, SUMMARY_TOPIC_ENV)
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| Error::Config(format!("{} must be set", key)))
}
