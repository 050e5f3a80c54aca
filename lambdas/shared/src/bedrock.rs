//! Bedrock runtime client for Anthropic models
//!
//! Requests use the Anthropic messages body that Bedrock expects for
//! `anthropic.*` model IDs.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::store::TextModel;

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Request body for `InvokeModel`
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub messages: Vec<Message>,
}

impl MessagesRequest {
    /// Single user turn, deterministic sampling
    pub fn single_prompt(prompt: &str, max_tokens: u32) -> Self {
        Self {
            anthropic_version: ANTHROPIC_VERSION.to_string(),
            max_tokens,
            temperature: 0.0,
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![ContentBlock::Text {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Response body from `InvokeModel`
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    /// Text of the first text block
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Other => None,
        })
    }
}

/// Bedrock-hosted model
#[derive(Clone)]
pub struct BedrockModel {
    client: Client,
    model_id: String,
    max_tokens: u32,
}

impl BedrockModel {
    pub fn new(client: Client, model_id: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl TextModel for BedrockModel {
    async fn complete(&self, prompt: &str) -> Result<Option<String>> {
        let request = MessagesRequest::single_prompt(prompt, self.max_tokens);
        let body = serde_json::to_vec(&request)?;

        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| Error::Model(DisplayErrorContext(&e).to_string()))?;

        let response: MessagesResponse = serde_json::from_slice(output.body().as_ref())?;
        debug!(model_id = %self.model_id, stop_reason = ?response.stop_reason, "Model responded");

        let text = response.first_text().map(str::to_string);
        if text.is_none() {
            warn!(model_id = %self.model_id, "Model response has no text content");
        }
        Ok(text)
    }
}
