use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::flows::FlowId;
use super::prompts::RenderedPrompt;

pub type LlmGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LlmGatewayResponse, LlmGatewayError>> + Send + 'a>>;

/// What the model is asked to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutputSpec {
    /// A JSON document conforming to `schema`.
    Json { schema: Value },
    /// Spoken audio rendered with a prebuilt voice.
    Speech { voice_name: String },
}

#[derive(Debug, Clone)]
pub struct LlmGatewayRequest {
    pub flow: FlowId,
    pub model: String,
    pub prompt: RenderedPrompt,
    pub output: ModelOutputSpec,
}

impl LlmGatewayRequest {
    pub fn structured(
        flow: FlowId,
        model: impl Into<String>,
        prompt: RenderedPrompt,
        schema: Value,
    ) -> Self {
        Self {
            flow,
            model: model.into(),
            prompt,
            output: ModelOutputSpec::Json { schema },
        }
    }

    pub fn speech(
        flow: FlowId,
        model: impl Into<String>,
        prompt: RenderedPrompt,
        voice_name: impl Into<String>,
    ) -> Self {
        Self {
            flow,
            model: model.into(),
            prompt,
            output: ModelOutputSpec::Speech {
                voice_name: voice_name.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmTokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Binary payload returned inline by the model, already base64-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineMedia {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct LlmGatewayResponse {
    pub model: String,
    pub provider_request_id: Option<String>,
    /// Structured output, when the model produced any text.
    pub output: Option<Value>,
    pub media: Option<InlineMedia>,
    pub usage: Option<LlmTokenUsage>,
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider is unavailable (status={status})")]
    Unavailable { status: u16 },
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

pub trait LlmGateway: Send + Sync {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a>;
}
