use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::gateway::{
    InlineMedia, LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest,
    LlmGatewayResponse, LlmTokenUsage, ModelOutputSpec,
};
use super::prompts::PromptPart;
use crate::config::ConfigError;
use crate::config_env::{optional_trimmed_env, parse_u64_env};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const API_KEY_HEADER: &str = "x-goog-api-key";
const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct GeminiGatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

impl GeminiGatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = optional_trimmed_env("GEMINI_API_KEY")
            .or_else(|| optional_trimmed_env("GOOGLE_API_KEY"))
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        let base_url = optional_trimmed_env("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidConfiguration(
                "GEMINI_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_key,
            timeout_ms: parse_u64_env("GEMINI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
        })
    }

    fn generate_content_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Error)]
pub enum GeminiConfigError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build Gemini http client: {0}")]
    HttpClient(String),
}

/// Gemini `generateContent` client. Sends exactly one request per call.
#[derive(Clone)]
pub struct GeminiGateway {
    client: reqwest::Client,
    config: GeminiGatewayConfig,
}

impl GeminiGateway {
    pub fn new(config: GeminiGatewayConfig) -> Result<Self, GeminiConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| GeminiConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn send_once(
        &self,
        request: &LlmGatewayRequest,
    ) -> Result<LlmGatewayResponse, LlmGatewayError> {
        let request_body = build_request_body(request);

        let response = self
            .client
            .post(self.config.generate_content_url(&request.model))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmGatewayError::Timeout
                } else {
                    LlmGatewayError::ProviderFailure("request_unavailable".to_string())
                }
            })?;

        let status = response.status();
        if is_unavailable_status(status) {
            return Err(LlmGatewayError::Unavailable {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                LlmGatewayError::Timeout
            } else {
                LlmGatewayError::InvalidProviderPayload("response_body_read_failed".to_string())
            }
        })?;

        if !status.is_success() {
            let provider_code = parse_provider_error_code(&body);
            return Err(LlmGatewayError::ProviderFailure(format!(
                "status={} code={provider_code}",
                status.as_u16()
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|_| {
            LlmGatewayError::InvalidProviderPayload("response_json_parse_failed".to_string())
        })?;

        response_from_candidates(&request.model, &request.output, parsed)
    }
}

impl LlmGateway for GeminiGateway {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move { self.send_once(&request).await })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart {
    Text(String),
    InlineData(Blob),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    text: Option<String>,
    inline_data: Option<Blob>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
    total_token_count: Option<u64>,
}

fn build_request_body(request: &LlmGatewayRequest) -> GenerateContentRequest {
    let parts = request
        .prompt
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => RequestPart::Text(text.clone()),
            PromptPart::Media {
                mime_type,
                base64_data,
            } => RequestPart::InlineData(Blob {
                mime_type: mime_type.clone(),
                data: base64_data.clone(),
            }),
        })
        .collect();

    let generation_config = match &request.output {
        ModelOutputSpec::Json { schema } => GenerationConfig {
            response_mime_type: Some(JSON_MIME_TYPE),
            response_json_schema: Some(provider_schema(schema)),
            ..GenerationConfig::default()
        },
        ModelOutputSpec::Speech { voice_name } => GenerationConfig {
            response_modalities: Some(vec!["AUDIO"]),
            speech_config: Some(SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: voice_name.clone(),
                    },
                },
            }),
            ..GenerationConfig::default()
        },
    };

    GenerateContentRequest {
        contents: vec![RequestContent {
            role: "user",
            parts,
        }],
        generation_config,
    }
}

/// The provider rejects the meta-schema keyword, so it is dropped before sending.
fn provider_schema(schema: &Value) -> Value {
    let mut schema = schema.clone();
    if let Value::Object(fields) = &mut schema {
        fields.remove("$schema");
    }
    schema
}

/// Speech replies may carry narration text next to the audio; only JSON requests read text.
fn response_from_candidates(
    requested_model: &str,
    output_spec: &ModelOutputSpec,
    parsed: GenerateContentResponse,
) -> Result<LlmGatewayResponse, LlmGatewayError> {
    let parts = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    let mut text = String::new();
    let mut media = None;
    for part in parts.into_iter().filter(|part| !part.thought) {
        if let Some(fragment) = part.text {
            text.push_str(&fragment);
        }
        if media.is_none()
            && let Some(blob) = part.inline_data
        {
            let data = STANDARD.decode(blob.data.as_bytes()).map_err(|_| {
                LlmGatewayError::InvalidProviderPayload("inline_data_not_base64".to_string())
            })?;
            media = Some(InlineMedia {
                mime_type: blob.mime_type,
                data,
            });
        }
    }

    let expects_json = matches!(output_spec, ModelOutputSpec::Json { .. });
    let output = if !expects_json || text.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(text.trim()).map_err(|_| {
            LlmGatewayError::InvalidProviderPayload("content_not_json".to_string())
        })?)
    };

    Ok(LlmGatewayResponse {
        model: parsed
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
        provider_request_id: parsed.response_id,
        output,
        media,
        usage: parsed.usage_metadata.map(|usage| LlmTokenUsage {
            prompt_tokens: clamp_u64_to_u32(usage.prompt_token_count.unwrap_or(0)),
            completion_tokens: clamp_u64_to_u32(usage.candidates_token_count.unwrap_or(0)),
            total_tokens: clamp_u64_to_u32(usage.total_token_count.unwrap_or(0)),
        }),
    })
}

fn is_unavailable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        status: Option<String>,
        code: Option<Value>,
    }

    let details = serde_json::from_str::<ProviderErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);
    let Some(details) = details else {
        return "unknown".to_string();
    };

    if let Some(status) = details.status.filter(|status| !status.is_empty()) {
        return status;
    }
    match details.code {
        Some(Value::String(code)) => code,
        Some(Value::Number(code)) => code.to_string(),
        _ => "unknown".to_string(),
    }
}

fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
