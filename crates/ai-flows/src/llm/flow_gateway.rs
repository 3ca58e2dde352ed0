use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use super::audio::{pcm_format_from_mime, pcm_to_wav};
use super::error::{FlowError, FlowErrorKind};
use super::flows::{
    CropDiseaseRequest, CropDiseaseResponse, CropDoctorChatRequest, CropDoctorChatResponse,
    DemandForecastRequest, DemandForecastResponse, FairPriceRequest, FairPriceResponse,
    FarmerChatRequest, FarmerChatResponse, FlowId, FlowRequest, FlowResponse, ModelKind,
    PricePredictionRequest, PricePredictionResponse, StorageAndSchemesRequest,
    StorageAndSchemesResponse, TextToSpeechRequest, TextToSpeechResponse, output_schema,
};
use super::gateway::{LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmGatewayResponse};
use super::media::encode_data_uri;
use super::observability::{FlowTelemetryEvent, log_flow_telemetry};
use super::prompts::render_prompt;
use super::validation::{validate_output_value, validate_request_value};
use crate::config::ConfigError;
use crate::config_env::{optional_trimmed_env, parse_u64_env};

const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
const DEFAULT_MODEL_TIMEOUT_MS: u64 = 20_000;
const WAV_MIME_TYPE: &str = "audio/wav";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowGatewaySettings {
    pub text_model: String,
    pub speech_model: String,
    pub model_timeout_ms: u64,
}

impl Default for FlowGatewaySettings {
    fn default() -> Self {
        Self {
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            model_timeout_ms: DEFAULT_MODEL_TIMEOUT_MS,
        }
    }
}

impl FlowGatewaySettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let model_timeout_ms = parse_u64_env("FLOW_MODEL_TIMEOUT_MS", DEFAULT_MODEL_TIMEOUT_MS)?;
        if model_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "FLOW_MODEL_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            text_model: optional_trimmed_env("FLOW_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            speech_model: optional_trimmed_env("FLOW_SPEECH_MODEL")
                .unwrap_or_else(|| DEFAULT_SPEECH_MODEL.to_string()),
            model_timeout_ms,
        })
    }
}

/// Runs flows end to end: validate, render, call the model, validate, return.
///
/// Holds no mutable state; clones share the underlying model client.
#[derive(Clone)]
pub struct FlowGateway {
    llm: Arc<dyn LlmGateway>,
    settings: FlowGatewaySettings,
}

struct Execution {
    response: FlowResponse,
    model_response: Option<LlmGatewayResponse>,
    degraded_by: Option<FlowErrorKind>,
}

impl FlowGateway {
    pub fn new(llm: Arc<dyn LlmGateway>, settings: FlowGatewaySettings) -> Self {
        Self { llm, settings }
    }

    pub fn settings(&self) -> &FlowGatewaySettings {
        &self.settings
    }

    /// Validates an untyped payload for `flow` and runs it.
    pub async fn invoke_json(&self, flow: FlowId, payload: &Value) -> Result<FlowResponse, FlowError> {
        let request =
            validate_request_value(flow, payload).map_err(FlowError::from_request_validation)?;
        self.run(request).await
    }

    pub async fn invoke(&self, request: FlowRequest) -> Result<FlowResponse, FlowError> {
        let flow = request.flow();
        let payload = serde_json::to_value(&request).map_err(|err| FlowError::Template {
            flow,
            message: err.to_string(),
        })?;
        self.invoke_json(flow, &payload).await
    }

    pub async fn suggest_fair_price(
        &self,
        request: FairPriceRequest,
    ) -> Result<FairPriceResponse, FlowError> {
        match self.invoke(FlowRequest::FairPrice(request)).await? {
            FlowResponse::FairPrice(response) => Ok(response),
            other => Err(mismatched_response(FlowId::FairPrice, &other)),
        }
    }

    pub async fn detect_crop_disease(
        &self,
        request: CropDiseaseRequest,
    ) -> Result<CropDiseaseResponse, FlowError> {
        match self.invoke(FlowRequest::CropDiseaseDetection(request)).await? {
            FlowResponse::CropDiseaseDetection(response) => Ok(response),
            other => Err(mismatched_response(FlowId::CropDiseaseDetection, &other)),
        }
    }

    pub async fn chat_with_crop_doctor(
        &self,
        request: CropDoctorChatRequest,
    ) -> Result<CropDoctorChatResponse, FlowError> {
        match self.invoke(FlowRequest::CropDoctorChat(request)).await? {
            FlowResponse::CropDoctorChat(response) => Ok(response),
            other => Err(mismatched_response(FlowId::CropDoctorChat, &other)),
        }
    }

    pub async fn chat_with_farmer(
        &self,
        request: FarmerChatRequest,
    ) -> Result<FarmerChatResponse, FlowError> {
        match self.invoke(FlowRequest::FarmerChat(request)).await? {
            FlowResponse::FarmerChat(response) => Ok(response),
            other => Err(mismatched_response(FlowId::FarmerChat, &other)),
        }
    }

    pub async fn forecast_demand(
        &self,
        request: DemandForecastRequest,
    ) -> Result<DemandForecastResponse, FlowError> {
        match self.invoke(FlowRequest::DemandForecast(request)).await? {
            FlowResponse::DemandForecast(response) => Ok(response),
            other => Err(mismatched_response(FlowId::DemandForecast, &other)),
        }
    }

    pub async fn predict_future_price(
        &self,
        request: PricePredictionRequest,
    ) -> Result<PricePredictionResponse, FlowError> {
        match self.invoke(FlowRequest::PricePrediction(request)).await? {
            FlowResponse::PricePrediction(response) => Ok(response),
            other => Err(mismatched_response(FlowId::PricePrediction, &other)),
        }
    }

    pub async fn recommend_storage_and_schemes(
        &self,
        request: StorageAndSchemesRequest,
    ) -> Result<StorageAndSchemesResponse, FlowError> {
        match self.invoke(FlowRequest::StorageAndSchemes(request)).await? {
            FlowResponse::StorageAndSchemes(response) => Ok(response),
            other => Err(mismatched_response(FlowId::StorageAndSchemes, &other)),
        }
    }

    pub async fn text_to_speech(
        &self,
        request: TextToSpeechRequest,
    ) -> Result<TextToSpeechResponse, FlowError> {
        match self.invoke(FlowRequest::TextToSpeech(request)).await? {
            FlowResponse::TextToSpeech(response) => Ok(response),
            other => Err(mismatched_response(FlowId::TextToSpeech, &other)),
        }
    }

    async fn run(&self, request: FlowRequest) -> Result<FlowResponse, FlowError> {
        let flow = request.flow();
        let invocation_id = Uuid::new_v4();
        let started_at = Instant::now();

        let result = self.execute(request).await;

        let telemetry = FlowTelemetryEvent::new(flow, invocation_id, started_at.elapsed());
        match result {
            Ok(execution) => {
                let telemetry = match &execution.model_response {
                    Some(model_response) => telemetry.with_model_response(model_response),
                    None => telemetry,
                };
                let telemetry = match execution.degraded_by {
                    Some(kind) => telemetry.degraded(kind.as_str()),
                    None => telemetry,
                };
                log_flow_telemetry(&telemetry);
                Ok(execution.response)
            }
            Err(err) => {
                log_flow_telemetry(&telemetry.failed(err.kind().as_str()));
                Err(err)
            }
        }
    }

    async fn execute(&self, request: FlowRequest) -> Result<Execution, FlowError> {
        let flow = request.flow();
        let prompt = render_prompt(&request).map_err(|err| FlowError::from_render(flow, err))?;

        let llm_request = match &request {
            FlowRequest::TextToSpeech(speech) => LlmGatewayRequest::speech(
                flow,
                &self.settings.speech_model,
                prompt,
                speech.language.voice_name(),
            ),
            _ => LlmGatewayRequest::structured(
                flow,
                &self.settings.text_model,
                prompt,
                output_schema(flow),
            ),
        };

        let timeout_ms = self.settings.model_timeout_ms;
        let generated = timeout(
            Duration::from_millis(timeout_ms),
            self.llm.generate(llm_request),
        )
        .await
        .unwrap_or(Err(LlmGatewayError::Timeout));

        let model_response = match generated {
            Ok(model_response) => model_response,
            Err(LlmGatewayError::Unavailable { status }) if flow.degrades_on_unavailable() => {
                let Some(response) = degraded_response(flow) else {
                    return Err(FlowError::UpstreamUnavailable { flow, status });
                };
                warn!(
                    flow = flow.as_str(),
                    status, "model unavailable, returning empty result"
                );
                return Ok(Execution {
                    response,
                    model_response: None,
                    degraded_by: Some(FlowErrorKind::UpstreamUnavailable),
                });
            }
            Err(err) => return Err(FlowError::from_gateway(flow, timeout_ms, err)),
        };

        let response = match flow.model_kind() {
            ModelKind::Speech => speech_response(flow, &model_response)?,
            ModelKind::Structured => structured_response(flow, &model_response)?,
        };

        Ok(Execution {
            response,
            model_response: Some(model_response),
            degraded_by: None,
        })
    }
}

fn structured_response(
    flow: FlowId,
    model_response: &LlmGatewayResponse,
) -> Result<FlowResponse, FlowError> {
    let output = match &model_response.output {
        Some(Value::Null) | None => return Err(FlowError::EmptyModelResponse { flow }),
        Some(output) => output,
    };

    validate_output_value(flow, output).map_err(FlowError::from_output_validation)
}

fn speech_response(
    flow: FlowId,
    model_response: &LlmGatewayResponse,
) -> Result<FlowResponse, FlowError> {
    let Some(media) = model_response
        .media
        .as_ref()
        .filter(|media| !media.data.is_empty())
    else {
        return Err(FlowError::EmptyModelResponse { flow });
    };

    let wav = if media.mime_type.starts_with(WAV_MIME_TYPE) {
        media.data.clone()
    } else {
        pcm_to_wav(&media.data, pcm_format_from_mime(&media.mime_type))
    };

    Ok(FlowResponse::TextToSpeech(TextToSpeechResponse {
        audio_data_uri: Some(encode_data_uri(WAV_MIME_TYPE, &wav)),
    }))
}

fn degraded_response(flow: FlowId) -> Option<FlowResponse> {
    match flow {
        FlowId::TextToSpeech => Some(FlowResponse::TextToSpeech(TextToSpeechResponse {
            audio_data_uri: None,
        })),
        _ => None,
    }
}

fn mismatched_response(flow: FlowId, response: &FlowResponse) -> FlowError {
    FlowError::MalformedModelResponse {
        flow,
        detail: format!("expected {flow} output, got {}", response.flow()),
    }
}
