use thiserror::Error;

use super::flows::FlowId;
use super::gateway::LlmGatewayError;
use super::prompts::PromptRenderError;
use super::validation::{FieldViolation, OutputValidationError, RequestValidationError};

/// Stable classification of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowErrorKind {
    InvalidRequest,
    EmptyModelResponse,
    MalformedModelResponse,
    UpstreamUnavailable,
    Timeout,
    Provider,
    Template,
}

impl FlowErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::EmptyModelResponse => "empty_model_response",
            Self::MalformedModelResponse => "malformed_model_response",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::Timeout => "model_timeout",
            Self::Provider => "model_provider_failure",
            Self::Template => "template_failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("invalid request for {flow}: {violation}")]
    InvalidRequest {
        flow: FlowId,
        violation: FieldViolation,
    },
    #[error("model returned no output for {flow}")]
    EmptyModelResponse { flow: FlowId },
    #[error("model output for {flow} is malformed: {detail}")]
    MalformedModelResponse { flow: FlowId, detail: String },
    #[error("model is unavailable for {flow} (status={status})")]
    UpstreamUnavailable { flow: FlowId, status: u16 },
    #[error("model call for {flow} exceeded {timeout_ms}ms")]
    Timeout { flow: FlowId, timeout_ms: u64 },
    #[error("model call for {flow} failed: {detail}")]
    Provider { flow: FlowId, detail: String },
    /// A prompt template or schema could not be built or rendered.
    #[error("flow {flow} could not be prepared: {message}")]
    Template { flow: FlowId, message: String },
}

impl FlowError {
    pub const fn kind(&self) -> FlowErrorKind {
        match self {
            Self::InvalidRequest { .. } => FlowErrorKind::InvalidRequest,
            Self::EmptyModelResponse { .. } => FlowErrorKind::EmptyModelResponse,
            Self::MalformedModelResponse { .. } => FlowErrorKind::MalformedModelResponse,
            Self::UpstreamUnavailable { .. } => FlowErrorKind::UpstreamUnavailable,
            Self::Timeout { .. } => FlowErrorKind::Timeout,
            Self::Provider { .. } => FlowErrorKind::Provider,
            Self::Template { .. } => FlowErrorKind::Template,
        }
    }

    pub const fn flow(&self) -> FlowId {
        match self {
            Self::InvalidRequest { flow, .. }
            | Self::EmptyModelResponse { flow }
            | Self::MalformedModelResponse { flow, .. }
            | Self::UpstreamUnavailable { flow, .. }
            | Self::Timeout { flow, .. }
            | Self::Provider { flow, .. }
            | Self::Template { flow, .. } => *flow,
        }
    }

    pub(crate) fn from_request_validation(err: RequestValidationError) -> Self {
        match err {
            RequestValidationError::Violation { flow, violation } => {
                Self::InvalidRequest { flow, violation }
            }
            RequestValidationError::SchemaCompile { flow, message } => {
                Self::Template { flow, message }
            }
        }
    }

    pub(crate) fn from_output_validation(err: OutputValidationError) -> Self {
        match err {
            OutputValidationError::SchemaCompile { flow, message } => {
                Self::Template { flow, message }
            }
            OutputValidationError::SchemaViolation { flow, errors } => {
                Self::MalformedModelResponse {
                    flow,
                    detail: errors.join("; "),
                }
            }
            OutputValidationError::Decode { flow, source } => Self::MalformedModelResponse {
                flow,
                detail: source.to_string(),
            },
        }
    }

    pub(crate) fn from_render(flow: FlowId, err: PromptRenderError) -> Self {
        Self::Template {
            flow,
            message: err.to_string(),
        }
    }

    pub(crate) fn from_gateway(flow: FlowId, timeout_ms: u64, err: LlmGatewayError) -> Self {
        match err {
            LlmGatewayError::Timeout => Self::Timeout { flow, timeout_ms },
            LlmGatewayError::Unavailable { status } => Self::UpstreamUnavailable { flow, status },
            LlmGatewayError::InvalidProviderPayload(detail) => {
                Self::MalformedModelResponse { flow, detail }
            }
            LlmGatewayError::ProviderFailure(detail) => Self::Provider { flow, detail },
        }
    }
}
