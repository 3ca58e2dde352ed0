pub mod audio;
pub mod error;
pub mod flow_gateway;
pub mod flows;
pub mod gateway;
pub mod gemini;
pub mod media;
pub mod observability;
pub mod prompts;
pub mod validation;

pub use error::{FlowError, FlowErrorKind};
pub use flow_gateway::{FlowGateway, FlowGatewaySettings};
pub use flows::{FlowId, FlowRequest, FlowResponse, output_schema, request_schema};
pub use gateway::{
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
};
pub use gemini::{GeminiConfigError, GeminiGateway, GeminiGatewayConfig};
pub use prompts::{PromptPart, RenderedPrompt, render_prompt};
pub use validation::{
    FieldViolation, OutputValidationError, RequestValidationError, validate_output_value,
    validate_request_value,
};
