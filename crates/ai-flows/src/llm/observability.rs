use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use super::flows::FlowId;
use super::gateway::{LlmGatewayResponse, LlmTokenUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    Success,
    /// The model was unavailable and the flow returned its documented empty result.
    Degraded,
    Failure,
}

impl FlowOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Degraded => "degraded",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowTelemetryEvent {
    pub flow: FlowId,
    pub invocation_id: Uuid,
    pub outcome: FlowOutcome,
    pub latency_ms: u64,
    pub model: Option<String>,
    pub provider_request_id: Option<String>,
    pub usage: Option<LlmTokenUsage>,
    pub error_type: Option<&'static str>,
}

impl FlowTelemetryEvent {
    pub fn new(flow: FlowId, invocation_id: Uuid, latency: Duration) -> Self {
        Self {
            flow,
            invocation_id,
            outcome: FlowOutcome::Success,
            latency_ms: duration_to_millis(latency),
            model: None,
            provider_request_id: None,
            usage: None,
            error_type: None,
        }
    }

    pub fn with_model_response(mut self, response: &LlmGatewayResponse) -> Self {
        self.model = Some(response.model.clone());
        self.provider_request_id = response.provider_request_id.clone();
        self.usage = response.usage.clone();
        self
    }

    pub fn degraded(mut self, error_type: &'static str) -> Self {
        self.outcome = FlowOutcome::Degraded;
        self.error_type = Some(error_type);
        self
    }

    pub fn failed(mut self, error_type: &'static str) -> Self {
        self.outcome = FlowOutcome::Failure;
        self.error_type = Some(error_type);
        self
    }
}

pub fn log_flow_telemetry(telemetry: &FlowTelemetryEvent) {
    let prompt_tokens = telemetry.usage.as_ref().map(|usage| usage.prompt_tokens);
    let completion_tokens = telemetry
        .usage
        .as_ref()
        .map(|usage| usage.completion_tokens);
    let total_tokens = telemetry.usage.as_ref().map(|usage| usage.total_tokens);

    match telemetry.outcome {
        FlowOutcome::Success => info!(
            metric_name = "flow_invocation",
            flow = telemetry.flow.as_str(),
            invocation_id = %telemetry.invocation_id,
            outcome = telemetry.outcome.as_str(),
            model = ?telemetry.model,
            provider_request_id = ?telemetry.provider_request_id,
            latency_ms = telemetry.latency_ms,
            prompt_tokens = ?prompt_tokens,
            completion_tokens = ?completion_tokens,
            total_tokens = ?total_tokens,
            "flow invocation metrics"
        ),
        FlowOutcome::Degraded | FlowOutcome::Failure => warn!(
            metric_name = "flow_invocation",
            flow = telemetry.flow.as_str(),
            invocation_id = %telemetry.invocation_id,
            outcome = telemetry.outcome.as_str(),
            model = ?telemetry.model,
            latency_ms = telemetry.latency_ms,
            error_type = ?telemetry.error_type,
            "flow invocation metrics"
        ),
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::{FlowOutcome, FlowTelemetryEvent};
    use crate::llm::flows::FlowId;
    use crate::llm::gateway::{LlmGatewayResponse, LlmTokenUsage};

    #[test]
    fn success_event_carries_model_usage() {
        let response = LlmGatewayResponse {
            model: "gemini-2.5-flash".to_string(),
            provider_request_id: Some("resp-7".to_string()),
            usage: Some(LlmTokenUsage {
                prompt_tokens: 10,
                completion_tokens: 4,
                total_tokens: 14,
            }),
            ..LlmGatewayResponse::default()
        };

        let event = FlowTelemetryEvent::new(
            FlowId::DemandForecast,
            Uuid::new_v4(),
            Duration::from_millis(35),
        )
        .with_model_response(&response);

        assert_eq!(event.outcome, FlowOutcome::Success);
        assert_eq!(event.latency_ms, 35);
        assert_eq!(event.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(event.usage.map(|usage| usage.total_tokens), Some(14));
        assert!(event.error_type.is_none());
    }

    #[test]
    fn degraded_and_failed_events_record_error_type() {
        let base = FlowTelemetryEvent::new(FlowId::TextToSpeech, Uuid::new_v4(), Duration::ZERO);

        let degraded = base.clone().degraded("upstream_unavailable");
        assert_eq!(degraded.outcome.as_str(), "degraded");
        assert_eq!(degraded.error_type, Some("upstream_unavailable"));

        let failed = base.failed("model_timeout");
        assert_eq!(failed.outcome.as_str(), "failure");
        assert_eq!(failed.error_type, Some("model_timeout"));
    }
}
