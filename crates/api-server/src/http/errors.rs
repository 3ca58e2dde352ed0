use ai_flows::llm::{FlowError, FlowErrorKind, FlowId};
use ai_flows::models::{ErrorBody, ErrorResponse};
use axum::Json;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(super) fn unknown_flow_response(flow_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        "unknown_flow",
        &format!("No flow named '{flow_id}'"),
    )
}

pub(super) fn body_rejection_response(flow: FlowId, rejection: &BytesRejection) -> Response {
    let status = rejection.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(flow = flow.as_str(), "request body exceeds the configured limit");
        return error_response(
            status,
            "payload_too_large",
            "Request body exceeds the configured size limit",
        );
    }

    bad_request_response(
        "invalid_request",
        &format!("Request body could not be read: {}", rejection.body_text()),
    )
}

pub(super) fn flow_error_response(request_id: &str, err: &FlowError) -> Response {
    let kind = err.kind();
    let status = status_for_kind(kind);

    if status.is_server_error() {
        if kind == FlowErrorKind::Template {
            error!(
                request_id,
                flow = err.flow().as_str(),
                error_type = kind.as_str(),
                "flow could not be prepared: {err}"
            );
        } else {
            warn!(
                request_id,
                flow = err.flow().as_str(),
                error_type = kind.as_str(),
                "flow invocation failed: {err}"
            );
        }
    }

    let message = match err {
        FlowError::InvalidRequest { violation, .. } => violation.to_string(),
        _ => public_message(kind).to_string(),
    };
    error_response(status, kind.as_str(), &message)
}

fn status_for_kind(kind: FlowErrorKind) -> StatusCode {
    match kind {
        FlowErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        FlowErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        FlowErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FlowErrorKind::EmptyModelResponse
        | FlowErrorKind::MalformedModelResponse
        | FlowErrorKind::Provider => StatusCode::BAD_GATEWAY,
        FlowErrorKind::Template => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn public_message(kind: FlowErrorKind) -> &'static str {
    match kind {
        FlowErrorKind::InvalidRequest => "Request does not match the flow schema",
        FlowErrorKind::EmptyModelResponse => "Model returned no output",
        FlowErrorKind::MalformedModelResponse => "Model output did not match the flow schema",
        FlowErrorKind::UpstreamUnavailable => "Model is temporarily unavailable; retry later",
        FlowErrorKind::Timeout => "Model did not respond in time",
        FlowErrorKind::Provider => "Model provider request failed",
        FlowErrorKind::Template => "Flow could not be prepared",
    }
}

#[cfg(test)]
mod tests {
    use ai_flows::llm::FlowErrorKind;
    use axum::http::StatusCode;

    use super::status_for_kind;

    #[test]
    fn maps_error_kinds_to_statuses() {
        assert_eq!(
            status_for_kind(FlowErrorKind::InvalidRequest),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for_kind(FlowErrorKind::UpstreamUnavailable),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for_kind(FlowErrorKind::Timeout),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for_kind(FlowErrorKind::MalformedModelResponse),
            StatusCode::BAD_GATEWAY
        );
    }
}
