use ai_flows::llm::FlowId;
use ai_flows::models::{FlowDescriptor, ListFlowsResponse};
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use super::AppState;
use super::errors::{
    bad_request_response, body_rejection_response, flow_error_response, unknown_flow_response,
};
use super::observability::RequestContext;

pub(super) async fn list_flows() -> Json<ListFlowsResponse> {
    Json(ListFlowsResponse {
        flows: FlowId::ALL
            .into_iter()
            .map(FlowDescriptor::for_flow)
            .collect(),
    })
}

pub(super) async fn invoke_flow(
    State(state): State<AppState>,
    Extension(request_context): Extension<RequestContext>,
    Path(flow_id): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let Ok(flow) = flow_id.parse::<FlowId>() else {
        return unknown_flow_response(&flow_id);
    };
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return body_rejection_response(flow, &rejection),
    };

    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(err) => {
            return bad_request_response(
                "invalid_request",
                &format!("Request body is not valid JSON: {err}"),
            );
        }
    };

    match state.flows.invoke_json(flow, &payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => flow_error_response(&request_context.request_id, &err),
    }
}
