use std::time::Instant;

use ai_flows::llm::FlowId;
use axum::extract::{MatchedPath, Request};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;
const FLOW_ROUTE_PREFIX: &str = "/v1/flows/";

#[derive(Clone, Debug)]
pub(super) struct RequestContext {
    pub(super) request_id: String,
}

/// Assigns a request id, echoes it back as `x-request-id`, and emits one access-log event
/// tagged with the invoked flow when the path names a known one.
pub(super) async fn request_observability_middleware(mut req: Request, next: Next) -> Response {
    let request_id = resolve_request_id(&req);
    req.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| path.clone());
    let flow_id = invoked_flow(&path).map(FlowId::as_str);
    let started_at = Instant::now();

    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value);
    }

    let status = response.status().as_u16();
    let latency_ms = u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    if status >= 500 {
        warn!(
            request_id = %request_id,
            method = %method,
            route = %route,
            path = %path,
            flow_id,
            status,
            latency_ms,
            metric_name = "flow_gateway_http_request",
            "flow gateway request failed on the server side"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            route = %route,
            path = %path,
            flow_id,
            status,
            latency_ms,
            metric_name = "flow_gateway_http_request",
            "flow gateway request completed"
        );
    }

    response
}

fn invoked_flow(path: &str) -> Option<FlowId> {
    path.strip_prefix(FLOW_ROUTE_PREFIX)?.parse().ok()
}

fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(normalize_request_id)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn normalize_request_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_REQUEST_ID_LEN {
        return None;
    }

    let valid = trimmed
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'));
    valid.then(|| trimmed.to_string())
}
