use std::sync::Arc;

use ai_flows::config::DEFAULT_MAX_BODY_BYTES;
use ai_flows::llm::{FlowGateway, FlowGatewaySettings};
use api_server::http::{AppState, build_router};

use super::stub_gateway::{StubGateway, StubReply};

pub fn build_test_router(reply: StubReply) -> (axum::Router, Arc<StubGateway>) {
    build_test_router_with_settings(reply, FlowGatewaySettings::default())
}

pub fn build_test_router_with_settings(
    reply: StubReply,
    settings: FlowGatewaySettings,
) -> (axum::Router, Arc<StubGateway>) {
    build_test_router_with(reply, settings, DEFAULT_MAX_BODY_BYTES)
}

pub fn build_test_router_with_body_limit(
    reply: StubReply,
    max_body_bytes: usize,
) -> (axum::Router, Arc<StubGateway>) {
    build_test_router_with(reply, FlowGatewaySettings::default(), max_body_bytes)
}

fn build_test_router_with(
    reply: StubReply,
    settings: FlowGatewaySettings,
    max_body_bytes: usize,
) -> (axum::Router, Arc<StubGateway>) {
    let stub = StubGateway::new(reply);
    let state = AppState {
        flows: FlowGateway::new(stub.clone(), settings),
        max_body_bytes,
    };

    (build_router(state), stub)
}
