use ai_flows::llm::FlowGateway;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Router, middleware};

mod errors;
mod flows;
mod health;
mod observability;

#[derive(Clone)]
pub struct AppState {
    pub flows: FlowGateway,
    /// Upper bound on request bodies, which carry inline photo data URIs.
    pub max_body_bytes: usize,
}

pub fn build_router(app_state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(app_state.max_body_bytes);

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/v1/flows", get(flows::list_flows))
        .route("/v1/flows/{flow_id}", post(flows::invoke_flow))
        .layer(body_limit)
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
        .with_state(app_state)
}
