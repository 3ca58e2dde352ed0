use ai_flows::models::OkResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

pub(super) async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(OkResponse { ok: true }))
}
