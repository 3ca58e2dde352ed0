use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use ai_flows::llm::gateway::LlmGatewayRequest;
use ai_flows::llm::{
    FlowId, GeminiGateway, GeminiGatewayConfig, LlmGateway, LlmGatewayError, PromptPart,
    RenderedPrompt, output_schema,
};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

#[derive(Debug, Clone)]
struct MockReply {
    status: StatusCode,
    body: Value,
    delay: Duration,
}

impl MockReply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: Duration::ZERO,
        }
    }

    fn error(status: StatusCode, provider_status: &str) -> Self {
        Self {
            status,
            body: json!({
                "error": {
                    "code": status.as_u16(),
                    "message": "mock provider error",
                    "status": provider_status
                }
            }),
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
struct TestServerState {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    seen_actions: Arc<Mutex<Vec<String>>>,
    seen_api_keys: Arc<Mutex<Vec<String>>>,
    seen_bodies: Arc<Mutex<Vec<Value>>>,
}

impl TestServerState {
    fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            seen_actions: Arc::new(Mutex::new(Vec::new())),
            seen_api_keys: Arc::new(Mutex::new(Vec::new())),
            seen_bodies: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[tokio::test]
async fn sends_key_and_schema_and_parses_structured_output() {
    let state = TestServerState::with_replies(vec![MockReply::ok(text_response(
        r#"{"forecast":"Tomatoes demand expected +15% next week."}"#,
    ))]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = GeminiGateway::new(config_for(base_url, 5_000)).expect("gateway should build");
    let response = gateway
        .generate(demand_forecast_request())
        .await
        .expect("structured response should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert_eq!(
        response.output,
        Some(json!({ "forecast": "Tomatoes demand expected +15% next week." }))
    );
    assert_eq!(response.model, "gemini-2.5-flash-001");
    assert_eq!(response.provider_request_id.as_deref(), Some("resp-mock"));
    assert_eq!(response.usage.map(|usage| usage.total_tokens), Some(42));

    assert_eq!(
        state.seen_actions.lock().await.clone(),
        vec!["gemini-2.5-flash:generateContent".to_string()]
    );
    assert_eq!(
        state.seen_api_keys.lock().await.clone(),
        vec!["test-gemini-key".to_string()]
    );

    let bodies = state.seen_bodies.lock().await.clone();
    let config = &bodies[0]["generationConfig"];
    assert_eq!(config["responseMimeType"], "application/json");
    assert_eq!(
        config["responseJsonSchema"]["required"],
        json!(["forecast"])
    );
    assert_eq!(
        bodies[0]["contents"][0]["parts"][0]["text"],
        "Forecast onion demand in Nashik."
    );
}

#[tokio::test]
async fn overloaded_and_rate_limited_statuses_are_unavailable_without_retry() {
    for status in [StatusCode::SERVICE_UNAVAILABLE, StatusCode::TOO_MANY_REQUESTS] {
        let state = TestServerState::with_replies(vec![
            MockReply::error(status, "UNAVAILABLE"),
            MockReply::ok(text_response(r#"{"forecast":"unused"}"#)),
        ]);
        let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

        let gateway =
            GeminiGateway::new(config_for(base_url, 5_000)).expect("gateway should build");
        let err = gateway
            .generate(demand_forecast_request())
            .await
            .expect_err("unavailable provider should fail");

        shutdown_tx.send(()).expect("shutdown signal should send");
        server_task.await.expect("server task should join");

        assert!(
            matches!(err, LlmGatewayError::Unavailable { status: seen } if seen == status.as_u16()),
            "unexpected error {err:?}"
        );
        assert_eq!(state.seen_actions.lock().await.len(), 1);
    }
}

#[tokio::test]
async fn unavailable_status_wins_over_truncated_error_body() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");

    let server_task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("client should connect");
        read_http_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 503 Service Unavailable\r\n\
                  content-type: application/json\r\n\
                  content-length: 256\r\n\r\n\
                  {\"error\":{\"code\":503,",
            )
            .await
            .expect("partial reply should write");
        socket.shutdown().await.expect("socket should close");
    });

    let gateway = GeminiGateway::new(config_for(format!("http://{local_addr}"), 5_000))
        .expect("gateway should build");
    let err = gateway
        .generate(demand_forecast_request())
        .await
        .expect_err("overloaded provider should fail");

    server_task.await.expect("server task should join");

    assert!(
        matches!(err, LlmGatewayError::Unavailable { status: 503 }),
        "unexpected error {err:?}"
    );
}

#[tokio::test]
async fn other_error_statuses_are_provider_failures() {
    let state = TestServerState::with_replies(vec![MockReply::error(
        StatusCode::BAD_REQUEST,
        "INVALID_ARGUMENT",
    )]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = GeminiGateway::new(config_for(base_url, 5_000)).expect("gateway should build");
    let err = gateway
        .generate(demand_forecast_request())
        .await
        .expect_err("bad request should fail");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    match err {
        LlmGatewayError::ProviderFailure(detail) => {
            assert_eq!(detail, "status=400 code=INVALID_ARGUMENT");
        }
        other => panic!("expected provider failure, got {other:?}"),
    }
}

#[tokio::test]
async fn decodes_inline_audio_for_speech_requests() {
    let state = TestServerState::with_replies(vec![MockReply::ok(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{
                    "inlineData": {
                        "mimeType": "audio/L16;codec=pcm;rate=24000",
                        "data": "AAECAw=="
                    }
                }]
            },
            "finishReason": "STOP"
        }],
        "modelVersion": "gemini-2.5-flash-preview-tts"
    }))]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state.clone()).await;

    let gateway = GeminiGateway::new(config_for(base_url, 5_000)).expect("gateway should build");
    let response = gateway
        .generate(LlmGatewayRequest::speech(
            FlowId::TextToSpeech,
            "gemini-2.5-flash-preview-tts",
            RenderedPrompt {
                parts: vec![PromptPart::Text("Namaste".to_string())],
            },
            "Algenib",
        ))
        .await
        .expect("speech response should succeed");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    let media = response.media.expect("audio should be present");
    assert_eq!(media.mime_type, "audio/L16;codec=pcm;rate=24000");
    assert_eq!(media.data, vec![0, 1, 2, 3]);
    assert!(response.output.is_none());

    let bodies = state.seen_bodies.lock().await.clone();
    assert_eq!(
        bodies[0]["generationConfig"]["responseModalities"],
        json!(["AUDIO"])
    );
}

#[tokio::test]
async fn slow_provider_surfaces_timeout() {
    let state = TestServerState::with_replies(vec![MockReply {
        delay: Duration::from_millis(500),
        ..MockReply::ok(text_response(r#"{"forecast":"late"}"#))
    }]);
    let (base_url, shutdown_tx, server_task) = spawn_test_server(state).await;

    let gateway = GeminiGateway::new(config_for(base_url, 50)).expect("gateway should build");
    let err = gateway
        .generate(demand_forecast_request())
        .await
        .expect_err("slow provider should time out");

    shutdown_tx.send(()).expect("shutdown signal should send");
    server_task.await.expect("server task should join");

    assert!(matches!(err, LlmGatewayError::Timeout), "unexpected {err:?}");
}

fn config_for(base_url: String, timeout_ms: u64) -> GeminiGatewayConfig {
    GeminiGatewayConfig {
        base_url,
        api_key: "test-gemini-key".to_string(),
        timeout_ms,
    }
}

fn demand_forecast_request() -> LlmGatewayRequest {
    LlmGatewayRequest::structured(
        FlowId::DemandForecast,
        "gemini-2.5-flash",
        RenderedPrompt {
            parts: vec![PromptPart::Text(
                "Forecast onion demand in Nashik.".to_string(),
            )],
        },
        output_schema(FlowId::DemandForecast),
    )
}

fn text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": {
            "promptTokenCount": 30,
            "candidatesTokenCount": 12,
            "totalTokenCount": 42
        },
        "modelVersion": "gemini-2.5-flash-001",
        "responseId": "resp-mock"
    })
}

/// Consumes one request (headers plus `content-length` body) so closing the socket is clean.
async fn read_http_request(socket: &mut tokio::net::TcpStream) {
    let mut received = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let read = socket.read(&mut chunk).await.expect("request should read");
        if read == 0 {
            return;
        }
        received.extend_from_slice(&chunk[..read]);

        let Some(header_end) = received
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
        else {
            continue;
        };
        let headers = String::from_utf8_lossy(&received[..header_end]).to_ascii_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if received.len() >= header_end + 4 + content_length {
            return;
        }
    }
}

async fn spawn_test_server(
    state: TestServerState,
) -> (String, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/v1beta/models/{model_action}", post(test_generate_handler))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let local_addr = listener
        .local_addr()
        .expect("listener address should resolve");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let server_task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

        server.await.expect("test server should run");
    });

    (format!("http://{local_addr}"), shutdown_tx, server_task)
}

async fn test_generate_handler(
    State(state): State<TestServerState>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.seen_actions.lock().await.push(model_action);
    state.seen_bodies.lock().await.push(payload);

    if let Some(value) = headers
        .get("x-goog-api-key")
        .and_then(|header| header.to_str().ok())
    {
        state.seen_api_keys.lock().await.push(value.to_string());
    }

    let reply = state.replies.lock().await.pop_front().unwrap_or(MockReply {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: json!({
            "error": { "code": 500, "status": "EXHAUSTED_TEST_REPLIES" }
        }),
        delay: Duration::ZERO,
    });

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    (reply.status, Json(reply.body))
}
