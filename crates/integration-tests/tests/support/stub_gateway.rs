use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ai_flows::llm::gateway::{InlineMedia, LlmGatewayFuture};
use ai_flows::llm::{LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmGatewayResponse};
use serde_json::Value;

/// Canned model behaviour for API tests.
#[derive(Debug, Clone)]
pub enum StubReply {
    Json(Value),
    Audio(Vec<u8>),
    Empty,
    Fail(StubFailure),
    Slow(Duration, Value),
}

#[derive(Debug, Clone, Copy)]
pub enum StubFailure {
    Unavailable(u16),
    Timeout,
    Provider,
    NotJson,
}

pub struct StubGateway {
    reply: StubReply,
    calls: AtomicUsize,
}

impl StubGateway {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmGateway for StubGateway {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let model = request.model;

            match &self.reply {
                StubReply::Json(output) => Ok(LlmGatewayResponse {
                    model,
                    output: Some(output.clone()),
                    ..LlmGatewayResponse::default()
                }),
                StubReply::Audio(pcm) => Ok(LlmGatewayResponse {
                    model,
                    media: Some(InlineMedia {
                        mime_type: "audio/L16;codec=pcm;rate=24000".to_string(),
                        data: pcm.clone(),
                    }),
                    ..LlmGatewayResponse::default()
                }),
                StubReply::Empty => Ok(LlmGatewayResponse {
                    model,
                    ..LlmGatewayResponse::default()
                }),
                StubReply::Fail(StubFailure::Unavailable(status)) => {
                    Err(LlmGatewayError::Unavailable { status: *status })
                }
                StubReply::Fail(StubFailure::Timeout) => Err(LlmGatewayError::Timeout),
                StubReply::Fail(StubFailure::Provider) => Err(LlmGatewayError::ProviderFailure(
                    "status=400 code=INVALID_ARGUMENT".to_string(),
                )),
                StubReply::Fail(StubFailure::NotJson) => Err(
                    LlmGatewayError::InvalidProviderPayload("content_not_json".to_string()),
                ),
                StubReply::Slow(delay, output) => {
                    tokio::time::sleep(*delay).await;
                    Ok(LlmGatewayResponse {
                        model,
                        output: Some(output.clone()),
                        ..LlmGatewayResponse::default()
                    })
                }
            }
        })
    }
}
