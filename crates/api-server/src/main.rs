use std::net::SocketAddr;
use std::sync::Arc;

use ai_flows::config::ApiConfig;
use ai_flows::llm::{FlowGateway, GeminiGateway};
use api_server::http;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "api_server=debug,ai_flows=info,axum=info".to_string()),
        )
        .init();

    let config = match ApiConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read config: {err}");
            std::process::exit(1);
        }
    };

    let gemini = match GeminiGateway::new(config.gemini) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!("failed to build model client: {err}");
            std::process::exit(1);
        }
    };

    let app = http::build_router(http::AppState {
        flows: FlowGateway::new(Arc::new(gemini), config.flows),
        max_body_bytes: config.max_body_bytes,
    });

    let addr: SocketAddr = match config.bind_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!("invalid API_BIND_ADDR {}: {err}", config.bind_addr);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    info!(
        "api server listening on {}",
        listener.local_addr().unwrap_or(addr)
    );
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server exited with error: {err}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
    info!("shutdown signal received");
}
