use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_u64_env};
use crate::llm::{FlowGatewaySettings, GeminiGatewayConfig};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
/// Room for a full-resolution phone photo once base64-encoded into a data URI.
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub max_body_bytes: usize,
    pub gemini: GeminiGatewayConfig,
    pub flows: FlowGatewaySettings,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_body_bytes = parse_u64_env("API_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES as u64)?;
        if max_body_bytes == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "API_MAX_BODY_BYTES must be greater than 0".to_string(),
            ));
        }
        let max_body_bytes = usize::try_from(max_body_bytes).map_err(|_| {
            ConfigError::InvalidConfiguration("API_MAX_BODY_BYTES is too large".to_string())
        })?;

        Ok(Self {
            bind_addr: optional_trimmed_env("API_BIND_ADDR")
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            max_body_bytes,
            gemini: GeminiGatewayConfig::from_env()?,
            flows: FlowGatewaySettings::from_env()?,
        })
    }
}
