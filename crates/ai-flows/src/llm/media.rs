use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

const DATA_URI_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Borrowed view of a `data:<mime>;base64,<payload>` string. The payload is kept in its
/// encoded form so it can be forwarded without a decode/encode cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime_type: &'a str,
    pub base64_data: &'a str,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUriError {
    #[error("data uri must start with 'data:'")]
    MissingScheme,
    #[error("data uri must declare base64 encoding")]
    NotBase64,
    #[error("data uri is missing a mime type")]
    MissingMimeType,
    #[error("data uri has an empty payload")]
    EmptyPayload,
    #[error("data uri payload is not valid base64")]
    InvalidBase64,
}

pub fn parse_data_uri(raw: &str) -> Result<DataUri<'_>, DataUriError> {
    let rest = raw
        .strip_prefix(DATA_URI_PREFIX)
        .ok_or(DataUriError::MissingScheme)?;
    let (mime_type, base64_data) = rest
        .split_once(BASE64_MARKER)
        .ok_or(DataUriError::NotBase64)?;

    if mime_type.trim().is_empty() {
        return Err(DataUriError::MissingMimeType);
    }
    if base64_data.is_empty() {
        return Err(DataUriError::EmptyPayload);
    }

    Ok(DataUri {
        mime_type,
        base64_data,
    })
}

impl DataUri<'_> {
    pub fn decode(&self) -> Result<Vec<u8>, DataUriError> {
        STANDARD
            .decode(self.base64_data)
            .map_err(|_| DataUriError::InvalidBase64)
    }
}

pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "{DATA_URI_PREFIX}{mime_type}{BASE64_MARKER}{}",
        STANDARD.encode(bytes)
    )
}
