//! The one error shape consumers of this layer ever see.

use std::fmt;

use kbase_api::types::Envelope;
use serde::Serialize;
use serde_json::Value;

/// Classification of a [`StructuredError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    /// No usable response was obtained from the transport.
    #[serde(rename = "FETCH_ERROR")]
    Fetch,
    /// The server answered with an error-tagged envelope.
    #[serde(rename = "API_ERROR")]
    Api,
    /// A success payload did not match the expected type.
    #[serde(rename = "DECODE_ERROR")]
    Decode,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "FETCH_ERROR",
            Self::Api => "API_ERROR",
            Self::Decode => "DECODE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised failure of a fetch attempt.
///
/// Built from either a transport error or an error envelope; never a raw
/// panic or propagated error.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StructuredError {
    pub http_status: u16,
    pub message: String,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl StructuredError {
    /// From an error-tagged envelope. The server answered, so the status is
    /// reported as 400.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            http_status: 400,
            message: envelope
                .message
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string()),
            code: ErrorCode::Api,
            detail: envelope.detail.clone(),
        }
    }

    /// From a transport failure, keeping the transport's status.
    pub fn from_transport(err: &kbase_api::Error) -> Self {
        Self {
            http_status: err.http_status(),
            message: err.to_string(),
            code: ErrorCode::Fetch,
            detail: err.detail().cloned(),
        }
    }

    /// From a payload that could not be decoded into the requested type.
    pub fn decode(err: serde_json::Error) -> Self {
        Self {
            http_status: 500,
            message: format!("Failed to decode payload: {}", err),
            code: ErrorCode::Decode,
            detail: None,
        }
    }

    /// Server-side or connectivity failure (status 0 or 5xx).
    pub fn is_network_error(&self) -> bool {
        self.http_status == 0 || self.http_status >= 500
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self.http_status, 401 | 403)
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self.http_status, 400 | 422)
    }

    pub fn is_timeout(&self) -> bool {
        self.http_status == 408
    }

    pub fn is_retryable(&self) -> bool {
        self.is_network_error() || self.is_timeout() || self.http_status == 429
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "API Error {} ({}): {}",
            self.http_status, self.code, self.message
        )
    }
}

impl std::error::Error for StructuredError {}
