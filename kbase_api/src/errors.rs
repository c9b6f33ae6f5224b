//! Error types for the API client.

use std::time::Duration;

use serde_json::Value;

/// Errors that can occur when making API requests.
///
/// Variants only carry owned, cloneable data so that callers sharing one
/// de-duplicated request can each receive the same outcome.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The request could not be built or sent for a non-network reason.
    #[error("Request failed: {0}")]
    RequestFailed(String),
    /// No response was obtained (connection refused, DNS failure, reset).
    #[error("Network error: {0}")]
    Network(String),
    /// The request did not complete within its timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// The API returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus {
        status: u16,
        body: String,
        /// The error body parsed as JSON, when it was JSON.
        detail: Option<Value>,
    },
    /// A success response whose body was not a valid envelope.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl Error {
    /// Numeric HTTP status associated with this error. Network failures map
    /// to `0` and timeouts to `408`.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::HttpStatus { status, .. } => *status,
            Self::Timeout(_) => 408,
            Self::Network(_) => 0,
            Self::RequestFailed(_) | Self::Decode(_) => 500,
        }
    }

    /// Structured error payload, if the server sent one.
    pub fn detail(&self) -> Option<&Value> {
        match self {
            Self::HttpStatus { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed: network failures,
    /// timeouts, rate limiting, and server errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::HttpStatus { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::RequestFailed(_) | Self::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> Error {
        Error::HttpStatus {
            status,
            body: String::new(),
            detail: None,
        }
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(status(404).http_status(), 404);
        assert_eq!(Error::Timeout(Duration::from_secs(1)).http_status(), 408);
        assert_eq!(Error::Network("refused".into()).http_status(), 0);
        assert_eq!(Error::Decode("eof".into()).http_status(), 500);
    }

    #[test]
    fn retryable_classification() {
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(status(408).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(Error::Network("reset".into()).is_retryable());
        assert!(!Error::Decode("bad".into()).is_retryable());
    }
}
