//! Error types for the Shrinkix client.
//!
//! # Design
//! Only two failure shapes come out of the transport: `ApiError`, when the
//! server answered with status >= 400 and a structured body, and
//! `NetworkError`, when no well-formed exchange happened (connect, send,
//! body read, or decoding failed). `Config` and `Validation` are local
//! failures raised before any request is built.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::rate_limit::RateLimitInfo;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a client call can return.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client configuration was rejected at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The call was rejected locally before any request was issued.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The server rejected the request (status >= 400).
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The exchange could not be completed or its body could not be parsed.
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl Error {
    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Rate limiting (429), server faults (>= 500) and failures while
    /// sending are retryable. Everything else is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(e) => e.status_code == 429 || e.status_code >= 500,
            Error::Network(e) => e.stage == NetworkStage::Send,
            Error::Config(_) | Error::Validation(_) => false,
        }
    }

    /// Server-provided `Retry-After` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Api(e) => e.retry_after,
            _ => None,
        }
    }

    /// Rate-limit snapshot of the failed exchange, when the server answered.
    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        match self {
            Error::Api(e) => Some(&e.rate_limit),
            _ => None,
        }
    }
}

/// Structured error returned by the API for responses with status >= 400.
///
/// Wire shape: `{"message", "error", "request_id", "details", "docs_url"}`.
/// The remaining fields are stamped by the transport from the HTTP exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    /// Machine-readable error code, e.g. `PLAN_LIMIT_REACHED`.
    #[serde(rename = "error", default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(skip)]
    pub status_code: u16,
    #[serde(default, deserialize_with = "null_as_default")]
    pub request_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub docs_url: String,
    #[serde(skip)]
    pub rate_limit: RateLimitInfo,
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl ApiError {
    /// Decode an error body. Blank code and message get generic fallbacks.
    pub fn from_body(body: &[u8]) -> serde_json::Result<Self> {
        let mut err: ApiError = serde_json::from_slice(body)?;
        if err.code.is_empty() {
            err.code = "UNKNOWN_ERROR".to_string();
        }
        if err.message.is_empty() {
            err.message = "API Error".to_string();
        }
        Ok(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (request_id: {})",
            self.code, self.message, self.request_id
        )
    }
}

impl std::error::Error for ApiError {}

/// Where in the exchange a `NetworkError` happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    /// The request could not be constructed.
    Build,
    /// The request could not be sent or no response arrived.
    Send,
    /// The response body could not be read in full.
    Read,
    /// The response body could not be decoded.
    Decode,
}

/// Transport-level failure. Always wraps the low-level cause.
#[derive(Debug, thiserror::Error)]
#[error("network error: {message}")]
pub struct NetworkError {
    pub message: String,
    pub stage: NetworkStage,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl NetworkError {
    pub fn new(
        stage: NetworkStage,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            stage,
            source: source.into(),
        }
    }

    /// The underlying cause.
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;
    use std::io;

    use super::*;

    #[test]
    fn decodes_wire_shape() {
        let body = br#"{"error":"rate_limited","message":"too many requests","request_id":"r1","details":{"limit":100},"docs_url":"https://docs.shrinkix.com/errors/rate_limited"}"#;
        let err = ApiError::from_body(body).unwrap();
        assert_eq!(err.code, "rate_limited");
        assert_eq!(err.message, "too many requests");
        assert_eq!(err.request_id, "r1");
        assert_eq!(err.details["limit"], 100);
        assert_eq!(err.docs_url, "https://docs.shrinkix.com/errors/rate_limited");
        assert_eq!(err.status_code, 0);
        assert!(err.retry_after.is_none());
    }

    #[test]
    fn missing_and_null_fields_fall_back() {
        let err = ApiError::from_body(br#"{"request_id":null,"details":null}"#).unwrap();
        assert_eq!(err.code, "UNKNOWN_ERROR");
        assert_eq!(err.message, "API Error");
        assert!(err.request_id.is_empty());
        assert!(err.details.is_empty());
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(ApiError::from_body(b"<html>bad gateway</html>").is_err());
        assert!(ApiError::from_body(br#""just a string""#).is_err());
    }

    #[test]
    fn display_includes_code_and_request_id() {
        let err = ApiError::from_body(br#"{"error":"INVALID_API_KEY","message":"bad key","request_id":"r9"}"#).unwrap();
        assert_eq!(err.to_string(), "INVALID_API_KEY: bad key (request_id: r9)");
    }

    #[test]
    fn network_error_exposes_cause() {
        let err = NetworkError::new(
            NetworkStage::Send,
            "request failed",
            io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert_eq!(err.to_string(), "network error: request failed");
        assert_eq!(err.source().unwrap().to_string(), "refused");
        assert_eq!(err.cause().to_string(), "refused");
    }

    #[test]
    fn retryable_classification() {
        let mut api = ApiError::from_body(b"{}").unwrap();
        api.status_code = 429;
        assert!(Error::Api(api.clone()).is_retryable());
        api.status_code = 503;
        assert!(Error::Api(api.clone()).is_retryable());
        api.status_code = 400;
        assert!(!Error::Api(api).is_retryable());

        let send = NetworkError::new(NetworkStage::Send, "request failed", "refused");
        assert!(Error::Network(send).is_retryable());
        let decode = NetworkError::new(NetworkStage::Decode, "bad body", "eof");
        assert!(!Error::Network(decode).is_retryable());
        assert!(!Error::Validation("no image input provided".into()).is_retryable());
    }
}
