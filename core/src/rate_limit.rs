//! Rate-limit metadata carried on every API response.

use std::time::Duration;

use crate::http::HttpResponse;

pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
pub const HEADER_REQUEST_ID: &str = "X-Request-ID";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Quota snapshot taken from the headers of a single HTTP exchange.
///
/// Missing or malformed headers parse to zero (or an empty request id);
/// a bad header never fails the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Epoch seconds at which the window resets.
    pub reset: i64,
    pub request_id: String,
}

impl RateLimitInfo {
    pub fn from_response(response: &HttpResponse) -> Self {
        Self {
            limit: parse_or_zero(response.header(HEADER_LIMIT)),
            remaining: parse_or_zero(response.header(HEADER_REMAINING)),
            reset: parse_or_zero(response.header(HEADER_RESET)),
            request_id: response
                .header(HEADER_REQUEST_ID)
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Parse a `Retry-After` header given in whole seconds.
///
/// The HTTP-date form is not supported and yields `None`.
pub fn parse_retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header(HEADER_RETRY_AFTER)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn parse_or_zero<T: std::str::FromStr + Default>(value: Option<&str>) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or_default()
}
