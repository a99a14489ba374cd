//! HTTP transport for the Shrinkix API.
//!
//! # Design
//! Every call funnels through [`Requester::request`]. For [`Transport`] that
//! is three steps:
//!
//! 1. `build_request` resolves the URL and injects the auth, client and
//!    sandbox headers, with caller headers applied last.
//! 2. `execute` performs the blocking round-trip with `ureq` and returns an
//!    `HttpResponse` holding the full body.
//! 3. `classify` reads the rate-limit headers and turns the response into a
//!    [`Response`] or an [`ApiError`]/[`NetworkError`].
//!
//! Steps 1 and 3 are pure and tested without a network. Nothing above this
//! module looks at status codes or raw headers.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use ureq::http::{HeaderName, HeaderValue, Uri};

use crate::config::ClientConfig;
use crate::error::{ApiError, NetworkError, NetworkStage, Result};
use crate::http::{find_header, HttpMethod, HttpRequest, HttpResponse};
use crate::rate_limit::{parse_retry_after, RateLimitInfo};

pub const USER_AGENT: &str = concat!("shrinkix-rust/", env!("CARGO_PKG_VERSION"));
pub const SANDBOX_HEADER: &str = "X-Mode";

const MAX_RESPONSE_BYTES: u64 = 100 * 1024 * 1024;

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The body parsed as JSON.
    Json(Value),
    /// The body was empty or not JSON.
    Raw(Vec<u8>),
}

impl Payload {
    /// Bind the payload to a typed shape.
    pub fn decode<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        match self {
            Payload::Json(value) => T::deserialize(value),
            Payload::Raw(bytes) => serde_json::from_slice(bytes),
        }
    }

    /// Raw body bytes. JSON payloads are serialized back.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Raw(bytes) => bytes,
            Payload::Json(value) => serde_json::to_vec(&value).unwrap_or_default(),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }
}

/// A classified successful (status < 400) response.
#[derive(Debug, Clone)]
pub struct Response {
    pub payload: Payload,
    pub rate_limit: RateLimitInfo,
    pub headers: Vec<(String, String)>,
}

impl Response {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Something that can perform one API exchange.
///
/// [`Transport`] talks HTTP; [`crate::retry::Retrying`] wraps another
/// requester. Domain code only sees this trait.
pub trait Requester: Send + Sync {
    /// Perform `method endpoint` with an optional body and extra headers.
    /// Extra headers override defaults with the same name.
    fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<Vec<u8>>,
        headers: &[(String, String)],
    ) -> Result<Response>;

    fn get(&self, endpoint: &str) -> Result<Response> {
        self.request(HttpMethod::Get, endpoint, None, &[])
    }

    /// POST `body` serialized as JSON.
    fn post<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<Response>
    where
        Self: Sized,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| {
            NetworkError::new(NetworkStage::Build, "failed to encode request body", e)
        })?;
        let headers = [("Content-Type".to_string(), "application/json".to_string())];
        self.request(HttpMethod::Post, endpoint, Some(bytes), &headers)
    }

    /// POST a pre-built multipart body. `content_type` carries the boundary.
    fn post_multipart(&self, endpoint: &str, body: Vec<u8>, content_type: &str) -> Result<Response> {
        let headers = [("Content-Type".to_string(), content_type.to_string())];
        self.request(HttpMethod::Post, endpoint, Some(body), &headers)
    }
}

/// Blocking HTTP transport bound to one API key and base URL.
///
/// Holds no per-call state, so a single instance can serve concurrent
/// callers.
#[derive(Clone)]
pub struct Transport {
    api_key: String,
    base_url: String,
    sandbox: bool,
    agent: ureq::Agent,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("sandbox", &self.sandbox)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Validate `config` and build a transport for it.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.validate()?;
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout)
            .build()
            .new_agent();
        Ok(Self {
            api_key: config.api_key.clone(),
            base_url,
            sandbox: config.sandbox,
            agent,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_sandbox(&self) -> bool {
        self.sandbox
    }

    /// Resolve the URL and attach default and caller headers.
    pub fn build_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<Vec<u8>>,
        headers: &[(String, String)],
    ) -> HttpRequest {
        let mut request = HttpRequest {
            method,
            url: format!("{}{}", self.base_url, endpoint),
            headers: Vec::with_capacity(headers.len() + 3),
            body,
        };
        request.set_header("Authorization", &format!("Bearer {}", self.api_key));
        request.set_header("User-Agent", USER_AGENT);
        if self.sandbox {
            request.set_header(SANDBOX_HEADER, "sandbox");
        }
        for (name, value) in headers {
            request.set_header(name, value);
        }
        request
    }

    /// Perform the round-trip and read the whole body.
    fn execute(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, NetworkError> {
        let build_err = |e: ureq::http::Error| {
            NetworkError::new(NetworkStage::Build, "failed to create request", e)
        };
        let uri: Uri = request
            .url
            .parse()
            .map_err(|e: ureq::http::uri::InvalidUri| build_err(e.into()))?;
        let mut headers = Vec::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| build_err(e.into()))?;
            let value = HeaderValue::from_str(value).map_err(|e| build_err(e.into()))?;
            headers.push((name, value));
        }

        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(uri);
                for (name, value) in headers {
                    builder = builder.header(name, value);
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(uri);
                for (name, value) in headers {
                    builder = builder.header(name, value);
                }
                match &request.body {
                    Some(body) => builder.send(&body[..]),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result
            .map_err(|e| NetworkError::new(NetworkStage::Send, "request failed", e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_vec()
            .map_err(|e| NetworkError::new(NetworkStage::Read, "failed to read response", e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Turn a raw response into a `Response` or a typed error.
    ///
    /// Status >= 400 must carry a JSON error body; anything else is a
    /// `NetworkError`. Status < 400 never fails: a body that is not JSON is
    /// kept as raw bytes.
    pub fn classify(response: HttpResponse) -> Result<Response> {
        let rate_limit = RateLimitInfo::from_response(&response);

        if response.status >= 400 {
            let mut err = ApiError::from_body(&response.body).map_err(|e| {
                NetworkError::new(NetworkStage::Decode, "failed to parse error response", e)
            })?;
            err.status_code = response.status;
            err.retry_after = parse_retry_after(&response);
            if err.request_id.is_empty() {
                err.request_id = rate_limit.request_id.clone();
            }
            err.rate_limit = rate_limit;
            warn!(
                status = err.status_code,
                code = %err.code,
                request_id = %err.request_id,
                "api error"
            );
            return Err(err.into());
        }

        let HttpResponse { headers, body, .. } = response;
        let payload = if body.is_empty() {
            Payload::Raw(body)
        } else {
            match serde_json::from_slice::<Value>(&body) {
                Ok(value) => Payload::Json(value),
                Err(_) => Payload::Raw(body),
            }
        };
        Ok(Response {
            payload,
            rate_limit,
            headers,
        })
    }
}

impl Requester for Transport {
    fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<Vec<u8>>,
        headers: &[(String, String)],
    ) -> Result<Response> {
        let request = self.build_request(method, endpoint, body, headers);
        debug!(method = method.as_str(), url = %request.url, "sending request");
        let response = self.execute(&request)?;
        debug!(
            status = response.status,
            bytes = response.body.len(),
            "received response"
        );
        Self::classify(response)
    }
}
