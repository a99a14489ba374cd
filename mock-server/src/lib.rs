//! Stand-in for the Shrinkix API.
//!
//! Serves the four `/v1` endpoints the client talks to, with canned plan data
//! and a trivial "optimizer" that keeps the first 80% of the uploaded bytes.
//! Every response carries `X-RateLimit-*` and a sequential `X-Request-ID`.
//!
//! Special API keys trigger failure modes:
//! - [`KEY_RATE_LIMITED`]: 429 with `Retry-After: 30`.
//! - [`KEY_BROKEN`]: 500 with a plain-text body.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Extension, Multipart, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{debug, info};

pub const KEY_RATE_LIMITED: &str = "test_rate_limited";
pub const KEY_BROKEN: &str = "test_broken";

pub const RATE_LIMIT: u64 = 100;
pub const RATE_LIMIT_RESET: i64 = 1_767_225_600;
pub const RETRY_AFTER_SECS: u64 = 30;

const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;
const MAX_PIXELS: u64 = 50_000_000;
const ALLOWED_FORMATS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "avif"];

/// One multipart upload as the server parsed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upload {
    /// Part names in the order they arrived.
    pub field_order: Vec<String>,
    /// Text parts by name.
    pub fields: HashMap<String, String>,
    pub file_name: Option<String>,
    pub file_content_type: Option<String>,
    pub file: Vec<u8>,
}

/// Shared server state. Cloning shares the same counters.
#[derive(Debug, Clone, Default)]
pub struct MockState {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requests: AtomicU64,
    uploads: Mutex<Vec<Upload>>,
    auth_headers: Mutex<Vec<String>>,
}

impl MockState {
    /// Uploads received by `/v1/optimize`, oldest first.
    pub fn uploads(&self) -> Vec<Upload> {
        self.inner
            .uploads
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }

    /// Raw `Authorization` header values seen, oldest first.
    pub fn auth_headers(&self) -> Vec<String> {
        self.inner
            .auth_headers
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> u64 {
        self.inner.requests.load(Ordering::SeqCst)
    }

    fn record_upload(&self, upload: Upload) {
        if let Ok(mut uploads) = self.inner.uploads.lock() {
            uploads.push(upload);
        }
    }
}

#[derive(Debug, Clone)]
struct RequestId(String);

pub fn app() -> Router {
    app_with_state(MockState::default())
}

pub fn app_with_state(state: MockState) -> Router {
    Router::new()
        .route("/v1/optimize", post(optimize))
        .route("/v1/usage/stats", get(usage_stats))
        .route("/v1/limits", get(limits))
        .route("/v1/validate", post(validate))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, MockState::default()).await
}

pub async fn run_with_state(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

fn api_error(status: StatusCode, code: &str, message: &str, request_id: &str) -> Response {
    let body = json!({
        "error": code,
        "message": message,
        "request_id": request_id,
        "docs_url": format!("https://docs.shrinkix.com/errors/{code}"),
    });
    (status, Json(body)).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|key| !key.trim().is_empty())
}

/// Authentication, failure-mode keys and the per-response metadata headers.
async fn gate(State(state): State<MockState>, mut request: Request, next: Next) -> Response {
    let n = state.inner.requests.fetch_add(1, Ordering::SeqCst) + 1;
    let request_id = format!("req_{n:06}");
    let mut remaining = RATE_LIMIT.saturating_sub(n);
    let mode = request.headers().get("x-mode").cloned();

    if let Some(raw) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Ok(mut seen) = state.inner.auth_headers.lock() {
            seen.push(raw.to_string());
        }
    }
    debug!(method = %request.method(), uri = %request.uri(), %request_id, "request");

    let key = bearer(request.headers()).map(str::to_string);
    let mut response = match key.as_deref() {
        None => api_error(
            StatusCode::UNAUTHORIZED,
            "INVALID_API_KEY",
            "Missing or malformed Authorization header",
            &request_id,
        ),
        Some(KEY_RATE_LIMITED) => {
            remaining = 0;
            let mut response = api_error(
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "too many requests",
                &request_id,
            );
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
            response
        }
        Some(KEY_BROKEN) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
        }
        Some(_) => {
            request
                .extensions_mut()
                .insert(RequestId(request_id.clone()));
            next.run(request).await
        }
    };

    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(RATE_LIMIT));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(RATE_LIMIT_RESET));
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert("x-request-id", value);
    }
    if let Some(mode) = mode {
        headers.insert("x-mode", mode);
    }
    response
}

async fn not_found(Extension(RequestId(id)): Extension<RequestId>) -> Response {
    api_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Unknown endpoint", &id)
}

async fn optimize(
    State(state): State<MockState>,
    Extension(RequestId(id)): Extension<RequestId>,
    mut multipart: Multipart,
) -> Response {
    let mut upload = Upload::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return api_error(StatusCode::BAD_REQUEST, "INVALID_MULTIPART", &e.body_text(), &id)
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        upload.field_order.push(name.clone());
        if name == "image" {
            upload.file_name = field.file_name().map(str::to_string);
            upload.file_content_type = field.content_type().map(str::to_string);
            match field.bytes().await {
                Ok(bytes) => upload.file = bytes.to_vec(),
                Err(e) => {
                    return api_error(StatusCode::BAD_REQUEST, "INVALID_MULTIPART", &e.body_text(), &id)
                }
            }
        } else {
            match field.text().await {
                Ok(text) => {
                    upload.fields.insert(name, text);
                }
                Err(e) => {
                    return api_error(StatusCode::BAD_REQUEST, "INVALID_MULTIPART", &e.body_text(), &id)
                }
            }
        }
    }

    if !upload.field_order.iter().any(|n| n == "image") {
        return api_error(StatusCode::BAD_REQUEST, "MISSING_FILE", "No image file provided", &id);
    }
    if let Some(quality) = upload.fields.get("quality") {
        if !matches!(quality.parse::<u32>(), Ok(1..=100)) {
            return api_error(
                StatusCode::BAD_REQUEST,
                "INVALID_QUALITY",
                "quality must be an integer between 1 and 100",
                &id,
            );
        }
    }

    let original = upload.file.len();
    let optimized = original * 4 / 5;
    let data = upload.file[..optimized].to_vec();
    let savings = if original == 0 {
        0.0
    } else {
        (original - optimized) as f64 * 100.0 / original as f64
    };
    let mut operations: Vec<&str> = ["resize", "crop"]
        .into_iter()
        .filter(|op| upload.fields.contains_key(*op))
        .collect();
    if upload.fields.contains_key("format") {
        operations.push("convert");
    }
    operations.push("compress");

    info!(%id, original, optimized, "optimized upload");
    state.record_upload(upload);

    let headers = [
        ("content-type", "application/octet-stream".to_string()),
        ("x-original-size", original.to_string()),
        ("x-optimized-size", optimized.to_string()),
        ("x-savings-percent", format!("{savings:.1}")),
        ("x-operations", operations.join(",")),
    ];
    let mut response = data.into_response();
    for (name, value) in headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

async fn usage_stats() -> Json<serde_json::Value> {
    Json(json!({
        "usage": {"used": 40, "remaining": 60, "total": 100, "percentage": 40.0},
        "plan": {"id": "pro", "name": "Pro", "base_limit": 100},
        "addons": {
            "current_credits": 500,
            "purchase_history": [
                {"type": "credits_500", "credits": 500, "price": 900, "purchased_at": "2026-01-02T03:04:05Z"}
            ]
        },
        "cycle": {"reset_at": "2026-02-01T00:00:00Z", "days_until_reset": 12}
    }))
}

async fn limits() -> Json<serde_json::Value> {
    Json(json!({
        "plan": "pro",
        "max_file_size_mb": (MAX_FILE_SIZE / 1024 / 1024).to_string(),
        "max_pixels": MAX_PIXELS,
        "max_operations": 10,
        "formats": ALLOWED_FORMATS,
        "features": ["resize", "crop", "convert", "metadata"],
        "rate_limit": RATE_LIMIT
    }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateInput {
    #[serde(rename = "fileSize", default)]
    pub file_size: u64,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub width: u64,
    #[serde(default)]
    pub height: u64,
}

async fn validate(Json(input): Json<ValidateInput>) -> Json<serde_json::Value> {
    let mut warnings = Vec::new();
    if input.file_size > MAX_FILE_SIZE {
        warnings.push(json!({
            "code": "FILE_SIZE_EXCEEDED",
            "message": format!(
                "File size {:.2}MB exceeds plan limit of {}MB",
                input.file_size as f64 / 1024.0 / 1024.0,
                MAX_FILE_SIZE / 1024 / 1024
            ),
        }));
    }
    if let Some(format) = input.format.as_deref().filter(|f| !f.is_empty()) {
        if !ALLOWED_FORMATS.contains(&format.to_ascii_lowercase().as_str()) {
            warnings.push(json!({
                "code": "UNSUPPORTED_FORMAT",
                "message": format!("Format '{format}' not supported on pro plan"),
            }));
        }
    }
    if input.width > 0 && input.height > 0 && input.width * input.height > MAX_PIXELS {
        warnings.push(json!({
            "code": "RESOLUTION_EXCEEDED",
            "message": format!("Resolution {}x{} exceeds plan limit", input.width, input.height),
        }));
    }

    Json(json!({
        "valid": warnings.is_empty(),
        "warnings": warnings,
        "plan": "pro",
        "limits": {
            "max_file_size_mb": (MAX_FILE_SIZE / 1024 / 1024).to_string(),
            "max_pixels": MAX_PIXELS,
            "allowed_formats": ALLOWED_FORMATS,
        }
    }))
}
