use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with_state, MockState, KEY_BROKEN, KEY_RATE_LIMITED};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn authed(method: &str, uri: &str, key: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {key}"))
}

fn header<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

const BOUNDARY: &str = "test-boundary";

fn multipart_body(fields: &[(&str, &str)], image: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn optimize_request(key: &str, body: Vec<u8>) -> Request<axum::body::Body> {
    authed("POST", "/v1/optimize", key)
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(axum::body::Body::from(body))
        .unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_key_is_401_json() {
    let resp = app()
        .oneshot(Request::builder().uri("/v1/limits").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header(&resp, "x-request-id"), "req_000001");
    let body = body_json(resp).await;
    assert_eq!(body["error"], "INVALID_API_KEY");
    assert_eq!(body["request_id"], "req_000001");
}

#[tokio::test]
async fn rate_limited_key_gets_429_with_retry_after() {
    let resp = app()
        .oneshot(authed("GET", "/v1/limits", KEY_RATE_LIMITED).body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&resp, "retry-after"), "30");
    assert_eq!(header(&resp, "x-ratelimit-remaining"), "0");
    let body = body_json(resp).await;
    assert_eq!(body["error"], "rate_limited");
    assert_eq!(body["message"], "too many requests");
}

#[tokio::test]
async fn broken_key_gets_plain_text_500() {
    let resp = app()
        .oneshot(authed("GET", "/v1/limits", KEY_BROKEN).body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_bytes(resp).await;
    assert_eq!(&body[..], b"upstream exploded");
}

// --- limits / usage ---

#[tokio::test]
async fn limits_carry_rate_limit_headers() {
    let resp = app()
        .oneshot(authed("GET", "/v1/limits", "sk_test").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-ratelimit-limit"), "100");
    assert_eq!(header(&resp, "x-ratelimit-remaining"), "99");
    let body = body_json(resp).await;
    assert_eq!(body["plan"], "pro");
    assert_eq!(body["max_file_size_mb"], "25");
}

#[tokio::test]
async fn usage_stats_shape() {
    let resp = app()
        .oneshot(authed("GET", "/v1/usage/stats", "sk_test").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["usage"]["used"], 40);
    assert_eq!(body["addons"]["purchase_history"][0]["type"], "credits_500");
}

#[tokio::test]
async fn sandbox_mode_is_echoed() {
    let resp = app()
        .oneshot(
            authed("GET", "/v1/limits", "sk_test")
                .header("x-mode", "sandbox")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(header(&resp, "x-mode"), "sandbox");
}

#[tokio::test]
async fn unknown_endpoint_is_json_404() {
    let resp = app()
        .oneshot(authed("GET", "/v1/nope", "sk_test").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "NOT_FOUND");
}

// --- validate ---

#[tokio::test]
async fn validate_flags_every_violation() {
    let resp = app()
        .oneshot(
            authed("POST", "/v1/validate", "sk_test")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(
                    r#"{"fileSize": 104857600, "format": "tiff", "width": 10000, "height": 10000}"#
                        .to_string(),
                )
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["valid"], false);
    let codes: Vec<&str> = body["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["code"].as_str().unwrap())
        .collect();
    assert_eq!(
        codes,
        vec!["FILE_SIZE_EXCEEDED", "UNSUPPORTED_FORMAT", "RESOLUTION_EXCEEDED"]
    );
}

#[tokio::test]
async fn validate_accepts_small_png() {
    let resp = app()
        .oneshot(
            authed("POST", "/v1/validate", "sk_test")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"fileSize": 2048, "format": "PNG", "width": 800, "height": 600}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["valid"], true);
    assert!(body["warnings"].as_array().unwrap().is_empty());
}

// --- optimize ---

#[tokio::test]
async fn optimize_records_upload_and_trims_bytes() {
    let state = MockState::default();
    let image = b"\x89PNG\r\n\x1a\n\0\0".to_vec();
    let resp = app_with_state(state.clone())
        .oneshot(optimize_request(
            "sk_test",
            multipart_body(&[("format", "webp"), ("quality", "80")], &image),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-original-size"), "10");
    assert_eq!(header(&resp, "x-optimized-size"), "8");
    assert_eq!(header(&resp, "x-savings-percent"), "20.0");
    assert_eq!(header(&resp, "x-operations"), "convert,compress");
    let body = body_bytes(resp).await;
    assert_eq!(&body[..], &image[..8]);

    let uploads = state.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].field_order, vec!["format", "quality", "image"]);
    assert_eq!(uploads[0].fields["quality"], "80");
    assert_eq!(uploads[0].file_name.as_deref(), Some("a.png"));
    assert_eq!(uploads[0].file_content_type.as_deref(), Some("image/png"));
    assert_eq!(uploads[0].file, image);
}

#[tokio::test]
async fn optimize_rejects_bad_quality() {
    let resp = app()
        .oneshot(optimize_request(
            "sk_test",
            multipart_body(&[("quality", "250")], b"abc"),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "INVALID_QUALITY");
}

#[tokio::test]
async fn optimize_without_image_is_400() {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"format\"\r\n\r\nwebp\r\n--{BOUNDARY}--\r\n"
    );
    let resp = app()
        .oneshot(optimize_request("sk_test", body.into_bytes()))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "MISSING_FILE");
}

// --- request ids ---

#[tokio::test]
async fn request_ids_are_sequential_per_server() {
    use tower::Service;

    let state = MockState::default();
    let mut app = app_with_state(state.clone()).into_service();

    for expected in ["req_000001", "req_000002"] {
        let resp = ServiceExt::ready(&mut app)
            .await
            .unwrap()
            .call(authed("GET", "/v1/limits", "sk_test").body(String::new()).unwrap())
            .await
            .unwrap();
        assert_eq!(header(&resp, "x-request-id"), expected);
    }
    assert_eq!(state.request_count(), 2);
    assert_eq!(state.auth_headers(), vec!["Bearer sk_test", "Bearer sk_test"]);
}
