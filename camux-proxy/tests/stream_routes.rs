// Integration tests for the stream-control routes
//
// The router runs in-process against a wiremock SDM upstream:
// - command forwarding and raw response pass-through
// - bearer token requirement
// - request validation
// - upstream error mapping

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use camux_proxy::sdm::{EXTEND_WEBRTC_STREAM, GENERATE_WEBRTC_STREAM, STOP_WEBRTC_STREAM};
use camux_proxy::{create_router, AppState, SdmClient};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE_PATH: &str = "/enterprises/project-1/devices/cam-1:executeCommand";

fn create_test_router(sdm_uri: &str) -> Router {
    let sdm = SdmClient::new(sdm_uri, "project-1", Duration::from_secs(5)).unwrap();
    create_router(AppState { sdm: Arc::new(sdm) }, "http://localhost:3000").unwrap()
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_generate_returns_raw_sdm_response() {
    let sdm = MockServer::start().await;
    let upstream = json!({
        "results": {
            "answerSdp": "v=0",
            "streamToken": "tok",
            "streamExtensionToken": "ext",
            "expiresAt": "2026-01-01T00:05:00Z"
        }
    });
    Mock::given(method("POST"))
        .and(path(DEVICE_PATH))
        .and(header_matcher("authorization", "Bearer user-token"))
        .and(body_json(json!({
            "command": GENERATE_WEBRTC_STREAM,
            "params": { "offerSdp": "offer" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream.clone()))
        .expect(1)
        .mount(&sdm)
        .await;

    let response = create_test_router(&sdm.uri())
        .oneshot(post(
            "/api/stream/cam-1/generate",
            Some("user-token"),
            json!({ "offerSdp": "offer" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, upstream);
}

#[tokio::test]
async fn test_missing_bearer_is_unauthorized() {
    let sdm = MockServer::start().await;

    let response = create_test_router(&sdm.uri())
        .oneshot(post(
            "/api/stream/cam-1/generate",
            None,
            json!({ "offerSdp": "offer" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = read_json(response).await;
    assert_eq!(body["error"], "Authentication required");
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_generate_requires_offer() {
    let sdm = MockServer::start().await;

    let response = create_test_router(&sdm.uri())
        .oneshot(post("/api/stream/cam-1/generate", Some("t"), json!({ "offerSdp": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(response).await["error"], "offerSdp is required");
}

#[tokio::test]
async fn test_extend_forwards_token() {
    let sdm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEVICE_PATH))
        .and(body_json(json!({
            "command": EXTEND_WEBRTC_STREAM,
            "params": { "streamExtensionToken": "ext" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": { "streamExtensionToken": "ext-2", "streamToken": "tok-2" }
        })))
        .expect(1)
        .mount(&sdm)
        .await;

    let response = create_test_router(&sdm.uri())
        .oneshot(post(
            "/api/stream/cam-1/extend",
            Some("t"),
            json!({ "streamExtensionToken": "ext" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["results"]["streamToken"], "tok-2");
}

#[tokio::test]
async fn test_stop_reports_success() {
    let sdm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEVICE_PATH))
        .and(body_json(json!({
            "command": STOP_WEBRTC_STREAM,
            "params": { "streamToken": "tok" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&sdm)
        .await;

    let response = create_test_router(&sdm.uri())
        .oneshot(post("/api/stream/cam-1/stop", Some("t"), json!({ "streamToken": "tok" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "success": true }));
}

#[tokio::test]
async fn test_upstream_failures_are_mapped() {
    let sdm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEVICE_PATH))
        .and(body_json(json!({
            "command": EXTEND_WEBRTC_STREAM,
            "params": { "streamExtensionToken": "expired" }
        })))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": 401, "message": "Request had invalid authentication credentials." }
        })))
        .mount(&sdm)
        .await;
    Mock::given(method("POST"))
        .and(path(DEVICE_PATH))
        .and(body_json(json!({
            "command": STOP_WEBRTC_STREAM,
            "params": { "streamToken": "tok" }
        })))
        .respond_with(ResponseTemplate::new(503))
        .mount(&sdm)
        .await;

    let router = create_test_router(&sdm.uri());

    let response = router
        .clone()
        .oneshot(post(
            "/api/stream/cam-1/extend",
            Some("t"),
            json!({ "streamExtensionToken": "expired" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(post("/api/stream/cam-1/stop", Some("t"), json!({ "streamToken": "tok" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(read_json(response).await["error"], "Failed to stop camera stream");
}

#[tokio::test]
async fn test_health() {
    let sdm = MockServer::start().await;

    let response = create_test_router(&sdm.uri())
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_cors_allows_frontend_with_credentials() {
    let sdm = MockServer::start().await;

    let response = create_test_router(&sdm.uri())
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/stream/cam-1/generate")
                .header(header::ORIGIN, "http://localhost:3000")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}
