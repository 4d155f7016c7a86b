// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP-level tests for the submission endpoint.

mod harness;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use harness::{fakes::RecordingGateway, RelayBuilder};
use serde_json::{json, Value};
use tower::ServiceExt;

const ENDPOINT: &str = "/api/contact";

fn post_json(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_form(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(ENDPOINT)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn valid() -> Value {
    json!({"name": "Test User", "email": "test@example.com", "message": "hello"})
}

#[tokio::test]
async fn test_accepted_submission() {
    let (app, gateway, _) = RelayBuilder::new().build().into_router();

    let response = send(&app, post_json(valid())).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"ok": true}));
    assert_eq!(gateway.attempts(), 1);
}

#[tokio::test]
async fn test_get_is_method_not_allowed() {
    let (app, gateway, _) = RelayBuilder::new().build().into_router();

    let request = Request::builder()
        .method("GET")
        .uri(ENDPOINT)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers()[header::ALLOW], "POST, OPTIONS");
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "MethodNotAllowed");
    assert_eq!(gateway.attempts(), 0);
}

#[tokio::test]
async fn test_spam_is_bad_request_without_delivery() {
    let (app, gateway, _) = RelayBuilder::new().build().into_router();

    let response = send(
        &app,
        post_json(json!({
            "name": "Bot",
            "email": "bot@example.com",
            "website": "http://spam.com",
            "message": "x"
        })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "SpamDetected");
    assert_eq!(gateway.attempts(), 0);
}

#[tokio::test]
async fn test_validation_errors() {
    let (app, _, _) = RelayBuilder::new().build().into_router();

    let cases = [
        (json!({"email": "test@example.com", "message": "hi"}), "MissingName"),
        (json!({"name": "T", "email": "not-an-email", "message": "hi"}), "InvalidEmailFormat"),
        (json!({"name": "T", "_replyto": "t@example.com"}), "MissingMessage"),
        (json!(["not", "an", "object"]), "MissingName"),
    ];

    for (body, expected) in cases {
        let response = send(&app, post_json(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], expected);
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn test_rate_limit_returns_429_with_retry_after() {
    let (app, gateway, _) = RelayBuilder::new().build().into_router();

    for _ in 0..5 {
        assert_eq!(send(&app, post_json(valid())).await.status(), StatusCode::OK);
    }

    let response = send(&app, post_json(valid())).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(retry_after, 15 * 60);
    assert_eq!(json_body(response).await["error"], "RateLimited");
    assert_eq!(gateway.attempts(), 5);
}

#[tokio::test]
async fn test_forwarded_for_splits_quota_when_trusted() {
    let (app, _, _) = RelayBuilder::new()
        .config(|c| {
            c.trust_forwarded_for = true;
            c.rate_limit.max_requests = 1;
        })
        .build()
        .into_router();

    for client in ["203.0.113.1", "203.0.113.2"] {
        let mut request = post_json(valid());
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        assert_eq!(send(&app, request).await.status(), StatusCode::OK);
    }

    let mut request = post_json(valid());
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.1".parse().unwrap());
    assert_eq!(send(&app, request).await.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_provider_detail_stays_out_of_response() {
    let (app, gateway, _) = RelayBuilder::new()
        .gateway(RecordingGateway::rejecting(403, "API key re_live_abc123 is revoked"))
        .build()
        .into_router();

    let response = send(&app, post_json(valid())).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("re_live_abc123"));
    assert!(!text.contains("403"));

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"], "DeliveryFailed");
    assert_eq!(gateway.attempts(), 1);
}

#[tokio::test]
async fn test_form_post_accepted() {
    let (app, gateway, _) = RelayBuilder::new().build().into_router();

    let response = send(
        &app,
        post_form("name=Grace+Hopper&_replyto=grace%40example.com&message=Hello%21"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let sent = gateway.last().unwrap();
    assert_eq!(sent.name(), "Grace Hopper");
    assert_eq!(sent.email(), "grace@example.com");
    assert_eq!(sent.message(), "Hello!");
}

#[tokio::test]
async fn test_form_post_redirects_to_next_url() {
    let (app, _, _) = RelayBuilder::new().build().into_router();

    let response = send(
        &app,
        post_form("name=T&email=t%40example.com&message=hi&nextUrl=https%3A%2F%2Fexample.com%2Fthanks"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "https://example.com/thanks");
}

#[tokio::test]
async fn test_json_post_ignores_next_url() {
    let (app, _, _) = RelayBuilder::new().build().into_router();

    let mut body = valid();
    body["nextUrl"] = json!("https://example.com/thanks");
    let response = send(&app, post_json(body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"ok": true}));
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _, _) = RelayBuilder::new().build().into_router();

    let request = Request::builder()
        .method("OPTIONS")
        .uri(ENDPOINT)
        .header(header::ORIGIN, "https://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert!(response.status().is_success());
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("POST"));
    assert!(methods.contains("OPTIONS"));
    let allowed_headers = headers[header::ACCESS_CONTROL_ALLOW_HEADERS]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(allowed_headers.contains("content-type"));
}

#[tokio::test]
async fn test_cors_restricted_origin() {
    let (app, _, _) = RelayBuilder::new()
        .config(|c| c.cors.allowed_origins = vec!["https://site.example".to_string()])
        .build()
        .into_router();

    let mut request = post_json(valid());
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://site.example".parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://site.example"
    );

    let mut request = post_json(valid());
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());
    let response = send(&app, request).await;
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_health() {
    let (app, _, _) = RelayBuilder::new().build().into_router();

    let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "contact-relay");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, _) = RelayBuilder::new().build().into_router();

    send(&app, post_json(valid())).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#"contact_relay_submissions_total{outcome="Accepted"} 1"#));
}

#[tokio::test]
async fn test_metrics_can_be_disabled() {
    let (app, _, _) = RelayBuilder::new()
        .config(|c| c.metrics.enabled = false)
        .build()
        .into_router();

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    assert_eq!(send(&app, request).await.status(), StatusCode::NOT_FOUND);
}
