//! Contact form tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use site_cms::{create_router, MemoryStore, RouterConfig};

use super::test_utils::{admin_token, auth_config, body_json, dev_router, empty_request, json_request};

fn submit_from(client: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Submission arriving from `peer` with a client-chosen forwarding header.
fn submit_via_peer(peer: [u8; 4], forwarded: &str, body: &serde_json::Value) -> Request<Body> {
    let mut request = submit_from(forwarded, body);
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40_000))));
    request
}

fn valid_form() -> serde_json::Value {
    json!({
        "name": "Jane Doe",
        "email": "jane@example.com",
        "message": "Could you quote for a loft conversion?",
        "phone": "01234 567890",
        "captchaToken": "ignored"
    })
}

#[tokio::test]
async fn test_submission_stored_as_pending_inquiry() {
    let router = create_router(MemoryStore::new(), auth_config());

    let response = router
        .clone()
        .oneshot(json_request(Method::POST, "/submit", &valid_form(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Form submitted successfully");
    let id = json["id"].as_str().unwrap().to_string();

    let token = admin_token();
    let response = router
        .oneshot(empty_request(
            Method::GET,
            &format!("/inquiries/{}", id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let inquiry = body_json(response).await;
    assert_eq!(inquiry["name"], "Jane Doe");
    assert_eq!(inquiry["phone"], "01234 567890");
    assert_eq!(inquiry["status"], "pending");
    assert_eq!(inquiry["is_solved"], false);
    assert!(inquiry["created_at"].is_u64());
    assert!(inquiry.get("captchaToken").is_none());
}

#[tokio::test]
async fn test_missing_field_rejected() {
    let router = dev_router();

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/submit",
            &json!({"name": "Jane", "email": "jane@example.com"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["detail"], "Field 'message' is required");
}

#[tokio::test]
async fn test_invalid_email_rejected() {
    let router = dev_router();

    let mut form = valid_form();
    form["email"] = json!("jane at example dot com");

    let response = router
        .oneshot(json_request(Method::POST, "/submit", &form, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "Invalid email address");
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let router = create_router(
        MemoryStore::new(),
        RouterConfig::without_auth()
            .with_rate_limit(2, Duration::from_secs(3600))
            .with_trust_forwarded(true)
            .with_tracing(false),
    );

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(submit_from("203.0.113.7", &valid_form()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router
        .clone()
        .oneshot(submit_from("203.0.113.7", &valid_form()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // A different client has its own quota
    let response = router
        .oneshot(submit_from("198.51.100.2", &valid_form()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_rotating_forwarded_header_cannot_reset_quota() {
    let router = create_router(
        MemoryStore::new(),
        RouterConfig::without_auth()
            .with_rate_limit(1, Duration::from_secs(3600))
            .with_tracing(false),
    );

    let response = router
        .clone()
        .oneshot(submit_via_peer([192, 0, 2, 10], "198.51.100.1", &valid_form()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .clone()
        .oneshot(submit_via_peer([192, 0, 2, 10], "198.51.100.2", &valid_form()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another peer is still a different client
    let response = router
        .oneshot(submit_via_peer([192, 0, 2, 11], "198.51.100.2", &valid_form()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}
