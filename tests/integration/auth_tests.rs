//! Authentication and access-policy tests.
//!
//! These run the router with auth enabled and a configured admin account.

use std::time::Duration;

use axum::http::{header, Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use site_cms::{create_router, MemoryStore, RouterConfig, TokenAuth};

use super::test_utils::{
    admin_token, auth_config, auth_router, body_json, empty_request, gradient_png,
    json_request, upload_request, ADMIN_PASSWORD, ADMIN_USER, TEST_SECRET,
};

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_then_write_with_token() {
    let router = auth_router();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/admin/login",
            &json!({"username": ADMIN_USER, "password": ADMIN_PASSWORD}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["token_type"], "bearer");
    assert!(json["expires_at"].as_u64().unwrap() > 0);
    let token = json["access_token"].as_str().unwrap().to_string();

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/latest-works",
            &json!({"title": "Kitchen refit"}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let router = auth_router();

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/admin/login",
            &json!({"username": ADMIN_USER, "password": "guess"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn test_login_without_admin_account() {
    let router = create_router(
        MemoryStore::new(),
        RouterConfig::new(TEST_SECRET).with_tracing(false),
    );

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/admin/login",
            &json!({"username": "anyone", "password": "anything"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Token Checks
// =============================================================================

#[tokio::test]
async fn test_write_without_token_rejected() {
    let router = auth_router();

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/events",
            &json!({"title": "Open day"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = body_json(response).await;
    assert_eq!(json["status"], 401);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_rejected() {
    let router = auth_router();
    let forged = TokenAuth::new("some-other-secret").issue(ADMIN_USER).token;

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/events",
            &json!({"title": "Open day"}),
            Some(&forged),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let router = auth_router();
    let expired = TokenAuth::new(TEST_SECRET).issue_with_expiry(ADMIN_USER, 1);

    let response = router
        .oneshot(empty_request(Method::GET, "/inquiries", Some(&expired)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_short_ttl_tokens_from_login_are_usable() {
    let router = create_router(
        MemoryStore::new(),
        auth_config().with_token_ttl(Duration::from_secs(60)),
    );

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/admin/login",
            &json!({"username": ADMIN_USER, "password": ADMIN_PASSWORD}),
            None,
        ))
        .await
        .unwrap();
    let token = body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = router
        .oneshot(empty_request(Method::GET, "/inquiries", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Access Policy
// =============================================================================

#[tokio::test]
async fn test_public_collections_readable_without_token() {
    let router = auth_router();

    for collection in ["events", "gallery-events", "faqs", "job-listings", "latest-works"] {
        let response = router
            .clone()
            .oneshot(empty_request(Method::GET, &format!("/{}", collection), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET /{}", collection);
    }
}

#[tokio::test]
async fn test_private_collections_require_token() {
    let router = auth_router();
    let token = admin_token();

    for collection in ["inquiries", "job-applications"] {
        let uri = format!("/{}", collection);
        let response = router
            .clone()
            .oneshot(empty_request(Method::GET, &uri, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "GET {}", uri);

        let response = router
            .clone()
            .oneshot(empty_request(Method::GET, &uri, Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {} with token", uri);
    }
}

#[tokio::test]
async fn test_job_application_submission_is_public() {
    let router = auth_router();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/job-applications",
            &json!({"name": "Sam", "position": "Joiner"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Deleting still needs an admin
    let response = router
        .oneshot(empty_request(
            Method::DELETE,
            &format!("/job-applications/{}", id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_requires_token() {
    let router = auth_router();
    let png = gradient_png(16, 16);

    let response = router
        .clone()
        .oneshot(upload_request("logo.png", &png, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let token = admin_token();
    let response = router
        .oneshot(upload_request("logo.png", &png, Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_solve_inquiry() {
    let router = auth_router();
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/submit",
            &json!({"name": "Jane", "email": "jane@example.com", "message": "Quote please"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/inquiries/{}/solve", id);

    let response = router
        .clone()
        .oneshot(empty_request(Method::PATCH, &uri, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(empty_request(Method::PATCH, &uri, Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "solved");
    assert_eq!(json["is_solved"], true);
    assert!(json["solved_at"].is_u64());
    assert_eq!(json["name"], "Jane");
}

#[tokio::test]
async fn test_auth_disabled_allows_everything() {
    let router = create_router(
        MemoryStore::new(),
        auth_config().with_auth_enabled(false),
    );

    let response = router
        .oneshot(empty_request(Method::GET, "/inquiries", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
