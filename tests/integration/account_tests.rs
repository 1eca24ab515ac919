//! Stored admin accounts: creation, updates and login.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use site_cms::{create_router, MemoryStore, RouterConfig};

use super::test_utils::{
    admin_token, auth_router, body_json, empty_request, json_request, TEST_PASSWORD_COST,
    TEST_SECRET,
};

/// Auth-enabled router with no configured admin, only stored ones.
fn accounts_only_router() -> axum::Router {
    create_router(
        MemoryStore::new(),
        RouterConfig::new(TEST_SECRET)
            .with_password_cost(TEST_PASSWORD_COST)
            .with_tracing(false),
    )
}

async fn add_admin(router: &axum::Router, admin: Value) -> (StatusCode, Value) {
    let token = admin_token();
    let response = router
        .clone()
        .oneshot(json_request(Method::POST, "/admin/add", &admin, Some(&token)))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn login(router: &axum::Router, username: &str, password: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/admin/login",
            &json!({"username": username, "password": password}),
            None,
        ))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

fn maria() -> Value {
    json!({"name": "Maria", "email": "maria@example.com", "password": "tile-grout-42"})
}

#[tokio::test]
async fn test_added_admin_can_log_in_and_write() {
    let router = auth_router();

    let (status, json) = add_admin(&router, maria()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "Admin added successfully");
    assert_eq!(json["admin_id"].as_str().unwrap().len(), 24);

    let (status, json) = login(&router, "maria@example.com", "tile-grout-42").await;
    assert_eq!(status, StatusCode::OK);
    let token = json["access_token"].as_str().unwrap().to_string();

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/faqs",
            &json!({"question": "Do you paint?", "answer": "Yes"}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_stored_admin_wrong_password() {
    let router = auth_router();
    add_admin(&router, maria()).await;

    let (status, _) = login(&router, "maria@example.com", "tile-grout-43").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_only_stored_admins() {
    let router = accounts_only_router();

    let (status, _) = login(&router, "maria@example.com", "tile-grout-42").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = add_admin(&router, maria()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = login(&router, "MARIA@example.com", "tile-grout-42").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = login(&router, "nobody@example.com", "tile-grout-42").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_admin_email_rejected() {
    let router = auth_router();
    add_admin(&router, maria()).await;

    let (status, json) = add_admin(
        &router,
        json!({"name": "Other", "email": "maria@example.com", "password": "another-pass"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "admin_exists");
}

#[tokio::test]
async fn test_invalid_admin_rejected() {
    let router = auth_router();

    let (status, _) = add_admin(
        &router,
        json!({"name": "Maria", "email": "maria@example.com", "password": "short"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = add_admin(
        &router,
        json!({"name": "Maria", "email": "not-an-email", "password": "long-enough"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_adding_admin_requires_token() {
    let router = auth_router();

    let response = router
        .oneshot(json_request(Method::POST, "/admin/add", &maria(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_takes_effect() {
    let router = auth_router();
    let (_, created) = add_admin(&router, maria()).await;
    let id = created["admin_id"].as_str().unwrap();
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/admin/update/{}", id),
            &json!({"new_password": "fresh-paint-7"}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Admin updated successfully");

    let (status, _) = login(&router, "maria@example.com", "tile-grout-42").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&router, "maria@example.com", "fresh-paint-7").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_conflicts_and_empty_bodies() {
    let router = auth_router();
    let (_, created) = add_admin(&router, maria()).await;
    let id = created["admin_id"].as_str().unwrap().to_string();
    add_admin(
        &router,
        json!({"name": "Leo", "email": "leo@example.com", "password": "leo-password"}),
    )
    .await;
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/admin/update/{}", id),
            &json!({}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/admin/update/{}", id),
            &json!({"email": "leo@example.com"}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Keeping one's own email is not a conflict
    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/admin/update/{}", id),
            &json!({"email": "maria@example.com", "name": "Maria R."}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(json_request(
            Method::PATCH,
            "/admin/update/ffffffffffffffffffffffff",
            &json!({"name": "Ghost"}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_accounts_not_exposed_as_collection() {
    let router = auth_router();
    add_admin(&router, maria()).await;
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, "/admins", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(empty_request(Method::GET, "/admins", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
