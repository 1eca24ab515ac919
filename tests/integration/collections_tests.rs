//! Collection CRUD tests with authentication disabled.

use axum::http::{Method, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use site_cms::{create_router, RouterConfig};

use super::test_utils::{body_json, dev_router, empty_request, json_request, FailingStore};

#[tokio::test]
async fn test_health_endpoint() {
    let router = dev_router();

    let response = router
        .oneshot(empty_request(Method::GET, "/health", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_document_lifecycle() {
    let router = dev_router();

    // Create
    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/events",
            &json!({"title": "Open day", "date": "2026-05-01"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let id = created["_id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 24);
    assert_eq!(created["title"], "Open day");

    // List
    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, "/events", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Update merges fields
    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/events/{}", id),
            &json!({"title": "Open day (rescheduled)"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["title"], "Open day (rescheduled)");
    assert_eq!(updated["date"], "2026-05-01");
    assert_eq!(updated["_id"], id.as_str());

    // Get
    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, &format!("/events/{}", id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["title"], "Open day (rescheduled)");

    // Delete
    let response = router
        .clone()
        .oneshot(empty_request(Method::DELETE, &format!("/events/{}", id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());

    // Gone
    let response = router
        .oneshot(empty_request(Method::GET, &format!("/events/{}", id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_client_supplied_id_is_ignored() {
    let router = dev_router();

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/faqs",
            &json!({"_id": "ffffffffffffffffffffffff", "question": "Parking?"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_ne!(json["_id"], "ffffffffffffffffffffffff");
}

#[tokio::test]
async fn test_unknown_collection_not_found() {
    let router = dev_router();

    let response = router
        .oneshot(empty_request(Method::GET, "/secrets", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_malformed_id_rejected() {
    let router = dev_router();

    let response = router
        .oneshot(empty_request(Method::GET, "/events/not-an-id", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_id");
}

#[tokio::test]
async fn test_missing_document_not_found() {
    let router = dev_router();

    let response = router
        .oneshot(empty_request(
            Method::DELETE,
            "/events/000000000000000000000abc",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_object_body_rejected() {
    let router = dev_router();

    let response = router
        .oneshot(json_request(Method::POST, "/events", &json!([1, 2, 3]), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_document");
}

#[tokio::test]
async fn test_backend_failure_is_reported_generically() {
    let router = create_router(FailingStore, RouterConfig::without_auth().with_tracing(false));

    let response = router
        .oneshot(empty_request(Method::GET, "/events", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "storage_error");
    assert_eq!(json["detail"], "Internal storage error");
    assert!(!json.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_cors_preflight() {
    let router = dev_router();

    let request = axum::http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/events")
        .header("origin", "https://example.com")
        .header("access-control-request-method", "POST")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
