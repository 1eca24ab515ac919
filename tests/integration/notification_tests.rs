//! Inquiry replies and job-application decisions, which send email.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use site_cms::{create_router, MemoryMailer, MemoryStore};

use super::test_utils::{admin_token, auth_config, body_json, empty_request, json_request, mail_router};

async fn submit_inquiry(router: &axum::Router) -> String {
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
    body_json(response).await["id"].as_str().unwrap().to_string()
}

async fn apply(router: &axum::Router, application: Value) -> String {
    let response = router
        .clone()
        .oneshot(json_request(Method::POST, "/job-applications", &application, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["_id"].as_str().unwrap().to_string()
}

async fn fetch(router: &axum::Router, uri: &str) -> Value {
    let token = admin_token();
    let response = router
        .clone()
        .oneshot(empty_request(Method::GET, uri, Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

fn reply_body() -> Value {
    json!({
        "plain_text_body": "Thanks Jane, we can visit on Monday.",
        "html_body": "<p>Thanks Jane, we can visit on Monday.</p>"
    })
}

// =============================================================================
// Inquiry Replies
// =============================================================================

#[tokio::test]
async fn test_reply_emails_author_and_solves_inquiry() {
    let (router, mailer) = mail_router();
    let id = submit_inquiry(&router).await;
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/inquiries/{}/reply", id),
            &reply_body(),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "Reply sent successfully");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jane@example.com");
    assert_eq!(sent[0].subject, "Reply to Your Inquiry - E&S Decorations");
    assert_eq!(sent[0].text_body, "Thanks Jane, we can visit on Monday.");

    let inquiry = fetch(&router, &format!("/inquiries/{}", id)).await;
    assert_eq!(inquiry["status"], "solved");
    assert_eq!(inquiry["is_solved"], true);
    assert!(inquiry["replied_at"].is_u64());
}

#[tokio::test]
async fn test_reply_requires_token() {
    let (router, mailer) = mail_router();
    let id = submit_inquiry(&router).await;

    let response = router
        .oneshot(json_request(
            Method::POST,
            &format!("/inquiries/{}/reply", id),
            &reply_body(),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_reply_to_missing_inquiry() {
    let (router, mailer) = mail_router();
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/inquiries/ffffffffffffffffffffffff/reply",
            &reply_body(),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/inquiries/not-an-id/reply",
            &reply_body(),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_empty_reply_rejected() {
    let (router, mailer) = mail_router();
    let id = submit_inquiry(&router).await;
    let token = admin_token();

    let response = router
        .oneshot(json_request(
            Method::POST,
            &format!("/inquiries/{}/reply", id),
            &json!({"plain_text_body": "  ", "html_body": ""}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mailer.sent().is_empty());
}

#[tokio::test]
async fn test_failed_delivery_leaves_inquiry_open() {
    let mailer = Arc::new(MemoryMailer::failing("smtp timeout"));
    let router = create_router(MemoryStore::new(), auth_config().with_mailer(mailer));
    let id = submit_inquiry(&router).await;
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/inquiries/{}/reply", id),
            &reply_body(),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "mail_error");

    let inquiry = fetch(&router, &format!("/inquiries/{}", id)).await;
    assert_eq!(inquiry["status"], "pending");
    assert_eq!(inquiry["is_solved"], false);
}

// =============================================================================
// Application Status
// =============================================================================

#[tokio::test]
async fn test_approval_sends_acceptance_email_once() {
    let (router, mailer) = mail_router();
    let id = apply(
        &router,
        json!({"name": "Sam Carter", "email": "sam@example.com", "status": "pending"}),
    )
    .await;
    let token = admin_token();
    let uri = format!("/job-applications/{}/status?status=approved", id);

    let response = router
        .clone()
        .oneshot(empty_request(Method::PATCH, &uri, Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Application approved successfully");
    assert_eq!(json["email_sent"], true);
    assert_eq!(json["application"]["status"], "approved");

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "sam@example.com");
    assert_eq!(sent[0].subject, "Welcome to E&S Decorations!");
    assert!(sent[0].text_body.starts_with("Dear Sam Carter,"));

    // Approving again does not send a second offer
    let response = router
        .oneshot(empty_request(Method::PATCH, &uri, Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email_sent"], false);
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_rejection_sends_nothing() {
    let (router, mailer) = mail_router();
    let id = apply(&router, json!({"name": "Sam", "email": "sam@example.com"})).await;
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(empty_request(
            Method::PATCH,
            &format!("/job-applications/{}/status?status=Rejected", id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["application"]["status"], "rejected");
    assert!(mailer.sent().is_empty());

    let application = fetch(&router, &format!("/job-applications/{}", id)).await;
    assert_eq!(application["status"], "rejected");
    assert!(application["status_updated_at"].is_u64());
}

#[tokio::test]
async fn test_unknown_status_rejected() {
    let (router, _mailer) = mail_router();
    let id = apply(&router, json!({"name": "Sam", "email": "sam@example.com"})).await;
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(empty_request(
            Method::PATCH,
            &format!("/job-applications/{}/status?status=hired", id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("pending, reviewed, approved, rejected"));

    let application = fetch(&router, &format!("/job-applications/{}", id)).await;
    assert!(application.get("status").is_none());
}

#[tokio::test]
async fn test_approval_without_email_rejected_before_update() {
    let (router, mailer) = mail_router();
    let id = apply(&router, json!({"name": "Sam"})).await;
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(empty_request(
            Method::PATCH,
            &format!("/job-applications/{}/status?status=approved", id),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "no_recipient");
    assert!(mailer.sent().is_empty());

    let application = fetch(&router, &format!("/job-applications/{}", id)).await;
    assert!(application.get("status").is_none());
}

#[tokio::test]
async fn test_status_change_requires_token() {
    let (router, _mailer) = mail_router();
    let id = apply(&router, json!({"name": "Sam", "email": "sam@example.com"})).await;

    let response = router
        .oneshot(empty_request(
            Method::PATCH,
            &format!("/job-applications/{}/status?status=approved", id),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
