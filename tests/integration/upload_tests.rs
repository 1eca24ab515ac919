//! Upload endpoint tests.
//!
//! These run the full router against the in-memory store and check the
//! wire shape of both successful conversions and rejections.

use axum::http::{Method, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use tower::ServiceExt;

use site_cms::{create_router, MemoryStore, RouterConfig, UploadLimits};

use super::test_utils::{
    admin_token, auth_router, body_json, dev_router, empty_request, gradient_jpeg, gradient_png,
    is_valid_jpeg, json_request, multipart_body, multipart_request, noisy_png, transparent_png,
    upload_request,
};

#[tokio::test]
async fn test_small_png_is_converted_to_jpeg() {
    let router = dev_router();
    let png = transparent_png(100, 100);

    let response = router
        .oneshot(upload_request("logo.png", &png, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["compression_applied"], false);
    assert_eq!(json["metadata"]["method"], "converted");
    assert_eq!(json["metadata"]["quality_used"], 95);
    assert_eq!(json["metadata"]["original_format"], "PNG");
    assert_eq!(json["metadata"]["final_format"], "JPEG");
    assert_eq!(json["metadata"]["final_dimensions"]["width"], 100);
    assert_eq!(json["metadata"]["final_dimensions"]["height"], 100);

    assert_eq!(json["file_info"]["filename"], "logo.png");
    assert_eq!(json["file_info"]["content_type"], "image/jpeg");
    assert_eq!(json["file_info"]["web_compatible"], true);
    assert_eq!(json["file_info"]["original_size"], png.len());

    let jpeg = STANDARD.decode(json["image"].as_str().unwrap()).unwrap();
    assert!(is_valid_jpeg(&jpeg));
    assert_eq!(json["file_info"]["final_size"], jpeg.len());

    // Transparent pixels land on white
    let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
    let pixel = decoded.get_pixel(10, 50);
    assert!(pixel.0.iter().all(|&c| c > 240), "expected white, got {:?}", pixel);
}

#[tokio::test]
async fn test_jpeg_upload_accepted() {
    let router = dev_router();
    let jpeg = gradient_jpeg(64, 48);

    let response = router
        .oneshot(upload_request("photo.JPG", &jpeg, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["metadata"]["original_format"], "JPEG");
    assert_eq!(json["metadata"]["original_dimensions"]["width"], 64);
    assert_eq!(json["metadata"]["original_dimensions"]["height"], 48);
}

#[tokio::test]
async fn test_oversized_image_is_resized_to_bounds() {
    let limits = UploadLimits {
        max_width: 200,
        max_height: 100,
        ..UploadLimits::default()
    };
    let router = create_router(
        MemoryStore::new(),
        RouterConfig::without_auth()
            .with_upload_limits(limits)
            .with_tracing(false),
    );

    let response = router
        .oneshot(upload_request("wide.png", &gradient_png(800, 200), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["metadata"]["final_dimensions"]["width"], 200);
    assert_eq!(json["metadata"]["final_dimensions"]["height"], 50);
}

#[tokio::test]
async fn test_large_upload_is_compressed() {
    let png = noisy_png(256, 256);
    let limits = UploadLimits {
        soft_threshold: 1024,
        compression_threshold: 2048,
        target_size: 16 * 1024,
        ..UploadLimits::default()
    };
    assert!(png.len() > limits.compression_threshold);

    let router = create_router(
        MemoryStore::new(),
        RouterConfig::without_auth()
            .with_upload_limits(limits)
            .with_tracing(false),
    );

    let response = router
        .oneshot(upload_request("noise.png", &png, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["compression_applied"], true);
    assert!(json["metadata"]["compression_level"].is_string());
    assert!(json["metadata"]["target_achieved"].is_boolean());

    let jpeg = STANDARD.decode(json["image"].as_str().unwrap()).unwrap();
    assert!(is_valid_jpeg(&jpeg));
}

#[tokio::test]
async fn test_empty_file_rejected() {
    let router = dev_router();

    let response = router
        .oneshot(upload_request("empty.png", &[], None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["detail"], "File is empty");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_disallowed_extension_rejected() {
    let router = dev_router();

    let response = router
        .oneshot(upload_request("notes.txt", &gradient_png(8, 8), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .starts_with("Invalid file type"));
}

#[tokio::test]
async fn test_corrupt_content_rejected() {
    let router = dev_router();

    let response = router
        .oneshot(upload_request("fake.png", b"definitely not a png", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .starts_with("Invalid image file"));
}

#[tokio::test]
async fn test_too_large_rejected_before_decoding() {
    let limits = UploadLimits {
        max_upload_size: 1024,
        ..UploadLimits::default()
    };
    let router = create_router(
        MemoryStore::new(),
        RouterConfig::without_auth()
            .with_upload_limits(limits)
            .with_tracing(false),
    );

    // Garbage bytes: a size rejection must come before any decode attempt
    let response = router
        .oneshot(upload_request("big.png", &vec![0u8; 1500], None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .starts_with("File too large"));
}

#[tokio::test]
async fn test_over_ceiling_upload_gets_descriptive_error() {
    let router = dev_router();
    let body = vec![0u8; 60 * 1024 * 1024];

    let response = router
        .oneshot(upload_request("huge.png", &body, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "File too large. Maximum size is 50.0MB");
}

#[tokio::test]
async fn test_uploaded_images_can_be_stored_in_documents() {
    let router = auth_router();
    let token = admin_token();

    let response = router
        .clone()
        .oneshot(upload_request("site.png", &noisy_png(1600, 1000), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let image = body_json(response).await["image"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(image.len() > 1024 * 1024, "expected a megabyte-scale payload");

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/latest-works",
            &json!({"title": "Hallway", "image": image}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/gallery-events",
            &json!({"title": "Open day", "images": [image, image]}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(empty_request(Method::GET, &format!("/latest-works/{}", id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stored = body_json(response).await;
    assert_eq!(stored["image"].as_str(), Some(image.as_str()));
    assert!(is_valid_jpeg(&STANDARD.decode(&image).unwrap()));
}

#[tokio::test]
async fn test_missing_file_field_rejected() {
    let router = dev_router();
    let body = multipart_body("attachment", Some("logo.png"), &gradient_png(8, 8));

    let response = router
        .oneshot(multipart_request(body, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "No file provided");
}

#[tokio::test]
async fn test_missing_filename_rejected() {
    let router = dev_router();
    let body = multipart_body("file", None, &gradient_png(8, 8));

    let response = router
        .oneshot(multipart_request(body, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["detail"], "No filename provided");
}
