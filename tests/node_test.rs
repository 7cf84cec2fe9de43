//! Integration tests for the node HTTP surface: auth gate, chunk
//! store/get/delete, and request validation.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rdfs_node::{encoding, router, AppState, Config};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const TOKEN: &str = "695bfaf2-f381-470b-945c-6cb11fa7a73c";

async fn test_app_with(config: impl FnOnce(&mut Config)) -> (TempDir, Router) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut cfg = Config::new(TOKEN, tmp_dir.path());
    config(&mut cfg);
    let state = AppState::new(cfg).await.expect("Failed to build state");
    (tmp_dir, router(state))
}

async fn test_app() -> (TempDir, Router) {
    test_app_with(|_| {}).await
}

/// Send a request and return the status plus raw body.
async fn call(app: &Router, path: &str, token: Option<&str>, body: Option<String>) -> (StatusCode, Vec<u8>) {
    let method = if body.is_some() { Method::POST } else { Method::GET };
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("x-rdfs-token", token);
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn post(app: &Router, path: &str, body: Value) -> (StatusCode, Vec<u8>) {
    call(app, path, Some(TOKEN), Some(body.to_string())).await
}

fn error_kind(body: &[u8]) -> String {
    let value: Value = serde_json::from_slice(body).unwrap();
    value["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_root_requires_token() {
    let (_tmp, app) = test_app().await;

    let (status, body) = call(&app, "/", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");

    for token in [None, Some(""), Some("wrong-token"), Some("695bfaf2")] {
        let (status, body) = call(&app, "/", token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{token:?}");
        assert_eq!(error_kind(&body), "unauthorized");
    }
}

#[tokio::test]
async fn test_store_get_delete_round_trip() {
    let (_tmp, app) = test_app().await;

    let (status, _) = post(
        &app,
        "/store-chunk",
        json!({ "id": "test.txt", "chunk": "dGhpcyBpcyBhIHRlc3QgZmlsZSE=" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, "/get-chunk", json!({ "id": "test.txt" })).await;
    assert_eq!(status, StatusCode::OK);
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["id"], "test.txt");
    let content = encoding::decode(doc["chunk"].as_str().unwrap()).unwrap();
    assert_eq!(content, b"this is a test file!");

    let (status, _) = post(&app, "/delete-chunk", json!({ "id": "test.txt" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, "/get-chunk", json!({ "id": "test.txt" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_kind(&body), "not_found");
}

#[tokio::test]
async fn test_missing_chunk_is_not_found() {
    let (_tmp, app) = test_app().await;

    let (status, _) = post(&app, "/get-chunk", json!({ "id": "this-file-does-not-exist" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post(&app, "/delete-chunk", json!({ "id": "this-file-does-not-exist" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overwrite_returns_latest_bytes() {
    let (_tmp, app) = test_app().await;
    let first = vec![0xAAu8; 4096];
    let second: Vec<u8> = (0..=255u8).collect();

    for data in [&first, &second] {
        let (status, _) = post(
            &app,
            "/store-chunk",
            json!({ "id": "blob", "chunk": encoding::encode(data) }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = post(&app, "/get-chunk", json!({ "id": "blob" })).await;
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(encoding::decode(doc["chunk"].as_str().unwrap()).unwrap(), second);
}

#[tokio::test]
async fn test_path_like_ids_are_opaque() {
    let (_tmp, app) = test_app().await;

    for id in ["../../escape.txt", "nested/dir/file.bin", "."] {
        let (status, _) = post(
            &app,
            "/store-chunk",
            json!({ "id": id, "chunk": encoding::encode(id.as_bytes()) }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{id}");
    }

    let (_, body) = post(&app, "/get-chunk", json!({ "id": "../../escape.txt" })).await;
    let doc: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        encoding::decode(doc["chunk"].as_str().unwrap()).unwrap(),
        b"../../escape.txt"
    );
}

#[tokio::test]
async fn test_every_endpoint_rejects_missing_token() {
    let (_tmp, app) = test_app().await;

    for path in ["/get-chunk", "/store-chunk", "/delete-chunk", "/send-chunk"] {
        // Auth runs before the body is looked at, even an invalid one.
        for body in ["{\"id\":\"x\",\"chunk\":\"eA==\",\"target\":\"http://localhost:1\"}", "not json"] {
            let (status, _) = call(&app, path, None, Some(body.to_string())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{path} {body}");
            let (status, _) = call(&app, path, Some("nope"), Some(body.to_string())).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{path} {body}");
        }
    }
}

#[tokio::test]
async fn test_invalid_bodies_are_bad_requests() {
    let (_tmp, app) = test_app().await;

    let cases = [
        ("/store-chunk", "not json"),
        ("/store-chunk", "{\"id\":\"a\"}"),
        ("/store-chunk", "{\"id\":5,\"chunk\":\"eA==\"}"),
        ("/store-chunk", "{\"id\":\"a\",\"chunk\":\"%%%not-base64%%%\"}"),
        ("/store-chunk", "{\"id\":\"\",\"chunk\":\"eA==\"}"),
        ("/get-chunk", "{}"),
        ("/get-chunk", "{\"id\":\"\"}"),
        ("/delete-chunk", "[1,2,3]"),
        ("/send-chunk", "{\"id\":\"a\"}"),
        ("/send-chunk", "{\"id\":\"a\",\"target\":\"not a url\"}"),
    ];

    for (path, body) in cases {
        let (status, response) = call(&app, path, Some(TOKEN), Some(body.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{path} {body}");
        assert_eq!(error_kind(&response), "bad_request", "{path} {body}");
    }
}

#[tokio::test]
async fn test_missing_content_type_is_bad_request() {
    let (_tmp, app) = test_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/get-chunk")
        .header("x-rdfs-token", TOKEN)
        .body(Body::from("{\"id\":\"a\"}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_chunk_is_rejected() {
    let (_tmp, app) = test_app_with(|config| config.storage.max_chunk_bytes = 8).await;

    let (status, _) = post(
        &app,
        "/store-chunk",
        json!({ "id": "small", "chunk": encoding::encode(b"12345678") }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        "/store-chunk",
        json!({ "id": "big", "chunk": encoding::encode(b"123456789") }),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_kind(&body), "payload_too_large");

    let (status, _) = post(&app, "/get-chunk", json!({ "id": "big" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_send_missing_chunk_is_not_found() {
    let (_tmp, app) = test_app().await;

    let (status, body) = post(
        &app,
        "/send-chunk",
        json!({ "id": "missing.bin", "target": "http://127.0.0.1:9" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_kind(&body), "not_found");
}
