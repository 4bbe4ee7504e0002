//! Router tests against the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use feed_api::{router, AppState, ServerConfig};
use feed_core::Repositories;
use feed_db::MemoryStore;
use feed_ingest::{IngestConfig, PostIngestor};

const HELLO: &str = "---\ntitle: Hello World\ntags: [rust, web]\n---\n# Intro\n\nbody\n";

fn app_with(store: Arc<MemoryStore>, api_token: Option<&str>) -> Router {
    let ingestor = PostIngestor::new(
        Repositories::from_store(store),
        IngestConfig::default().with_fetch_remote(false),
    )
    .unwrap();
    let state = AppState::new(ingestor, api_token.map(str::to_string));
    router(state, &ServerConfig::default())
}

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (app_with(store.clone(), None), store)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn submit(method: &str, uri: &str, doc: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(doc.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_create_post() {
    let (app, store) = app();
    let response = app
        .oneshot(submit("POST", "/api/markdown/posts", HELLO))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["message"], "Post processed successfully");
    assert_eq!(body["post"]["title"], "Hello World");
    assert_eq!(body["post"]["slug"], "hello-world");
    assert_eq!(body["post"]["expand"]["tags"].as_array().unwrap().len(), 2);
    assert_eq!(body["post"]["expand"]["chapters"][0]["title"], "Intro");
    assert!(body.get("warnings").is_none());
    assert_eq!(store.posts().len(), 1);
}

#[tokio::test]
async fn test_update_post() {
    let (app, store) = app();
    let created = app
        .clone()
        .oneshot(submit("POST", "/api/markdown/posts", HELLO))
        .await
        .unwrap();
    let id = json_body(created).await["post"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let doc = "---\ntitle: Hello Again\ntags: [rust]\n---\nno headings\n";
    let response = app
        .oneshot(submit("PUT", &format!("/api/markdown/posts/{}", id), doc))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["post"]["id"], id.as_str());
    assert_eq!(body["post"]["title"], "Hello Again");
    assert_eq!(body["post"]["slug"], "hello-world");
    assert!(body["post"]["expand"]["chapters"].as_array().unwrap().is_empty());
    assert_eq!(store.posts().len(), 1);
}

#[tokio::test]
async fn test_update_missing_post_is_404() {
    let (app, _) = app();
    let response = app
        .oneshot(submit(
            "PUT",
            "/api/markdown/posts/0190f0e4-7b3c-7c2a-9d4e-6f1a2b3c4d5e",
            HELLO,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_malformed_document_is_400() {
    let (app, store) = app();
    let response = app
        .oneshot(submit("POST", "/api/markdown/posts", "just markdown"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
    assert!(store.posts().is_empty());
}

#[tokio::test]
async fn test_degradations_surface_as_warnings() {
    let (app, _) = app();
    let doc = "---\ntitle: Ctx\ncontexts: [nowhere]\n---\n";
    let response = app
        .oneshot(submit("POST", "/api/markdown/posts", doc))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("nowhere"));
}

#[tokio::test]
async fn test_bearer_gate() {
    let store = Arc::new(MemoryStore::new());
    let app = app_with(store.clone(), Some("s3cret"));

    let missing = app
        .clone()
        .oneshot(submit("POST", "/api/markdown/posts", HELLO))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let mut wrong = submit("POST", "/api/markdown/posts", HELLO);
    wrong
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer nope".parse().unwrap());
    assert_eq!(
        app.clone().oneshot(wrong).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );
    assert!(store.posts().is_empty());

    let mut good = submit("POST", "/api/markdown/posts", HELLO);
    good.headers_mut()
        .insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
    assert_eq!(app.clone().oneshot(good).await.unwrap().status(), StatusCode::CREATED);

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_then_serve() {
    let (app, store) = app();
    let boundary = "feedboundary";
    let multipart = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"description\"\r\n\r\n\
         A cat\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"cat pic.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         not-really-png\r\n\
         --{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["file"], "cat_pic.png");
    assert_eq!(body["description"], "A cat");
    assert_eq!(body["media_type"], "image");
    assert_eq!(store.asset_count(), 1);

    let url = body["url"].as_str().unwrap().to_string();
    let served = app
        .clone()
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = axum::body::to_bytes(served.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"not-really-png");

    let wrong_name = url.replace("cat_pic.png", "other.png");
    let missing = app
        .oneshot(Request::builder().uri(&wrong_name).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_without_file_is_400() {
    let (app, _) = app();
    let boundary = "feedboundary";
    let multipart = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"description\"\r\n\r\nx\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(multipart))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
