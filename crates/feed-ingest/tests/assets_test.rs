//! Asset rewriting against a mock HTTP server and temporary directories.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use feed_core::{MediaType, Repositories};
use feed_db::MemoryStore;
use feed_ingest::{
    AssetResolver, Degradation, IngestConfig, LocalAccess, PostIngestor, Submission,
};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: [u8; 16] = [
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

async fn serve_png(server: &MockServer, at: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG.to_vec()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_remote_reference_rewritten_with_title() {
    let server = MockServer::start().await;
    serve_png(&server, "/x.png").await;

    let store = MemoryStore::new();
    let resolver = AssetResolver::new(&IngestConfig::default()).unwrap();
    let body = format!("Intro\n\n![alt]({}/x.png \"t\")\n", server.uri());

    let outcome = resolver.rewrite(&body, &store).await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.assets.len(), 1);
    let asset = &outcome.assets[0];
    assert_eq!(asset.description, "alt - t");
    assert_eq!(asset.file, "x.png");
    assert_eq!(asset.media_type, MediaType::Image);
    assert_eq!(asset.content_type, "image/png");
    assert_eq!(asset.source_url.as_deref(), Some(format!("{}/x.png", server.uri()).as_str()));
    assert_eq!(
        outcome.body,
        format!("Intro\n\n![alt](/api/files/uploads/{}/x.png \"t\")\n", asset.id)
    );

    let again = resolver.rewrite(&outcome.body, &store).await;
    assert_eq!(again.body, outcome.body);
    assert!(again.assets.is_empty());
    assert_eq!(again.skipped, 1);
    assert_eq!(store.asset_count(), 1);
}

#[tokio::test]
async fn test_fetch_sends_accept_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pic"))
        .and(header_exists("accept"))
        .and(header(
            "user-agent",
            "Mozilla/5.0 (compatible; Feed-Ingest/1.0)",
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let resolver = AssetResolver::new(&IngestConfig::default()).unwrap();
    let outcome = resolver
        .rewrite(&format!("![]({}/pic)", server.uri()), &store)
        .await;

    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(outcome.assets[0].file, "pic.jpg");
    assert_eq!(outcome.assets[0].description, "Embedded asset");
}

#[tokio::test]
async fn test_content_disposition_names_the_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=\"holiday clip.mp4\"")
                .set_body_bytes(b"not really a video".to_vec()),
        )
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let resolver = AssetResolver::new(&IngestConfig::default()).unwrap();
    let outcome = resolver
        .rewrite(&format!("![clip]({}/download)", server.uri()), &store)
        .await;

    assert_eq!(outcome.assets[0].file, "holiday_clip.mp4");
    assert_eq!(outcome.assets[0].media_type, MediaType::Video);
}

#[tokio::test]
async fn test_failed_fetch_leaves_reference_and_continues() {
    let server = MockServer::start().await;
    serve_png(&server, "/ok.png").await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    let resolver = AssetResolver::new(&IngestConfig::default()).unwrap();
    let gone = format!("![a]({}/gone.png)", server.uri());
    let body = format!("{}\n![b]({}/ok.png)", gone, server.uri());

    let outcome = resolver.rewrite(&body, &store).await;

    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].reason.contains("404"));
    assert_eq!(outcome.assets.len(), 1);
    assert!(outcome.body.starts_with(&gone));
    assert!(outcome.body.contains("/api/files/uploads/"));
}

#[tokio::test]
async fn test_oversized_asset_fails() {
    let server = MockServer::start().await;
    serve_png(&server, "/big.png").await;

    let store = MemoryStore::new();
    let config = IngestConfig::default().with_max_asset_bytes(4);
    let resolver = AssetResolver::new(&config).unwrap();
    let outcome = resolver
        .rewrite(&format!("![]({}/big.png)", server.uri()), &store)
        .await;

    assert!(outcome.assets.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(store.asset_count(), 0);
}

/// Serve one response with a chunked body and no Content-Length.
async fn serve_chunked_once(chunks: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;

        let mut response =
            b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nTransfer-Encoding: chunked\r\n\r\n"
                .to_vec();
        for chunk in chunks {
            response.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            response.extend_from_slice(&chunk);
            response.extend_from_slice(b"\r\n");
        }
        response.extend_from_slice(b"0\r\n\r\n");
        let _ = socket.write_all(&response).await;
        let _ = socket.shutdown().await;
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_oversized_chunked_asset_fails() {
    let base = serve_chunked_once(vec![PNG.to_vec(), PNG.to_vec(), PNG.to_vec()]).await;

    let store = MemoryStore::new();
    let config = IngestConfig::default().with_max_asset_bytes(20);
    let resolver = AssetResolver::new(&config).unwrap();
    let outcome = resolver
        .rewrite(&format!("![]({}/stream.png)", base), &store)
        .await;

    assert!(outcome.assets.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].reason.contains("limit is 20"));
    assert_eq!(store.asset_count(), 0);
}

#[tokio::test]
async fn test_chunked_asset_within_limit_is_stored() {
    let base = serve_chunked_once(vec![PNG[..8].to_vec(), PNG[8..].to_vec()]).await;

    let store = MemoryStore::new();
    let resolver = AssetResolver::new(&IngestConfig::default()).unwrap();
    let outcome = resolver
        .rewrite(&format!("![]({}/stream.png)", base), &store)
        .await;

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(outcome.assets[0].size_bytes, PNG.len() as i64);
}

#[tokio::test]
async fn test_percent_encoded_filename_is_decoded() {
    let server = MockServer::start().await;
    serve_png(&server, "/my%20pic.png").await;

    let store = MemoryStore::new();
    let resolver = AssetResolver::new(&IngestConfig::default()).unwrap();
    let outcome = resolver
        .rewrite(&format!("![]({}/my%20pic.png)", server.uri()), &store)
        .await;

    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(outcome.assets[0].file, "my_pic.png");
}

#[tokio::test]
async fn test_repeated_snippet_gets_one_asset_each() {
    let server = MockServer::start().await;
    serve_png(&server, "/dup.png").await;

    let store = MemoryStore::new();
    let resolver = AssetResolver::new(&IngestConfig::default()).unwrap();
    let snippet = format!("![d]({}/dup.png)", server.uri());
    let outcome = resolver
        .rewrite(&format!("{} and {}", snippet, snippet), &store)
        .await;

    assert_eq!(outcome.assets.len(), 2);
    assert!(!outcome.body.contains(&server.uri()));
    assert!(outcome.body.contains(&outcome.assets[0].id.to_string()));
    assert!(outcome.body.contains(&outcome.assets[1].id.to_string()));
}

#[tokio::test]
async fn test_local_roots() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("pic.png"), PNG).unwrap();
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("secret.png"), PNG).unwrap();

    let store = MemoryStore::new();
    let config = IngestConfig::default().with_local_access(LocalAccess::roots([root.path()]));
    let resolver = AssetResolver::new(&config).unwrap();
    let secret = format!("![s]({})", outside.path().join("secret.png").display());
    let body = format!("![p](pic.png)\n{}", secret);

    let outcome = resolver.rewrite(&body, &store).await;

    assert_eq!(outcome.assets.len(), 1);
    assert_eq!(outcome.assets[0].file, "pic.png");
    assert_eq!(outcome.assets[0].source_url, None);
    assert_eq!(outcome.skipped, 1);
    assert!(outcome.body.ends_with(&secret));
}

#[tokio::test]
async fn test_local_disabled_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("pic.png");
    std::fs::write(&file, PNG).unwrap();

    let store = MemoryStore::new();
    let resolver = AssetResolver::new(&IngestConfig::default()).unwrap();
    let body = format!("![p]({})", file.display());
    let outcome = resolver.rewrite(&body, &store).await;

    assert_eq!(outcome.body, body);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(store.asset_count(), 0);
}

#[tokio::test]
async fn test_pipeline_links_uploads_and_featured_image() {
    let server = MockServer::start().await;
    serve_png(&server, "/body.png").await;
    serve_png(&server, "/cover.png").await;

    let store = Arc::new(MemoryStore::new());
    let ingestor =
        PostIngestor::new(Repositories::from_store(store.clone()), IngestConfig::default())
            .unwrap();
    let doc = format!(
        "---\ntitle: Gallery\nfeatured_image: \"{uri}/cover.png\"\n---\n![b]({uri}/body.png)\n",
        uri = server.uri()
    );

    let outcome = ingestor
        .submit(doc.as_bytes(), Submission::Create)
        .await
        .unwrap();

    let post = &outcome.post;
    assert_eq!(outcome.report.assets_created, 2);
    assert_eq!(post.post.uploads.len(), 2);
    assert_eq!(post.expand.uploads.len(), 2);
    let featured = post.expand.featured_image.as_ref().expect("featured image set");
    assert_eq!(post.post.featured_image, Some(featured.id));
    assert_eq!(featured.description, "Featured image");
    assert!(post.post.content.contains("/api/files/uploads/"));

    let featured_url = featured.url();
    let doc = format!("---\ntitle: Gallery\nfeaturedImage: {}\n---\n", featured_url);
    let again = ingestor
        .submit(doc.as_bytes(), Submission::Update(post.post.id))
        .await
        .unwrap();
    assert_eq!(again.post.post.featured_image, Some(featured.id));
    assert_eq!(again.report.assets_created, 0);
    assert_eq!(again.post.post.uploads.len(), 2);
    assert_eq!(store.asset_count(), 2);
}

#[tokio::test]
async fn test_pipeline_reports_asset_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let ingestor =
        PostIngestor::new(Repositories::from_store(store.clone()), IngestConfig::default())
            .unwrap();
    let reference = format!("{}/broken.png", server.uri());
    let doc = format!("---\ntitle: Broken\n---\n![x]({})", reference);

    let outcome = ingestor
        .submit(doc.as_bytes(), Submission::Create)
        .await
        .unwrap();

    assert_eq!(outcome.post.post.content, format!("![x]({})", reference));
    assert!(matches!(
        outcome.report.degradations.as_slice(),
        [Degradation::AssetFetch { reference: r, .. }] if *r == reference
    ));
    assert!(outcome.post.post.uploads.is_empty());
}
