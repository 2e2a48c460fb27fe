//! End-to-end tests for the upload and retrieval pipeline
//!
//! Drives the real router through `axum_test::TestServer` with a counting
//! in-memory object store, plus a throwaway local HTTP server standing in
//! for remote image hosts in URL-list mode.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::routing::get;
use axum::Router;
use axum_test::TestServer;
use bytes::Bytes;
use tokio::sync::RwLock;

use image_vault::cache::ResponseCache;
use image_vault::config::Config;
use image_vault::errors::StorageError;
use image_vault::models::{ObjectMeta, StoredObject, UploadResultEntry};
use image_vault::services::IngestService;
use image_vault::storage::{compute_etag, ObjectStore};
use image_vault::web::{create_router, AppState};

const API_KEY: &str = "test-secret";
const BASE_URL: &str = "http://pics.example.com";
const BOUNDARY: &str = "vault-test-boundary";
const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x01, 0x02, 0x03,
];

/// In-memory object store with operation counters and a read-failure switch
#[derive(Default)]
struct MemoryStore {
    objects: RwLock<HashMap<String, (Bytes, ObjectMeta)>>,
    puts: AtomicUsize,
    gets: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<ObjectMeta, StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            etag: compute_etag(&body),
            size: body.len() as u64,
            stored_at: chrono::Utc::now(),
        };
        self.objects
            .write()
            .await
            .insert(key.to_string(), (body, meta.clone()));
        Ok(meta)
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::metadata(key, "simulated backend outage"));
        }
        Ok(self
            .objects
            .read()
            .await
            .get(key)
            .map(|(body, meta)| StoredObject {
                key: key.to_string(),
                body: body.clone(),
                meta: meta.clone(),
            }))
    }
}

fn test_state(store: Arc<MemoryStore>) -> AppState {
    let mut config = Config::default();
    config.web.base_url = BASE_URL.to_string();
    config.auth.api_key = API_KEY.to_string();

    let store: Arc<dyn ObjectStore> = store;
    let cache = Arc::new(ResponseCache::new(config.cache.max_age));
    let ingest = Arc::new(
        IngestService::new(store.clone(), &config.web.base_url, Duration::from_secs(5))
            .expect("ingest service"),
    );

    AppState {
        config: Arc::new(config),
        store,
        cache,
        ingest,
    }
}

fn test_server(state: AppState) -> TestServer {
    TestServer::new(create_router(state)).expect("test server")
}

fn api_key_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static(API_KEY),
    )
}

/// Hand-rolled multipart body with one `files` part per input tuple
fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (file_name, content_type, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"files\"; filename=\"{file_name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Serve fixed bytes as image/png on /a.png from an ephemeral local port.
async fn spawn_upstream() -> std::net::SocketAddr {
    let app = Router::new().route(
        "/a.png",
        get(|| async { ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("upstream serve");
    });
    addr
}

#[tokio::test]
async fn test_upload_without_api_key_is_rejected() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store.clone()));

    let response = server
        .put("/upload")
        .json(&serde_json::json!(["http://example.com/a.png"]))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.text(), "Unauthorized");
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_upload_with_wrong_api_key_is_rejected() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store.clone()));

    let response = server
        .put("/upload")
        .add_header(
            HeaderName::from_static("x-api-key"),
            HeaderValue::from_static("not-the-secret"),
        )
        .json(&serde_json::json!(["http://example.com/a.png"]))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_upload_with_unsupported_content_type_is_rejected() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store.clone()));

    let (name, value) = api_key_header();
    let response = server
        .put("/upload")
        .add_header(name, value)
        .content_type("text/plain")
        .bytes(Bytes::from_static(b"hello"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Invalid content type");
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_multipart_upload_maps_each_part() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store.clone()));

    let parts: &[(&str, &str, &[u8])] = &[
        ("a.png", "image/png", PNG_BYTES),
        ("b.jpg", "image/jpeg", b"jpegdata"),
    ];
    let (name, value) = api_key_header();
    let response = server
        .put("/upload")
        .add_header(name, value)
        .content_type(&multipart_content_type())
        .bytes(multipart_body(parts).into())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let results: BTreeMap<String, UploadResultEntry> = response.json();

    assert_eq!(results.len(), 2);
    assert_eq!(store.put_count(), 2);

    let png = &results["a.png"];
    assert_eq!(png.content_type, "image/png");
    assert_eq!(png.etag, compute_etag(PNG_BYTES));
    assert!(png.path.starts_with(&format!("{BASE_URL}/images/")));
    assert!(png.path.ends_with(".png"));

    let jpg = &results["b.jpg"];
    assert_eq!(jpg.content_type, "image/jpeg");
    assert!(jpg.path.ends_with(".jpeg"));
}

#[tokio::test]
async fn test_multipart_with_non_image_part_writes_nothing() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store.clone()));

    let parts: &[(&str, &str, &[u8])] = &[
        ("a.png", "image/png", PNG_BYTES),
        ("notes.txt", "text/plain", b"not an image"),
    ];
    let (name, value) = api_key_header();
    let response = server
        .put("/upload")
        .add_header(name, value)
        .content_type(&multipart_content_type())
        .bytes(multipart_body(parts).into())
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "Invalid file type");
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_url_list_ingestion_and_round_trip() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state(store.clone());
    let cache = state.cache.clone();
    let server = test_server(state);

    let upstream = spawn_upstream().await;
    let image_url = format!("http://{upstream}/a.png");

    let (name, value) = api_key_header();
    let response = server
        .put("/upload")
        .add_header(name, value)
        .json(&serde_json::json!([image_url.clone()]))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let results: BTreeMap<String, UploadResultEntry> = response.json();
    assert_eq!(results.len(), 1);

    let entry = &results[&image_url];
    assert_eq!(entry.content_type, "image/png");
    assert_eq!(entry.etag, compute_etag(PNG_BYTES));
    assert!(entry.path.starts_with(&format!("{BASE_URL}/images/")));
    assert!(entry.path.ends_with(".png"));

    // Serve the object back under the returned key
    let key = entry.path.rsplit('/').next().unwrap();
    let image_response = server.get(&format!("/images/{key}")).await;

    assert_eq!(image_response.status_code(), StatusCode::OK);
    assert_eq!(image_response.as_bytes().as_ref(), PNG_BYTES);

    let headers = image_response.headers();
    assert_eq!(
        headers.get("etag").and_then(|v| v.to_str().ok()),
        Some(entry.etag.as_str())
    );
    assert_eq!(
        headers.get("content-type").and_then(|v| v.to_str().ok()),
        Some("image/png")
    );
    assert_eq!(
        headers.get("cache-control").and_then(|v| v.to_str().ok()),
        Some("s-maxage=3600")
    );

    // The write-back is async; wait for the entry to land
    for _ in 0..100 {
        if cache.stats().await.entries > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(cache.stats().await.entries, 1);

    // Second read must come from the cache: the store is now failing and
    // its read counter must not move
    let reads_after_first = store.get_count();
    assert_eq!(reads_after_first, 1);
    store.set_fail_reads(true);

    let cached_response = server.get(&format!("/images/{key}")).await;
    assert_eq!(cached_response.status_code(), StatusCode::OK);
    assert_eq!(cached_response.as_bytes().as_ref(), PNG_BYTES);
    assert_eq!(store.get_count(), reads_after_first);
}

#[tokio::test]
async fn test_url_list_failure_aborts_without_rollback() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store.clone()));

    let upstream = spawn_upstream().await;
    let good_url = format!("http://{upstream}/a.png");
    let bad_url = format!("http://{upstream}/missing.png");

    let (name, value) = api_key_header();
    let response = server
        .put("/upload")
        .add_header(name, value)
        .json(&serde_json::json!([good_url, bad_url]))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    assert!(response.text().contains("missing.png"));
    // The first item was already written when the second failed
    assert_eq!(store.put_count(), 1);
}

#[tokio::test]
async fn test_retrieving_missing_object_returns_not_found() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store));

    let response = server.get("/images/doesnotexist.png").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.text(), "Object Not Found");
}

#[tokio::test]
async fn test_unknown_route_returns_not_found() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store));

    let response = server.get("/foo").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert!(response.text().contains("not found"));
}

#[tokio::test]
async fn test_success_responses_carry_cors_headers() {
    let store = Arc::new(MemoryStore::default());
    let server = test_server(test_state(store));

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("origin"),
            HeaderValue::from_static("http://app.example.org"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
