use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use chatbot_kb::config::{Config, ServerConfig};
use chatbot_kb::db;
use chatbot_kb::embedding::EmbeddingProvider;
use chatbot_kb::migrate::apply_schema;
use chatbot_kb::server::router;
use chatbot_kb::sqlite_store::SqliteStore;
use chatbot_kb::vector_index::VectorIndex;
use chatbot_kb::EntryService;
use chatbot_kb_core::index::memory::InMemoryIndex;
use chatbot_kb_core::models::VectorRecord;
use chatbot_kb_core::store::Store;

const BASE: &str = "/api/v1/hr/chatbot";

/// Deterministic embedder: byte sums folded into four buckets.
#[derive(Default)]
struct BucketEmbedder {
    fail: AtomicBool,
}

fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 4];
    for (i, b) in text.bytes().enumerate() {
        v[i % 4] += b as f32;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for BucketEmbedder {
    fn model_name(&self) -> &str {
        "bucket-test"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("embedding service unavailable");
        }
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// In-memory index whose writes can be switched to fail.
#[derive(Default)]
struct SwitchableIndex {
    inner: InMemoryIndex,
    fail: AtomicBool,
}

#[async_trait]
impl VectorIndex for SwitchableIndex {
    fn name(&self) -> &str {
        "switchable"
    }
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("index unreachable");
        }
        self.inner.upsert(records).await
    }
    async fn delete(&self, ids: &[String]) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("index unreachable");
        }
        self.inner.delete(ids).await
    }
}

struct TestApp {
    _tmp: TempDir,
    app: Router,
    store: Arc<SqliteStore>,
    embedder: Arc<BucketEmbedder>,
    index: Arc<SwitchableIndex>,
}

impl TestApp {
    async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let config = Config::minimal(tmp.path().join("kb.sqlite"));
        let pool = db::connect(&config).await.unwrap();
        apply_schema(&pool).await.unwrap();

        let store = Arc::new(SqliteStore::new(pool));
        let embedder = Arc::new(BucketEmbedder::default());
        let index = Arc::new(SwitchableIndex::default());
        let service = EntryService::new(store.clone(), embedder.clone(), index.clone());
        let app = router(service, &ServerConfig::default()).unwrap();

        Self {
            _tmp: tmp,
            app,
            store,
            embedder,
            index,
        }
    }

    async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        };
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn add_categories(&self, n: usize) {
        for i in 0..n {
            let (status, _) = self
                .request(
                    "POST",
                    &format!("{}/category", BASE),
                    Some(json!({ "categoryName": format!("cat-{}", i + 1) })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }
    }

    async fn row_count(&self, category_id: i64) -> usize {
        self.store.list_entries(category_id).await.unwrap().len()
    }
}

#[tokio::test]
async fn test_health() {
    let t = TestApp::new().await;
    let (status, body) = t.request("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_category_create_and_list() {
    let t = TestApp::new().await;

    let (status, body) = t
        .request(
            "POST",
            &format!("{}/category", BASE),
            Some(json!({ "categoryName": "Benefits" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);

    let (status, body) = t.request("GET", &format!("{}/category", BASE), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": [{ "id": 1, "name": "Benefits" }] }));
}

#[tokio::test]
async fn test_blank_category_name_rejected() {
    let t = TestApp::new().await;
    let (status, body) = t
        .request(
            "POST",
            &format!("{}/category", BASE),
            Some(json!({ "categoryName": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_empty_category_lists_no_entries() {
    let t = TestApp::new().await;
    t.add_categories(1).await;

    let (status, body) = t
        .request("GET", &format!("{}/category/1/data", BASE), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "data": [] }));
}

#[tokio::test]
async fn test_create_update_delete_scenario() {
    let t = TestApp::new().await;
    t.add_categories(5).await;
    let data = format!("{}/category/5/data", BASE);

    // Create
    let (status, body) = t
        .request("POST", &data, Some(json!({ "chatbotData": "hello" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({ "message": "Chatbot data added successfully.", "id": 1 })
    );
    let record = t.index.inner.get("1").unwrap();
    assert_eq!(record.values, embed_text("hello"));
    assert_eq!(record.metadata["id"], "1");

    let (_, body) = t.request("GET", &data, None).await;
    assert_eq!(body["data"], json!([{ "id": 1, "content": "hello" }]));

    // Update
    let (status, body) = t
        .request(
            "PUT",
            &format!("{}/1", data),
            Some(json!({ "chatbotData": "world" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chatbot data updated successfully.");
    assert!(body.get("id").is_none());
    assert_eq!(t.index.inner.get("1").unwrap().values, embed_text("world"));
    assert_eq!(t.index.inner.len(), 1);

    let (_, body) = t.request("GET", &data, None).await;
    assert_eq!(body["data"], json!([{ "id": 1, "content": "world" }]));

    // Delete
    let (status, body) = t.request("DELETE", &format!("{}/1", data), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chatbot data deleted successfully.");
    assert!(t.index.inner.is_empty());
    assert_eq!(t.row_count(5).await, 0);
}

#[tokio::test]
async fn test_unknown_category_is_404_without_side_effects() {
    let t = TestApp::new().await;

    let (status, body) = t
        .request(
            "POST",
            &format!("{}/category/9/data", BASE),
            Some(json!({ "chatbotData": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["message"], "Chatbot category with ID 9 not found.");
    assert!(t.index.inner.is_empty());

    let (status, _) = t
        .request("GET", &format!("{}/category/9/data", BASE), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_entry_is_404() {
    let t = TestApp::new().await;
    t.add_categories(2).await;
    t.request(
        "POST",
        &format!("{}/category/1/data", BASE),
        Some(json!({ "chatbotData": "hello" })),
    )
    .await;

    // Entry 1 exists, but in category 1, not 2.
    let (status, body) = t
        .request(
            "PUT",
            &format!("{}/category/2/data/1", BASE),
            Some(json!({ "chatbotData": "moved" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["error"]["message"],
        "Chatbot data with ID 1 not found in category 2."
    );

    let (status, _) = t
        .request("DELETE", &format!("{}/category/1/data/99", BASE), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(t.index.inner.get("1").unwrap().values, embed_text("hello"));
}

#[tokio::test]
async fn test_embedding_failure_rolls_back_create() {
    let t = TestApp::new().await;
    t.add_categories(1).await;
    t.embedder.fail.store(true, Ordering::SeqCst);

    let (status, body) = t
        .request(
            "POST",
            &format!("{}/category/1/data", BASE),
            Some(json!({ "chatbotData": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "sync_failed");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Failed to add chatbot data:"), "{}", message);
    assert!(message.contains("embedding service unavailable"));

    assert_eq!(t.row_count(1).await, 0);
    assert!(t.index.inner.is_empty());
}

#[tokio::test]
async fn test_index_failure_keeps_old_content() {
    let t = TestApp::new().await;
    t.add_categories(1).await;
    t.request(
        "POST",
        &format!("{}/category/1/data", BASE),
        Some(json!({ "chatbotData": "hello" })),
    )
    .await;
    t.index.fail.store(true, Ordering::SeqCst);

    let (status, body) = t
        .request(
            "PUT",
            &format!("{}/category/1/data/1", BASE),
            Some(json!({ "chatbotData": "world" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to update chatbot data:"));

    let (status, _) = t
        .request("DELETE", &format!("{}/category/1/data/1", BASE), None)
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let rows = t.store.list_entries(1).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content, "hello");
    assert_eq!(t.index.inner.get("1").unwrap().values, embed_text("hello"));
}

#[tokio::test]
async fn test_bad_requests_use_error_envelope() {
    let t = TestApp::new().await;
    t.add_categories(1).await;

    // Blank content
    let (status, body) = t
        .request(
            "POST",
            &format!("{}/category/1/data", BASE),
            Some(json!({ "chatbotData": "  " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    // Wrong field name
    let (status, body) = t
        .request(
            "POST",
            &format!("{}/category/1/data", BASE),
            Some(json!({ "content": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    // Malformed JSON
    let req = Request::builder()
        .method("POST")
        .uri(format!("{}/category/1/data", BASE))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = t.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    // Non-numeric path parameter
    let (status, body) = t
        .request("GET", &format!("{}/category/abc/data", BASE), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    assert_eq!(t.row_count(1).await, 0);
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let t = TestApp::new().await;
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .header("origin", "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let resp = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );
}

#[tokio::test]
async fn test_custom_base_path() {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path().join("kb.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    apply_schema(&pool).await.unwrap();
    let service = EntryService::new(
        Arc::new(SqliteStore::new(pool)),
        Arc::new(BucketEmbedder::default()),
        Arc::new(InMemoryIndex::new()),
    );
    let server = ServerConfig {
        base_path: "/kb/".to_string(),
        ..ServerConfig::default()
    };
    let app = router(service, &server).unwrap();

    let req = Request::builder()
        .uri("/kb/category")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
