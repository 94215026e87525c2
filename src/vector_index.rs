//! Vector index backends.
//!
//! - **memory**: [`InMemoryIndex`] from the core crate; records live for
//!   the lifetime of the process. Handy for development and tests.
//! - **pinecone**: [`PineconeIndex`], a thin client for the Pinecone
//!   data-plane REST API (`/vectors/upsert`, `/vectors/delete`).
//!
//! Use [`create_index`] to build the backend named in `[index]`.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use chatbot_kb_core::index::memory::InMemoryIndex;
pub use chatbot_kb_core::index::VectorIndex;
use chatbot_kb_core::models::VectorRecord;

use crate::config::IndexConfig;
use crate::retry::send_with_retry;

/// Pinecone data-plane client.
///
/// Authenticates with the `PINECONE_API_KEY` environment variable and
/// writes into `index.namespace` when one is configured.
pub struct PineconeIndex {
    host: String,
    namespace: Option<String>,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow!("PINECONE_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &IndexConfig, api_key: String) -> Result<Self> {
        let host = config
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow!("index.host required for Pinecone provider"))?;

        // The console shows bare hostnames; accept them as https.
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone().filter(|n| !n.is_empty()),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let endpoint = format!("{}{}", self.host, path);
        send_with_retry("Pinecone", self.max_retries, || {
            self.client
                .post(&endpoint)
                .header("Api-Key", &self.api_key)
                .json(body)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        debug!(count = records.len(), "pinecone upsert");
        let body = UpsertRequest {
            vectors: records,
            namespace: self.namespace.as_deref(),
        };
        self.post("/vectors/upsert", &body).await
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        debug!(count = ids.len(), "pinecone delete");
        let body = DeleteRequest {
            ids,
            namespace: self.namespace.as_deref(),
        };
        self.post("/vectors/delete", &body).await
    }
}

/// Create the [`VectorIndex`] named by `config.provider`.
///
/// | Config Value | Backend |
/// |-------------|---------|
/// | `"memory"` | [`InMemoryIndex`] |
/// | `"pinecone"` | [`PineconeIndex`] |
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "memory" => Ok(Arc::new(InMemoryIndex::new())),
        "pinecone" => Ok(Arc::new(PineconeIndex::new(config)?)),
        other => bail!("Unknown index provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    /// Local stand-in for the Pinecone data plane that records each request.
    async fn spawn_mock(status: StatusCode) -> (String, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));

        async fn capture(
            State((seen, status, path)): State<(Seen, StatusCode, &'static str)>,
            headers: HeaderMap,
            Json(body): Json<Value>,
        ) -> StatusCode {
            let key = headers
                .get("Api-Key")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            seen.lock().unwrap().push((path.to_string(), key, body));
            status
        }

        let app = Router::new()
            .route(
                "/vectors/upsert",
                post(capture).with_state((seen.clone(), status, "/vectors/upsert")),
            )
            .route(
                "/vectors/delete",
                post(capture).with_state((seen.clone(), status, "/vectors/delete")),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    fn config(host: &str, namespace: Option<&str>) -> IndexConfig {
        IndexConfig {
            provider: "pinecone".to_string(),
            host: Some(host.to_string()),
            namespace: namespace.map(str::to_string),
            max_retries: 0,
            timeout_secs: 5,
        }
    }

    fn record(id: &str) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values: vec![0.5, 0.25],
            metadata: json!({ "id": id }),
        }
    }

    #[tokio::test]
    async fn test_upsert_sends_vectors_and_namespace() {
        let (host, seen) = spawn_mock(StatusCode::OK).await;
        let index = PineconeIndex::with_api_key(&config(&host, Some("hr")), "pc-key".into()).unwrap();

        index.upsert(&[record("7")]).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (path, key, body) = &seen[0];
        assert_eq!(path, "/vectors/upsert");
        assert_eq!(key.as_deref(), Some("pc-key"));
        assert_eq!(body["namespace"], "hr");
        assert_eq!(body["vectors"][0]["id"], "7");
        assert_eq!(body["vectors"][0]["values"], json!([0.5, 0.25]));
        assert_eq!(body["vectors"][0]["metadata"]["id"], "7");
    }

    #[tokio::test]
    async fn test_delete_omits_empty_namespace() {
        let (host, seen) = spawn_mock(StatusCode::OK).await;
        let index = PineconeIndex::with_api_key(&config(&host, None), "pc-key".into()).unwrap();

        index.delete(&["7".to_string(), "8".to_string()]).await.unwrap();

        let seen = seen.lock().unwrap();
        let (path, _, body) = &seen[0];
        assert_eq!(path, "/vectors/delete");
        assert_eq!(body["ids"], json!(["7", "8"]));
        assert!(body.get("namespace").is_none());
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let (host, seen) = spawn_mock(StatusCode::BAD_REQUEST).await;
        let mut cfg = config(&host, None);
        cfg.max_retries = 3;
        let index = PineconeIndex::with_api_key(&cfg, "pc-key".into()).unwrap();

        let err = index.upsert(&[record("1")]).await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batches_skip_the_network() {
        let index =
            PineconeIndex::with_api_key(&config("http://127.0.0.1:9", None), "k".into()).unwrap();
        index.upsert(&[]).await.unwrap();
        index.delete(&[]).await.unwrap();
    }

    #[test]
    fn test_bare_host_gets_https() {
        let index = PineconeIndex::with_api_key(
            &config("faq-abc123.svc.pinecone.io/", None),
            "k".into(),
        )
        .unwrap();
        assert_eq!(index.host, "https://faq-abc123.svc.pinecone.io");
    }

    #[test]
    fn test_factory_defaults_to_memory() {
        let index = create_index(&IndexConfig::default()).unwrap();
        assert_eq!(index.name(), "memory");
    }
}
