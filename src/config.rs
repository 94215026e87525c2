use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use chatbot_kb_core::SyncOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override for the OpenAI or Ollama endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_provider")]
    pub provider: String,
    /// Data-plane host of the Pinecone index (e.g. `https://faq-abc123.svc.pinecone.io`).
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default = "default_index_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            host: None,
            namespace: None,
            max_retries: default_index_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "memory".to_string()
}
fn default_index_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SyncConfig {
    /// Generate embeddings before opening the relational transaction.
    #[serde(default)]
    pub embed_before_stage: bool,
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            embed_before_stage: self.embed_before_stage,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// CORS origins. Empty allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_path: default_base_path(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_base_path() -> String {
    "/api/v1/hr/chatbot".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl IndexConfig {
    /// Whether vector records survive the process that wrote them.
    pub fn is_persistent(&self) -> bool {
        self.provider != "memory"
    }
}

impl Config {
    /// A config with every section defaulted, pointed at `db_path`.
    pub fn minimal(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            sync: SyncConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    // Validate index
    match config.index.provider.as_str() {
        "memory" => {}
        "pinecone" => {
            if config.index.host.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("index.host must be set when provider is 'pinecone'");
            }
        }
        other => anyhow::bail!(
            "Unknown index provider: '{}'. Must be memory or pinecone.",
            other
        ),
    }

    // Validate server
    if !config.server.base_path.is_empty() && !config.server.base_path.starts_with('/') {
        anyhow::bail!("server.base_path must start with '/'");
    }

    match config.logging.format.as_str() {
        "pretty" | "json" => {}
        other => anyhow::bail!("logging.format must be pretty or json, got '{}'", other),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_gets_defaults() {
        let config = parse_config("[db]\npath = \"./data/kb.sqlite\"\n").unwrap();
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.index.provider, "memory");
        assert!(!config.sync.embed_before_stage);
        assert_eq!(config.server.base_path, "/api/v1/hr/chatbot");
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_full_file_parses() {
        let config = parse_config(
            r#"
[db]
path = "/tmp/kb.sqlite"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
dims = 1536
timeout_secs = 10

[index]
provider = "pinecone"
host = "https://faq-abc123.svc.pinecone.io"
namespace = "hr"

[sync]
embed_before_stage = true

[server]
bind = "0.0.0.0:9000"
allowed_origins = []

[logging]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.embedding.dims, Some(1536));
        assert_eq!(config.embedding.timeout_secs, 10);
        assert_eq!(config.index.namespace.as_deref(), Some("hr"));
        assert!(config.sync.options().embed_before_stage);
        assert!(config.server.allowed_origins.is_empty());
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let err = parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        let err = parse_config(
            "[db]\npath = \"x\"\n[embedding]\nprovider = \"ollama\"\ndims = 768\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(parse_config("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[db]\npath = \"x\"\n[index]\nprovider = \"faiss\"\n").is_err());
    }

    #[test]
    fn test_pinecone_requires_host() {
        let err =
            parse_config("[db]\npath = \"x\"\n[index]\nprovider = \"pinecone\"\n").unwrap_err();
        assert!(err.to_string().contains("index.host"));
    }

    #[test]
    fn test_only_memory_index_is_process_local() {
        assert!(!IndexConfig::default().is_persistent());
        let config = parse_config(
            "[db]\npath = \"x\"\n[index]\nprovider = \"pinecone\"\nhost = \"h.pinecone.io\"\n",
        )
        .unwrap();
        assert!(config.index.is_persistent());
    }

    #[test]
    fn test_base_path_must_be_absolute() {
        assert!(parse_config("[db]\npath = \"x\"\n[server]\nbase_path = \"api\"\n").is_err());
    }
}
