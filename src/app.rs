//! Wiring from [`Config`] to a ready [`EntryService`].

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

use chatbot_kb_core::EntryService;

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::migrate::apply_schema;
use crate::sqlite_store::SqliteStore;
use crate::vector_index::create_index;

/// Open the database, ensure the schema, and build the configured
/// embedding provider and vector index.
pub async fn build_service(config: &Config) -> Result<EntryService> {
    let pool = db::connect(config).await?;
    apply_schema(&pool)
        .await
        .context("Failed to apply database schema")?;

    let embedder = create_provider(&config.embedding)?;
    let index = create_index(&config.index)?;

    let embedding = embedder.model_name().to_string();
    let index_name = index.name().to_string();
    let service = EntryService::new(Arc::new(SqliteStore::new(pool)), embedder, index)
        .with_options(config.sync.options());

    info!(
        db = %config.db.path.display(),
        embedding = %embedding,
        index = %index_name,
        embed_before_stage = service.options().embed_before_stage,
        "knowledge base ready"
    );

    Ok(service)
}

/// Like [`build_service`], for one-shot commands that change entries.
///
/// Refuses a process-local index: the row would be committed while its
/// vector record disappears when the command exits.
pub async fn build_writable_service(config: &Config) -> Result<EntryService> {
    if !config.index.is_persistent() {
        bail!(
            "index.provider = \"{}\" does not outlive this command, so the entry's vector \
             record would be lost. Configure a persistent index \
             (e.g. pinecone) before changing entries from the CLI.",
            config.index.provider
        );
    }
    build_service(config).await
}
