//! Dual-write orchestration between the relational store and the vector index.
//!
//! Every entry mutation walks the same pipeline:
//!
//! ```text
//! Validating ─▶ RelationalStaged ─▶ EmbeddingGenerated ─▶ IndexWritten ─▶ Committed
//!     │               │                    │                   │              │
//!     └───────────────┴────────────────────┴───────────────────┴──────────────┴─▶ Failed
//! ```
//!
//! The relational change is staged inside an open transaction so a new
//! entry's id is known before the index needs it, and so a failed
//! embedding or index call can still roll the row back. The index call
//! itself is not transactional: once it has landed, a later failure
//! leaves the two stores out of step. For creates the orchestrator issues
//! a best-effort index delete of the new id; update and delete drift is
//! only logged.
//!
//! With [`SyncOptions::embed_before_stage`] the embedding is generated
//! before the transaction is opened, so the transaction no longer spans
//! the embedding round trip.
//!
//! Reads ([`EntryService::list_entries`], [`EntryService::get_entry`]) skip
//! the pipeline entirely.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::embedding::{embed_one, EmbeddingProvider};
use crate::error::{KbError, KbResult};
use crate::index::VectorIndex;
use crate::models::{Category, Entry, VectorRecord};
use crate::store::{Store, StoreTransaction};

/// Pipeline stage of a dual-write request.
///
/// Carried by [`KbError::Downstream`] to name the step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Validating,
    RelationalStaged,
    EmbeddingGenerated,
    IndexWritten,
    Committed,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Validating => "validation",
            SyncStage::RelationalStaged => "relational staging",
            SyncStage::EmbeddingGenerated => "embedding generation",
            SyncStage::IndexWritten => "vector index write",
            SyncStage::Committed => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

/// Tuning knobs for the dual-write pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Generate the embedding before opening the relational transaction.
    pub embed_before_stage: bool,
}

/// Roll back `tx` and hand back `err`. A failed rollback is logged only.
async fn rollback(tx: Box<dyn StoreTransaction>, err: KbError) -> KbError {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "rollback failed");
    }
    err
}

macro_rules! or_rollback {
    ($tx:ident, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => return Err(rollback($tx, err).await),
        }
    };
}

fn stage(op: Operation, stage: SyncStage, category_id: i64, entry_id: Option<i64>) {
    debug!(op = %op, stage = %stage, category_id, entry_id, "dual-write stage reached");
}

fn downstream(stage: SyncStage, source: anyhow::Error) -> KbError {
    KbError::Downstream { stage, source }
}

fn validate_content(content: &str) -> KbResult<()> {
    if content.trim().is_empty() {
        return Err(KbError::Validation("content must not be empty".to_string()));
    }
    Ok(())
}

/// Entry CRUD with the relational row and the vector record kept in step.
#[derive(Clone)]
pub struct EntryService {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    options: SyncOptions,
}

impl EntryService {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    // ============ Categories ============

    pub async fn create_category(&self, name: &str) -> KbResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KbError::Validation(
                "category name must not be empty".to_string(),
            ));
        }
        let category = self
            .store
            .create_category(name)
            .await
            .map_err(KbError::Storage)?;
        info!(category_id = category.id, "created category");
        Ok(category)
    }

    pub async fn list_categories(&self) -> KbResult<Vec<Category>> {
        self.store.list_categories().await.map_err(KbError::Storage)
    }

    pub async fn get_category(&self, category_id: i64) -> KbResult<Category> {
        self.store
            .find_category(category_id)
            .await
            .map_err(KbError::Storage)?
            .ok_or(KbError::CategoryNotFound(category_id))
    }

    // ============ Read path ============

    /// All entries of a category. Fails with `CategoryNotFound` when the
    /// category is absent; an existing category without entries yields an
    /// empty list.
    pub async fn list_entries(&self, category_id: i64) -> KbResult<Vec<Entry>> {
        self.get_category(category_id).await?;
        self.store
            .list_entries(category_id)
            .await
            .map_err(KbError::Storage)
    }

    pub async fn get_entry(&self, category_id: i64, entry_id: i64) -> KbResult<Entry> {
        self.get_category(category_id).await?;
        self.store
            .find_entry(category_id, entry_id)
            .await
            .map_err(KbError::Storage)?
            .ok_or(KbError::EntryNotFound {
                category_id,
                entry_id,
            })
    }

    // ============ Write path ============

    /// Create an entry and its vector record.
    pub async fn create_entry(&self, category_id: i64, content: &str) -> KbResult<Entry> {
        let op = Operation::Create;
        validate_content(content)?;

        let pre_embedded = if self.options.embed_before_stage {
            self.get_category(category_id).await?;
            Some(self.generate_embedding(content).await?)
        } else {
            None
        };

        let mut tx = self.begin().await?;
        stage(op, SyncStage::Validating, category_id, None);
        or_rollback!(tx, require_category(tx.as_mut(), category_id).await);

        let entry = or_rollback!(
            tx,
            tx.insert_entry(category_id, content)
                .await
                .map_err(KbError::Storage)
        );
        stage(op, SyncStage::RelationalStaged, category_id, Some(entry.id));

        let vector = match pre_embedded {
            Some(vector) => vector,
            None => or_rollback!(tx, self.generate_embedding(content).await),
        };
        stage(op, SyncStage::EmbeddingGenerated, category_id, Some(entry.id));

        let record = VectorRecord::for_entry(&entry, vector);
        if let Err(e) = self.index.upsert(&[record]).await {
            // The upsert may have partially landed; clear it while the
            // transaction still holds the id.
            self.compensate_create(&entry).await;
            return Err(rollback(tx, downstream(SyncStage::IndexWritten, e)).await);
        }
        stage(op, SyncStage::IndexWritten, category_id, Some(entry.id));

        if let Err(e) = tx.commit().await {
            self.compensate_create(&entry).await;
            return Err(KbError::Storage(e));
        }
        stage(op, SyncStage::Committed, category_id, Some(entry.id));

        info!(category_id, entry_id = entry.id, "created chatbot entry");
        Ok(entry)
    }

    /// Replace an entry's content and its vector record.
    pub async fn update_entry(
        &self,
        category_id: i64,
        entry_id: i64,
        content: &str,
    ) -> KbResult<Entry> {
        let op = Operation::Update;
        validate_content(content)?;

        let pre_embedded = if self.options.embed_before_stage {
            self.get_entry(category_id, entry_id).await?;
            Some(self.generate_embedding(content).await?)
        } else {
            None
        };

        let mut tx = self.begin().await?;
        stage(op, SyncStage::Validating, category_id, Some(entry_id));
        or_rollback!(tx, require_category(tx.as_mut(), category_id).await);
        let entry = or_rollback!(tx, require_entry(tx.as_mut(), category_id, entry_id).await);

        let updated = or_rollback!(
            tx,
            tx.update_entry(&entry, content)
                .await
                .map_err(KbError::Storage)
        );
        stage(op, SyncStage::RelationalStaged, category_id, Some(entry_id));

        let vector = match pre_embedded {
            Some(vector) => vector,
            None => or_rollback!(tx, self.generate_embedding(content).await),
        };
        stage(op, SyncStage::EmbeddingGenerated, category_id, Some(entry_id));

        let record = VectorRecord::for_entry(&updated, vector);
        if let Err(e) = self.index.upsert(&[record]).await {
            return Err(rollback(tx, downstream(SyncStage::IndexWritten, e)).await);
        }
        stage(op, SyncStage::IndexWritten, category_id, Some(entry_id));

        if let Err(e) = tx.commit().await {
            warn!(
                category_id,
                entry_id,
                error = %e,
                "commit failed after index upsert; vector record holds uncommitted content"
            );
            return Err(KbError::Storage(e));
        }
        stage(op, SyncStage::Committed, category_id, Some(entry_id));

        info!(category_id, entry_id, "updated chatbot entry");
        Ok(updated)
    }

    /// Delete an entry and its vector record.
    pub async fn delete_entry(&self, category_id: i64, entry_id: i64) -> KbResult<()> {
        let op = Operation::Delete;

        let mut tx = self.begin().await?;
        stage(op, SyncStage::Validating, category_id, Some(entry_id));
        or_rollback!(tx, require_category(tx.as_mut(), category_id).await);
        let entry = or_rollback!(tx, require_entry(tx.as_mut(), category_id, entry_id).await);

        or_rollback!(
            tx,
            tx.delete_entry(&entry).await.map_err(KbError::Storage)
        );
        stage(op, SyncStage::RelationalStaged, category_id, Some(entry_id));

        if let Err(e) = self.index.delete(&[entry.index_id()]).await {
            return Err(rollback(tx, downstream(SyncStage::IndexWritten, e)).await);
        }
        stage(op, SyncStage::IndexWritten, category_id, Some(entry_id));

        if let Err(e) = tx.commit().await {
            warn!(
                category_id,
                entry_id,
                error = %e,
                "commit failed after index delete; row remains without a vector record"
            );
            return Err(KbError::Storage(e));
        }
        stage(op, SyncStage::Committed, category_id, Some(entry_id));

        info!(category_id, entry_id, "deleted chatbot entry");
        Ok(())
    }

    async fn begin(&self) -> KbResult<Box<dyn StoreTransaction>> {
        self.store.begin().await.map_err(KbError::Storage)
    }

    async fn generate_embedding(&self, content: &str) -> KbResult<Vec<f32>> {
        embed_one(self.embedder.as_ref(), content)
            .await
            .map_err(|e| downstream(SyncStage::EmbeddingGenerated, e))
    }

    /// Best-effort removal of a record written for an entry that will not
    /// be committed.
    async fn compensate_create(&self, entry: &Entry) {
        if let Err(e) = self.index.delete(&[entry.index_id()]).await {
            warn!(
                entry_id = entry.id,
                index = self.index.name(),
                error = %e,
                "compensating index delete failed; vector record may be orphaned"
            );
        }
    }
}

async fn require_category(tx: &mut dyn StoreTransaction, category_id: i64) -> KbResult<Category> {
    tx.find_category(category_id)
        .await
        .map_err(KbError::Storage)?
        .ok_or(KbError::CategoryNotFound(category_id))
}

async fn require_entry(
    tx: &mut dyn StoreTransaction,
    category_id: i64,
    entry_id: i64,
) -> KbResult<Entry> {
    tx.find_entry(category_id, entry_id)
        .await
        .map_err(KbError::Storage)?
        .ok_or(KbError::EntryNotFound {
            category_id,
            entry_id,
        })
}
