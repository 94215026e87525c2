//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the narrow contract the orchestrator needs
//! from an external vector store: upsert records by id and delete by id.
//! Neither call participates in the relational transaction.

pub mod memory;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::VectorRecord;

/// Trait for vector index backends.
///
/// Implementations must:
/// - overwrite an existing record when upserting the same id
/// - treat deleting an unknown id as success
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs (e.g. `"memory"`, `"pinecone"`).
    fn name(&self) -> &str;

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    async fn delete(&self, ids: &[String]) -> Result<()>;
}

/// Zip parallel id, vector and metadata sequences into records.
///
/// The three sequences correspond by position, so their lengths must
/// match exactly.
pub fn build_records(
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
    metadata: Vec<Value>,
) -> Result<Vec<VectorRecord>> {
    if ids.len() != vectors.len() || ids.len() != metadata.len() {
        bail!(
            "Mismatched upsert batch: {} ids, {} vectors, {} metadata",
            ids.len(),
            vectors.len(),
            metadata.len()
        );
    }
    Ok(ids
        .into_iter()
        .zip(vectors)
        .zip(metadata)
        .map(|((id, values), metadata)| VectorRecord {
            id,
            values,
            metadata,
        })
        .collect())
}
