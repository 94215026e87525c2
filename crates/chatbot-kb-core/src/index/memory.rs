//! Process-local [`VectorIndex`] for tests and development.
//!
//! Records live in a `HashMap` keyed by id. Nothing is persisted, so a
//! restart empties the index while the relational rows survive.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::VectorRecord;

use super::VectorIndex;

#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        self.records.read().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored ids in ascending order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .read()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }
}
