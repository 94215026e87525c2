//! In-memory [`Store`] implementation for testing and development.
//!
//! Tables live in `BTreeMap`s behind a `std::sync::RwLock`. A transaction
//! keeps its writes in a private overlay and applies them in one step on
//! commit; rollback just drops the overlay. Ids come from per-table
//! counters and, like a database sequence, are not handed back on rollback.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Category, Entry};

use super::{Store, StoreTransaction};

#[derive(Default)]
struct Tables {
    categories: BTreeMap<i64, Category>,
    entries: BTreeMap<i64, Entry>,
    last_category_id: i64,
    last_entry_id: i64,
}

fn read(tables: &RwLock<Tables>) -> Result<RwLockReadGuard<'_, Tables>> {
    tables.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write(tables: &RwLock<Tables>) -> Result<RwLockWriteGuard<'_, Tables>> {
    tables.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// In-memory store for tests and local development.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a category under a fixed id, moving the id counter past it.
    pub fn seed_category(&self, id: i64, name: &str) -> Result<Category> {
        let mut tables = write(&self.tables)?;
        let category = Category {
            id,
            name: name.to_string(),
            created_at: now(),
        };
        tables.categories.insert(id, category.clone());
        tables.last_category_id = tables.last_category_id.max(id);
        Ok(category)
    }

    /// Number of committed entries across all categories.
    pub fn entry_count(&self) -> Result<usize> {
        Ok(read(&self.tables)?.entries.len())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_category(&self, name: &str) -> Result<Category> {
        let mut tables = write(&self.tables)?;
        tables.last_category_id += 1;
        let category = Category {
            id: tables.last_category_id,
            name: name.to_string(),
            created_at: now(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(read(&self.tables)?.categories.values().cloned().collect())
    }

    async fn find_category(&self, category_id: i64) -> Result<Option<Category>> {
        Ok(read(&self.tables)?.categories.get(&category_id).cloned())
    }

    async fn list_entries(&self, category_id: i64) -> Result<Vec<Entry>> {
        Ok(read(&self.tables)?
            .entries
            .values()
            .filter(|e| e.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn find_entry(&self, category_id: i64, entry_id: i64) -> Result<Option<Entry>> {
        Ok(read(&self.tables)?
            .entries
            .get(&entry_id)
            .filter(|e| e.category_id == category_id)
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            tables: self.tables.clone(),
            staged: BTreeMap::new(),
        }))
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// `staged` maps entry id to its pending state: `Some` for an insert or
/// update, `None` for a delete.
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    staged: BTreeMap<i64, Option<Entry>>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_category(&mut self, category_id: i64) -> Result<Option<Category>> {
        Ok(read(&self.tables)?.categories.get(&category_id).cloned())
    }

    async fn find_entry(&mut self, category_id: i64, entry_id: i64) -> Result<Option<Entry>> {
        let entry = match self.staged.get(&entry_id) {
            Some(pending) => pending.clone(),
            None => read(&self.tables)?.entries.get(&entry_id).cloned(),
        };
        Ok(entry.filter(|e| e.category_id == category_id))
    }

    async fn insert_entry(&mut self, category_id: i64, content: &str) -> Result<Entry> {
        let id = {
            let mut tables = write(&self.tables)?;
            if !tables.categories.contains_key(&category_id) {
                anyhow::bail!("FOREIGN KEY constraint failed: category {}", category_id);
            }
            tables.last_entry_id += 1;
            tables.last_entry_id
        };
        let ts = now();
        let entry = Entry {
            id,
            category_id,
            content: content.to_string(),
            created_at: ts,
            updated_at: ts,
        };
        self.staged.insert(id, Some(entry.clone()));
        Ok(entry)
    }

    async fn update_entry(&mut self, entry: &Entry, content: &str) -> Result<Entry> {
        let updated = Entry {
            content: content.to_string(),
            updated_at: now(),
            ..entry.clone()
        };
        self.staged.insert(entry.id, Some(updated.clone()));
        Ok(updated)
    }

    async fn delete_entry(&mut self, entry: &Entry) -> Result<()> {
        self.staged.insert(entry.id, None);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut tables = write(&this.tables)?;
        for (id, pending) in this.staged {
            match pending {
                Some(entry) => {
                    tables.entries.insert(id, entry);
                }
                None => {
                    tables.entries.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
