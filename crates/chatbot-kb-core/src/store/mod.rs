//! Relational storage abstraction.
//!
//! The [`Store`] trait covers plain reads and category management; every
//! entry mutation goes through a [`StoreTransaction`] obtained from
//! [`Store::begin`], so the orchestrator can stage a change, call the
//! external services, and then commit or roll back.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Category, Entry};

/// Abstract relational backend for categories and entries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_category`](Store::create_category) | Insert a category |
/// | [`list_categories`](Store::list_categories) | All categories, by id |
/// | [`find_category`](Store::find_category) | Category existence check |
/// | [`list_entries`](Store::list_entries) | Entries of one category |
/// | [`find_entry`](Store::find_entry) | One entry within a category |
/// | [`begin`](Store::begin) | Open a transaction for entry mutations |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new category and return it with its assigned id.
    async fn create_category(&self, name: &str) -> Result<Category>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn find_category(&self, category_id: i64) -> Result<Option<Category>>;

    /// Entries of a category. Order is not part of the contract; both
    /// backends return id order.
    async fn list_entries(&self, category_id: i64) -> Result<Vec<Entry>>;

    async fn find_entry(&self, category_id: i64, entry_id: i64) -> Result<Option<Entry>>;

    /// Open a transaction. Nothing written through it is visible to other
    /// readers until [`StoreTransaction::commit`].
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// An open relational transaction scoped to one request.
///
/// Reads through the transaction observe its own staged writes. Dropping
/// a transaction without committing discards it.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_category(&mut self, category_id: i64) -> Result<Option<Category>>;

    async fn find_entry(&mut self, category_id: i64, entry_id: i64) -> Result<Option<Entry>>;

    /// Stage a new entry. The returned entry carries its assigned id.
    async fn insert_entry(&mut self, category_id: i64, content: &str) -> Result<Entry>;

    /// Stage a content change and return the updated entry.
    async fn update_entry(&mut self, entry: &Entry, content: &str) -> Result<Entry>;

    async fn delete_entry(&mut self, entry: &Entry) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
