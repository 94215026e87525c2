//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] and [`StoreTransaction`] operation onto the
//! `chatbot_category` and `chatbot` tables created by [`crate::migrate`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use chatbot_kb_core::models::{Category, Entry};
use chatbot_kb_core::store::{Store, StoreTransaction};

const CATEGORY_COLUMNS: &str = "chatbot_category_seq, category_name, created_at";
const ENTRY_COLUMNS: &str =
    "chatbot_seq, chatbot_category_seq, chatbot_data, created_at, updated_at";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn category_from_row(row: &SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.try_get("chatbot_category_seq")?,
        name: row.try_get("category_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn entry_from_row(row: &SqliteRow) -> Result<Entry> {
    Ok(Entry {
        id: row.try_get("chatbot_seq")?,
        category_id: row.try_get("chatbot_category_seq")?,
        content: row.try_get("chatbot_data")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_category(&self, name: &str) -> Result<Category> {
        let created_at = now();
        let result =
            sqlx::query("INSERT INTO chatbot_category (category_name, created_at) VALUES (?, ?)")
                .bind(name)
                .bind(created_at)
                .execute(&self.pool)
                .await?;

        Ok(Category {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            created_at,
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chatbot_category ORDER BY chatbot_category_seq",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(category_from_row).collect()
    }

    async fn find_category(&self, category_id: i64) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chatbot_category WHERE chatbot_category_seq = ?",
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(category_from_row).transpose()
    }

    async fn list_entries(&self, category_id: i64) -> Result<Vec<Entry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chatbot WHERE chatbot_category_seq = ? ORDER BY chatbot_seq",
            ENTRY_COLUMNS
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn find_entry(&self, category_id: i64, entry_id: i64) -> Result<Option<Entry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chatbot WHERE chatbot_seq = ? AND chatbot_category_seq = ?",
            ENTRY_COLUMNS
        ))
        .bind(entry_id)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    /// Opens with `BEGIN IMMEDIATE`: the write lock is held from the first
    /// statement, so competing writers wait on `busy_timeout` instead of
    /// failing the read-to-write upgrade with `SQLITE_BUSY`.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

/// An open SQLite transaction. Dropped without commit, sqlx rolls it back.
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn find_category(&mut self, category_id: i64) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chatbot_category WHERE chatbot_category_seq = ?",
            CATEGORY_COLUMNS
        ))
        .bind(category_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(category_from_row).transpose()
    }

    async fn find_entry(&mut self, category_id: i64, entry_id: i64) -> Result<Option<Entry>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chatbot WHERE chatbot_seq = ? AND chatbot_category_seq = ?",
            ENTRY_COLUMNS
        ))
        .bind(entry_id)
        .bind(category_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn insert_entry(&mut self, category_id: i64, content: &str) -> Result<Entry> {
        let ts = now();
        let result = sqlx::query(
            "INSERT INTO chatbot (chatbot_category_seq, chatbot_data, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(category_id)
        .bind(content)
        .bind(ts)
        .bind(ts)
        .execute(&mut *self.tx)
        .await?;

        Ok(Entry {
            id: result.last_insert_rowid(),
            category_id,
            content: content.to_string(),
            created_at: ts,
            updated_at: ts,
        })
    }

    async fn update_entry(&mut self, entry: &Entry, content: &str) -> Result<Entry> {
        let ts = now();
        let result = sqlx::query(
            "UPDATE chatbot SET chatbot_data = ?, updated_at = ? WHERE chatbot_seq = ? AND chatbot_category_seq = ?",
        )
        .bind(content)
        .bind(ts)
        .bind(entry.id)
        .bind(entry.category_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            anyhow::bail!("chatbot row {} vanished during update", entry.id);
        }

        Ok(Entry {
            content: content.to_string(),
            updated_at: ts,
            ..entry.clone()
        })
    }

    async fn delete_entry(&mut self, entry: &Entry) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM chatbot WHERE chatbot_seq = ? AND chatbot_category_seq = ?")
                .bind(entry.id)
                .bind(entry.category_id)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() != 1 {
            anyhow::bail!("chatbot row {} vanished during delete", entry.id);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.tx.rollback().await?;
        Ok(())
    }
}
