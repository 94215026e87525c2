use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Open the configured database, apply the schema, and close the pool.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the category and entry tables. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Create categories table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chatbot_category (
            chatbot_category_seq INTEGER PRIMARY KEY AUTOINCREMENT,
            category_name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create entries table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chatbot (
            chatbot_seq INTEGER PRIMARY KEY AUTOINCREMENT,
            chatbot_category_seq INTEGER NOT NULL,
            chatbot_data TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (chatbot_category_seq) REFERENCES chatbot_category(chatbot_category_seq)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chatbot_category_seq ON chatbot(chatbot_category_seq)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
