use anyhow::Result;

use crate::app::build_service;
use crate::config::Config;

pub async fn run_category_add(config: &Config, name: &str) -> Result<()> {
    let service = build_service(config).await?;
    let category = service.create_category(name).await?;
    println!("Created category {} ({})", category.id, category.name);
    Ok(())
}

pub async fn run_category_list(config: &Config) -> Result<()> {
    let service = build_service(config).await?;
    let categories = service.list_categories().await?;

    if categories.is_empty() {
        println!("No categories.");
        return Ok(());
    }

    println!("{:<8} {:<32} CREATED", "ID", "NAME");
    for category in categories {
        println!(
            "{:<8} {:<32} {}",
            category.id,
            category.name,
            format_ts(category.created_at)
        );
    }
    Ok(())
}

/// Unix seconds as an RFC 3339 UTC timestamp.
pub(crate) fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
