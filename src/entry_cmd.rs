//! `kb entry` subcommands.
//!
//! Mutations run through the same dual-write pipeline as the HTTP API, so
//! a failed embedding or index write leaves no row behind. They refuse to
//! run against the process-local `memory` index.

use anyhow::Result;

use crate::app::{build_service, build_writable_service};
use crate::category_cmd::format_ts;
use crate::config::Config;

pub async fn run_entry_list(config: &Config, category_id: i64) -> Result<()> {
    let service = build_service(config).await?;
    let entries = service.list_entries(category_id).await?;

    if entries.is_empty() {
        println!("No entries in category {}.", category_id);
        return Ok(());
    }

    println!("{:<8} {:<22} CONTENT", "ID", "UPDATED");
    for entry in entries {
        println!(
            "{:<8} {:<22} {}",
            entry.id,
            format_ts(entry.updated_at),
            preview(&entry.content, 80)
        );
    }
    Ok(())
}

pub async fn run_entry_add(config: &Config, category_id: i64, content: &str) -> Result<()> {
    let service = build_writable_service(config).await?;
    let entry = service.create_entry(category_id, content).await?;
    println!("Added entry {} to category {}", entry.id, category_id);
    Ok(())
}

pub async fn run_entry_update(
    config: &Config,
    category_id: i64,
    entry_id: i64,
    content: &str,
) -> Result<()> {
    let service = build_writable_service(config).await?;
    service.update_entry(category_id, entry_id, content).await?;
    println!("Updated entry {} in category {}", entry_id, category_id);
    Ok(())
}

pub async fn run_entry_delete(config: &Config, category_id: i64, entry_id: i64) -> Result<()> {
    let service = build_writable_service(config).await?;
    service.delete_entry(category_id, entry_id).await?;
    println!("Deleted entry {} from category {}", entry_id, category_id);
    Ok(())
}

/// First line of `content`, cut to at most `max` characters.
fn preview(content: &str, max: usize) -> String {
    let line = content.lines().next().unwrap_or("");
    if line.chars().count() > max || content.lines().nth(1).is_some() {
        let cut: String = line.chars().take(max).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
