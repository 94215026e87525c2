//! Core data models for the knowledge base.
//!
//! These types represent categories, chatbot entries, and the vector
//! records that mirror entries into the external index.

use serde::Serialize;
use serde_json::{json, Value};

/// A grouping of chatbot entries, referenced by numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
}

/// A single chatbot knowledge snippet belonging to a category.
///
/// `category_id` is fixed at creation; only `content` changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: i64,
    pub category_id: i64,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Entry {
    /// Key under which this entry is stored in the vector index.
    pub fn index_id(&self) -> String {
        self.id.to_string()
    }
}

/// An `(id → embedding, metadata)` pair held by a vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Value,
}

impl VectorRecord {
    /// Build the record mirroring `entry` with the given embedding.
    ///
    /// Metadata always carries the entry id as a string, plus the
    /// category id and the embedded text so retrieval can work from the
    /// index alone.
    pub fn for_entry(entry: &Entry, values: Vec<f32>) -> Self {
        Self {
            id: entry.index_id(),
            values,
            metadata: json!({
                "id": entry.index_id(),
                "category_id": entry.category_id.to_string(),
                "text": entry.content,
            }),
        }
    }
}
