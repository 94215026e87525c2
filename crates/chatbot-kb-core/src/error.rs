use thiserror::Error;

use crate::sync::SyncStage;

/// Failure kinds surfaced by the knowledge base.
///
/// The HTTP layer maps these onto status codes: not-found variants to 404,
/// `Validation` to 400, `Downstream` and `Storage` to 500.
#[derive(Debug, Error)]
pub enum KbError {
    #[error("Chatbot category with ID {0} not found.")]
    CategoryNotFound(i64),

    #[error("Chatbot data with ID {entry_id} not found in category {category_id}.")]
    EntryNotFound { category_id: i64, entry_id: i64 },

    #[error("Invalid input: {0}")]
    Validation(String),

    /// The embedding service or the vector index failed.
    #[error("{stage} failed: {source:#}")]
    Downstream {
        stage: SyncStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("Storage error: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl KbError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            KbError::CategoryNotFound(_) | KbError::EntryNotFound { .. }
        )
    }
}

pub type KbResult<T> = Result<T, KbError>;
