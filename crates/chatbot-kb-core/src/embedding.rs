//! Embedding provider trait.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, plus [`embed_one`] for the single-text case the
//! orchestrator needs.
//!
//! Concrete provider implementations (OpenAI, Ollama) live in the
//! `chatbot-kb` app crate.

use anyhow::{bail, Result};
use async_trait::async_trait;

/// Trait for embedding providers.
///
/// Implementations turn text into fixed-length numeric vectors. Calls may
/// fail (network or model errors); callers treat any failure as fatal for
/// the operation in progress.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    ///
    /// `0` means the dimensionality is not known up front and is not checked.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text and check the result against the provider's
/// declared dimensionality.
pub async fn embed_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let vector = provider
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

    if vector.is_empty() {
        bail!("Embedding provider '{}' returned an empty vector", provider.model_name());
    }
    let dims = provider.dims();
    if dims > 0 && vector.len() != dims {
        bail!(
            "Embedding has {} dimensions, expected {} for model '{}'",
            vector.len(),
            dims,
            provider.model_name()
        );
    }
    Ok(vector)
}
