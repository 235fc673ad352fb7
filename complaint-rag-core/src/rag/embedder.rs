//! Embedding generation using model providers.
//!
//! This module provides functionality to convert text into vector embeddings
//! using provider embedding models.

use crate::provider::{Provider, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Blank text has no meaningful embedding.
    #[error("Cannot embed empty text")]
    EmptyInput,

    /// The model returned a vector of the wrong length.
    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The configured model is not served by the backend.
    #[error("Embedding model '{0}' is not available")]
    ModelUnavailable(String),
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Maps text to a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector returned by [`embed`](Self::embed).
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Generates vector embeddings for text using a provider embedding model.
///
/// The embedder converts text into vectors that capture semantic meaning,
/// which the vector index compares against the embedded complaint fragments.
/// The query must be embedded by the same model that built the index.
///
/// # Supported Models
///
/// Common embedding models:
/// - `all-minilm` - 384-dimensional embeddings, small and fast
/// - `nomic-embed-text` - 768-dimensional embeddings, good general purpose
#[derive(Clone)]
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
    dimension: usize,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimension,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    /// Generates a vector embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The text is blank
    /// - The provider is unreachable or the model is not available
    /// - The returned vector does not have the configured dimension
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbedderError::EmptyInput);
        }

        let embedding = self.provider.embed(text, &self.model).await?;

        if embedding.len() != self.dimension {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }
}
