//! Common types for model providers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use thiserror::Error;

/// Errors that can occur when interacting with a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Provider error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Callback invoked for each streamed generation chunk.
///
/// Returning `ControlFlow::Break` stops reading the stream early.
pub type ChunkCallback<'a> = Box<dyn FnMut(GenerateChunk) -> ControlFlow<()> + Send + 'a>;

/// Provider trait for model backends.
///
/// Implementations provide text completion and embeddings through a concrete
/// backend (Ollama, ...).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stream a completion for a raw prompt.
    async fn generate<'a>(
        &'a self,
        request: GenerateRequest,
        callback: ChunkCallback<'a>,
    ) -> Result<()>;

    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>>;

    /// Names of the models the backend currently serves.
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Request for a raw (template-free) completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub options: GenerateOptions,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: GenerateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }
}

/// Decoding options understood by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub temperature: f64,
    pub num_predict: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            num_predict: 200,
        }
    }
}

/// One streamed piece of a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateChunk {
    pub model: String,
    pub content: String,
    pub done: bool,
}

/// Request for generating embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: String,
}

/// Response containing embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub model: String,

    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
}
