//! Model provider abstraction layer.
//!
//! This module defines a common interface for model backends so the pipeline
//! can embed text and stream completions without knowing which server answers.

mod types;
pub mod ollama;

// Re-export common types
pub use types::{
    ChunkCallback,
    EmbedRequest,
    EmbedResponse,
    GenerateChunk,
    GenerateOptions,
    GenerateRequest,
    Provider,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use ollama::OllamaProvider;
