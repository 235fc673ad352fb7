//! complaint-rag-core - Question answering over customer complaint narratives
//!
//! Provides the building blocks of the complaint assistant:
//! - Model provider abstraction (Ollama)
//! - RAG pipeline: retrieval, prompt assembly, bounded generation
//! - Narrative preprocessing for the offline indexing step
//! - Configuration management
//!
//! ## Primary API
//!
//! Load [`Backends`] once from a [`Config`], then build a [`RagOrchestrator`]
//! over them and call [`RagOrchestrator::answer`].

// Public modules
pub mod config;
pub mod detection;
pub mod models;
pub mod preprocess;
pub mod provider;
pub mod rag;

// Public exports
pub use config::{Config, ConfigError};
pub use detection::{probe, DetectionError, ServerStatus};
pub use rag::{AnswerResult, Backends, Fragment, RagError, RagOrchestrator};

// Provider exports
pub use provider::{OllamaProvider, Provider, ProviderError};
