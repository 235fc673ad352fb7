//! Retrieval-augmented question answering over complaint narratives.
//!
//! This module answers free-text questions using a pre-built vector index of
//! complaint fragments and a text-generation backend. A query flows through
//! four stages:
//!
//! 1. **Retrieve**: the question is embedded and the `k` nearest fragments are
//!    read from the index ([`Retriever`])
//! 2. **Prompt**: fragment texts and the question are rendered into a bounded
//!    prompt ([`PromptBuilder`])
//! 3. **Generate**: the prompt is sent to the generation backend under a
//!    timeout ([`Generator`])
//! 4. **Answer**: the output is cleaned and returned with its sources
//!    ([`AnswerResult`])
//!
//! [`RagOrchestrator`] drives the stages; [`Backends`] owns the shared,
//! read-only capability handles.
//!
//! # Example
//!
//! ```no_run
//! use complaint_rag_core::config::Config;
//! use complaint_rag_core::rag::{Backends, RagOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let backends = Backends::load(&config).await?;
//! let orchestrator = RagOrchestrator::new(&config, &backends)?;
//!
//! let answer = orchestrator.answer("Why are people unhappy with BNPL?").await?;
//! println!("{}", answer.answer);
//! for source in &answer.sources {
//!     println!("- {}", source.text);
//! }
//! backends.close();
//! # Ok(())
//! # }
//! ```

mod backends;
mod cache;
mod embedder;
mod flat_index;
mod generator;
mod index;
mod orchestrator;
mod prompt;
mod retriever;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::Backends;
pub use cache::AnswerCache;
pub use embedder::{Embedder, EmbedderError, ProviderEmbedder};
pub use flat_index::{FlatIndex, IndexSnapshot};
pub use generator::{
    finalize_output, GenerationParams, Generator, GeneratorError, ProviderGenerator,
};
pub use index::{DistanceMetric, IndexError, IndexHit, IndexRecord, VectorIndex};
pub use orchestrator::{RagOrchestrator, Stage};
pub use prompt::{
    PromptBuilder, PromptError, PromptTemplate, TemplateError, CONTEXT_PLACEHOLDER,
    DEFAULT_FALLBACK_ANSWER, DEFAULT_TEMPLATE, FRAGMENT_SEPARATOR, QUESTION_PLACEHOLDER,
};
pub use retriever::{validate_k, validate_query, Retriever};
pub use types::{
    AnswerResult, Fragment, Metadata, MetadataValue, Prompt, RetrievalResult, ScoredFragment,
};

use crate::config::ConfigError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a question-answering call.
///
/// Each variant names the stage that failed so callers can react without
/// parsing messages.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailure(#[source] EmbedderError),

    #[error("Embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    #[error("Generation backend unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("Prompt needs {length} characters, limit is {max}")]
    PromptTooLarge { length: usize, max: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RagError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::GenerationTimeout(_) | RagError::GenerationUnavailable(_))
    }
}

impl From<EmbedderError> for RagError {
    fn from(err: EmbedderError) -> Self {
        match err {
            EmbedderError::DimensionMismatch { expected, actual } => {
                RagError::DimensionMismatch { expected, actual }
            }
            other => RagError::EmbeddingFailure(other),
        }
    }
}

impl From<IndexError> for RagError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::DimensionMismatch { expected, actual } => {
                RagError::DimensionMismatch { expected, actual }
            }
            other => RagError::IndexUnavailable(other.to_string()),
        }
    }
}

impl From<PromptError> for RagError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::EmptyQuestion => RagError::InvalidQuery(err.to_string()),
            PromptError::TooLarge { length, max } => RagError::PromptTooLarge { length, max },
        }
    }
}

impl From<GeneratorError> for RagError {
    fn from(err: GeneratorError) -> Self {
        RagError::GenerationUnavailable(err.to_string())
    }
}

impl From<TemplateError> for RagError {
    fn from(err: TemplateError) -> Self {
        RagError::Config(ConfigError::Invalid(format!("prompt template: {}", err)))
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_errors_map_to_taxonomy() {
        let err: RagError = EmbedderError::DimensionMismatch { expected: 384, actual: 3 }.into();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 384, actual: 3 }));

        let err: RagError = EmbedderError::ModelUnavailable("all-minilm".into()).into();
        assert!(matches!(err, RagError::EmbeddingFailure(EmbedderError::ModelUnavailable(_))));
    }

    #[test]
    fn test_index_errors_map_to_taxonomy() {
        let err: RagError = IndexError::DimensionMismatch { expected: 384, actual: 768 }.into();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 384, actual: 768 }));

        let err: RagError = IndexError::Corrupt("bad".into()).into();
        assert!(matches!(err, RagError::IndexUnavailable(_)));
    }

    #[test]
    fn test_prompt_errors_map_to_taxonomy() {
        let err: RagError = PromptError::TooLarge { length: 10, max: 5 }.into();
        assert!(matches!(err, RagError::PromptTooLarge { length: 10, max: 5 }));

        let err: RagError = PromptError::EmptyQuestion.into();
        assert!(matches!(err, RagError::InvalidQuery(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(RagError::GenerationTimeout(Duration::from_secs(1)).is_retryable());
        assert!(RagError::GenerationUnavailable("down".into()).is_retryable());
        assert!(!RagError::InvalidQuery("empty".into()).is_retryable());
        assert!(!RagError::IndexUnavailable("gone".into()).is_retryable());
        assert!(!RagError::PromptTooLarge { length: 2, max: 1 }.is_retryable());
    }
}
