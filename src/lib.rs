//! complaint-rag - Question answering over customer complaint narratives
//!
//! This is the convenience wrapper crate that re-exports the core pipeline.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! complaint-rag = "0.1"
//! ```
//!
//! See `demos/stub_pipeline.rs` for a pipeline wired to in-memory backends.

// Re-export core
pub use complaint_rag_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use complaint_rag_core::config::Config;
    pub use complaint_rag_core::rag::{
        AnswerResult, Backends, DistanceMetric, Embedder, Fragment, GenerationParams, Generator,
        Prompt, RagError, RagOrchestrator, VectorIndex,
    };
}
