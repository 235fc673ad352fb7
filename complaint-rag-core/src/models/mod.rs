//! Known chat and embedding models.

mod registry;

pub use registry::{default_models, ChatModel, EmbeddingModel, Model, ModelRegistry};
