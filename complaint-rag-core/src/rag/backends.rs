use super::embedder::{Embedder, EmbedderError, ProviderEmbedder};
use super::flat_index::FlatIndex;
use super::generator::{Generator, ProviderGenerator};
use super::index::VectorIndex;
use super::{RagError, Result};
use crate::config::Config;
use crate::detection;
use crate::provider::{OllamaProvider, Provider};
use std::sync::Arc;
use tracing::{debug, info};

/// The shared capability handles a pipeline runs against.
///
/// Built once at startup and handed to every [`RagOrchestrator`](super::RagOrchestrator)
/// that needs them. All three handles are read-only and safe to share across
/// concurrent queries. Dropping the last clone of a handle releases it;
/// [`close`](Self::close) does so explicitly.
#[derive(Clone)]
pub struct Backends {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
}

impl Backends {
    /// Bundles already-constructed capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the embedder and index
    /// disagree on the vector dimension.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        if embedder.dimension() != index.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            });
        }

        Ok(Self {
            embedder,
            index,
            generator,
        })
    }

    /// Loads the index from disk and connects to the configured model server.
    ///
    /// Fails fast, before any query is served, when:
    /// - the configuration is invalid
    /// - the index snapshot is missing or corrupt
    /// - the index dimension differs from the embedding model's
    /// - the model server is unreachable or does not serve a configured model
    pub async fn load(config: &Config) -> Result<Self> {
        config.validate()?;
        let dimension = config.embedding_dimension()?;

        let index = FlatIndex::load(&config.index.path, config.index.metric).await?;
        if index.dimension() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: index.dimension(),
                actual: dimension,
            });
        }

        let llm_provider: Arc<dyn Provider> = Arc::new(OllamaProvider::new(&config.llm.base_url));
        let llm_status = detection::probe(llm_provider.as_ref(), &config.llm.base_url)
            .await
            .map_err(|e| RagError::GenerationUnavailable(e.to_string()))?;
        llm_status
            .require(&config.llm.model)
            .map_err(|e| RagError::GenerationUnavailable(e.to_string()))?;

        let embedding_url = config.embedding_base_url();
        let (embedding_provider, embedding_status) = if embedding_url == config.llm.base_url {
            (llm_provider.clone(), llm_status)
        } else {
            let provider: Arc<dyn Provider> = Arc::new(OllamaProvider::new(embedding_url));
            let status = detection::probe(provider.as_ref(), embedding_url)
                .await
                .map_err(|e| EmbedderError::ModelUnavailable(e.to_string()))?;
            (provider, status)
        };
        if !embedding_status.serves(&config.embedding.model) {
            return Err(EmbedderError::ModelUnavailable(config.embedding.model.clone()).into());
        }

        info!(
            llm = %config.llm.model,
            embedding = %config.embedding.model,
            vectors = index.len(),
            "Backends ready"
        );

        Self::new(
            Arc::new(ProviderEmbedder::new(embedding_provider, &config.embedding.model, dimension)),
            Arc::new(index),
            Arc::new(ProviderGenerator::new(llm_provider, &config.llm.model)),
        )
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    pub fn generator(&self) -> Arc<dyn Generator> {
        self.generator.clone()
    }

    /// Releases this set of handles.
    ///
    /// Orchestrators built from these backends keep their own clones and stay
    /// usable until they are dropped.
    pub fn close(self) {
        debug!(
            shared = Arc::strong_count(&self.index).saturating_sub(1),
            "Closing backends"
        );
    }
}
