use crate::models::ModelRegistry;
use crate::rag::{DistanceMetric, PromptTemplate, DEFAULT_FALLBACK_ANSWER, DEFAULT_TEMPLATE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole question-answering pipeline.
///
/// Every section has defaults, so a config file only needs to name the values
/// it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub cache: CacheConfig,
}

/// Configuration for the generation backend and its decoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub num_beams: u32,
    pub do_sample: bool,
    /// Token budget handed to the backend.
    pub max_new_tokens: usize,
    /// Upper bound, in characters, on the answer text read back from the backend.
    pub max_output_length: usize,
    /// Per-attempt generation deadline.
    pub timeout_ms: u64,
    /// Extra attempts after a timed out or unavailable generation call.
    pub retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "falcon:7b-instruct".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
            num_beams: 1,
            do_sample: true,
            max_new_tokens: 200,
            max_output_length: 2000,
            timeout_ms: 120_000,
            retries: 1,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration for the embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Falls back to `llm.base_url` when unset.
    pub base_url: Option<String>,
    /// Falls back to the dimension registered for `model` when unset.
    pub dimension: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm".to_string(),
            base_url: None,
            dimension: None,
        }
    }
}

/// Location and metric of the pre-built vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub path: PathBuf,
    pub metric: DistanceMetric,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./vector_store/index.json"),
            metric: DistanceMetric::Cosine,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_k: usize,
    pub max_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            max_k: 50,
        }
    }
}

/// Prompt template and size policy.
///
/// The template and its placeholder names are part of the prompt format seen by
/// the backend; changing them changes every generated prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub template: String,
    pub fallback_answer: String,
    pub max_prompt_chars: usize,
    /// Drop trailing fragments to fit `max_prompt_chars` instead of failing.
    pub truncate: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            fallback_answer: DEFAULT_FALLBACK_ANSWER.to_string(),
            max_prompt_chars: 8000,
            truncate: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 256,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    ///
    /// A file that exists but cannot be read, parsed or validated is still an
    /// error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path) {
            Err(ConfigError::FileRead(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.max_k == 0 {
            return Err(ConfigError::Invalid("retrieval.max_k must be at least 1".into()));
        }
        if self.retrieval.default_k == 0 || self.retrieval.default_k > self.retrieval.max_k {
            return Err(ConfigError::Invalid(format!(
                "retrieval.default_k must be in 1..={}, got {}",
                self.retrieval.max_k, self.retrieval.default_k
            )));
        }
        if self.llm.max_output_length == 0 {
            return Err(ConfigError::Invalid("llm.max_output_length must be at least 1".into()));
        }
        if self.llm.timeout_ms == 0 {
            return Err(ConfigError::Invalid("llm.timeout_ms must be at least 1".into()));
        }
        PromptTemplate::parse(&self.prompt.template)
            .map_err(|e| ConfigError::Invalid(format!("prompt.template: {}", e)))?;
        self.embedding_dimension()?;
        Ok(())
    }

    /// Resolves the embedding dimension shared by the embedder and the index.
    pub fn embedding_dimension(&self) -> Result<usize> {
        let registered = ModelRegistry::new()
            .get_embedding(&self.embedding.model)
            .map(|model| model.embedding_dim);

        match (self.embedding.dimension, registered) {
            (Some(0), _) => Err(ConfigError::Invalid(
                "embedding.dimension must be at least 1".into(),
            )),
            (Some(explicit), Some(known)) if explicit != known => Err(ConfigError::Invalid(format!(
                "embedding.dimension {} disagrees with {} ({} dimensions)",
                explicit, self.embedding.model, known
            ))),
            (Some(explicit), _) => Ok(explicit),
            (None, Some(known)) => Ok(known),
            (None, None) => Err(ConfigError::Invalid(format!(
                "embedding.dimension is required for unregistered model '{}'",
                self.embedding.model
            ))),
        }
    }

    pub fn embedding_base_url(&self) -> &str {
        self.embedding.base_url.as_deref().unwrap_or(&self.llm.base_url)
    }
}
