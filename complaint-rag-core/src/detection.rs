//! Model server availability checks and setup guidance.

use crate::provider::{Provider, ProviderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Model server at {url} is not reachable: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: ProviderError,
    },

    #[error("Model '{model}' is not available at {url}")]
    ModelMissing { model: String, url: String },
}

pub type Result<T> = std::result::Result<T, DetectionError>;

/// What a model server reported when probed.
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub url: String,
    pub models: Vec<String>,
}

impl ServerStatus {
    /// Whether `model` is served, accepting the implicit `:latest` tag.
    pub fn serves(&self, model: &str) -> bool {
        self.models
            .iter()
            .any(|name| name == model || name.strip_suffix(":latest") == Some(model))
    }

    /// Fails with [`DetectionError::ModelMissing`] unless `model` is served.
    pub fn require(&self, model: &str) -> Result<()> {
        if self.serves(model) {
            Ok(())
        } else {
            Err(DetectionError::ModelMissing {
                model: model.to_string(),
                url: self.url.clone(),
            })
        }
    }
}

/// Lists the models a server offers, proving it is up.
///
/// # Example
///
/// ```no_run
/// use complaint_rag_core::detection;
/// use complaint_rag_core::provider::OllamaProvider;
///
/// # async fn example() {
/// let provider = OllamaProvider::new("http://localhost:11434");
/// match detection::probe(&provider, provider.base_url()).await {
///     Ok(status) => println!("{} models available", status.models.len()),
///     Err(e) => eprintln!("Setup required: {}", e),
/// }
/// # }
/// ```
pub async fn probe(provider: &dyn Provider, url: &str) -> Result<ServerStatus> {
    let models = provider
        .list_models()
        .await
        .map_err(|source| DetectionError::Unreachable {
            url: url.to_string(),
            source,
        })?;

    Ok(ServerStatus {
        url: url.to_string(),
        models,
    })
}

/// Prints guidance for fixing a failed probe.
pub fn print_setup_help(error: &DetectionError) {
    match error {
        DetectionError::Unreachable { url, .. } => {
            eprintln!("❌ Cannot reach the model server at {}", url);
            eprintln!();
            eprintln!("  Start Ollama:");

            #[cfg(target_os = "macos")]
            {
                eprintln!("   • Run the Ollama app from Applications");
                eprintln!("   • Or:  ollama serve  (in a separate terminal)");
            }

            #[cfg(not(target_os = "macos"))]
            {
                eprintln!("   ollama serve");
            }

            eprintln!();
            eprintln!("  Or point llm.base_url in config.yaml at a running server.");
        }
        DetectionError::ModelMissing { model, .. } => {
            eprintln!("❌ Model '{}' is not pulled", model);
            eprintln!();
            eprintln!("  Pull it with:");
            eprintln!("   ollama pull {}", model);
        }
    }
}
