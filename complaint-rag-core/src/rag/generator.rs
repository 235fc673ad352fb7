//! Text generation behind a narrow capability interface.
//!
//! The pipeline treats generation as a possibly non-deterministic function of
//! `(prompt, parameters)`. Output is never trusted to be well-formed: it is
//! passed through [`finalize_output`] before it reaches an answer.

use super::types::Prompt;
use crate::config::LlmConfig;
use crate::provider::{GenerateOptions, GenerateRequest, Provider, ProviderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Decoding parameters passed opaquely to the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Token budget for the backend.
    pub max_new_tokens: usize,
    /// Maximum number of characters read back.
    pub max_output_length: usize,
    pub temperature: f64,
    pub num_beams: u32,
    pub do_sample: bool,
}

impl GenerationParams {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_new_tokens: config.max_new_tokens,
            max_output_length: config.max_output_length,
            temperature: config.temperature,
            num_beams: config.num_beams,
            do_sample: config.do_sample,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

/// Produces an answer for a fully built prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String>;
}

/// Generator backed by a streaming [`Provider`].
///
/// The stream is abandoned as soon as `max_output_length` characters have been
/// received, so a runaway completion cannot grow without bound.
#[derive(Clone)]
pub struct ProviderGenerator {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for ProviderGenerator {
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams) -> Result<String> {
        if params.num_beams > 1 {
            debug!(
                num_beams = params.num_beams,
                "Beam search not supported by provider, decoding greedily"
            );
        }

        let options = GenerateOptions {
            // Greedy decoding when sampling is off
            temperature: if params.do_sample && params.num_beams <= 1 {
                params.temperature
            } else {
                0.0
            },
            num_predict: params.max_new_tokens,
        };
        let request = GenerateRequest::new(&self.model, prompt.as_str()).with_options(options);

        let limit = params.max_output_length;
        let mut output = String::new();
        let mut received = 0usize;

        self.provider
            .generate(request, Box::new(|chunk| {
                received += chunk.content.chars().count();
                output.push_str(&chunk.content);
                if chunk.done || received >= limit {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }))
            .await?;

        debug!(chars = received, "Generation stream finished");
        Ok(output)
    }
}

/// Turns raw backend output into answer text.
///
/// - strips a verbatim echo of the prompt, which some text-generation
///   backends prepend to the completion
/// - removes control characters other than newline and tab
/// - trims surrounding whitespace
/// - bounds the result to `max_chars` characters
pub fn finalize_output(raw: &str, prompt: &Prompt, max_chars: usize) -> String {
    let body = raw.strip_prefix(prompt.as_str()).unwrap_or(raw);

    let cleaned: String = body
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    cleaned.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChunkCallback, GenerateChunk};
    use std::sync::Mutex;

    /// Streams canned chunks and records the last request.
    struct StreamingProvider {
        chunks: Vec<&'static str>,
        delivered: Mutex<usize>,
        last_request: Mutex<Option<GenerateRequest>>,
    }

    impl StreamingProvider {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                delivered: Mutex::new(0),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Provider for StreamingProvider {
        async fn generate<'a>(
            &'a self,
            request: GenerateRequest,
            mut callback: ChunkCallback<'a>,
        ) -> crate::provider::Result<()> {
            *self.last_request.lock().unwrap() = Some(request);
            let last = self.chunks.len().saturating_sub(1);
            for (i, content) in self.chunks.iter().enumerate() {
                *self.delivered.lock().unwrap() += 1;
                let chunk = GenerateChunk {
                    model: "stub".to_string(),
                    content: content.to_string(),
                    done: i == last,
                };
                if callback(chunk).is_break() {
                    break;
                }
            }
            Ok(())
        }

        async fn embed(&self, _text: &str, _model: &str) -> crate::provider::Result<Vec<f32>> {
            Ok(vec![])
        }

        async fn list_models(&self) -> crate::provider::Result<Vec<String>> {
            Ok(vec![])
        }
    }

    fn prompt(text: &str) -> Prompt {
        Prompt::new(text.to_string(), 0, false)
    }

    #[tokio::test]
    async fn test_provider_generator_accumulates_stream() {
        let provider = Arc::new(StreamingProvider::new(vec![
            "The card ",
            "was charged ",
            "twice.",
        ]));
        let generator = ProviderGenerator::new(provider.clone(), "falcon:7b-instruct");

        let output = generator.generate(&prompt("p"), &GenerationParams::default()).await.unwrap();
        assert_eq!(output, "The card was charged twice.");

        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.model, "falcon:7b-instruct");
        assert_eq!(request.options.num_predict, 200);
        assert_eq!(request.options.temperature, 0.7);
    }

    #[tokio::test]
    async fn test_provider_generator_stops_at_output_bound() {
        let provider = Arc::new(StreamingProvider::new(vec!["abcd", "efgh", "ijkl", "mnop"]));
        let generator = ProviderGenerator::new(provider.clone(), "m");
        let params = GenerationParams { max_output_length: 6, ..GenerationParams::default() };

        let output = generator.generate(&prompt("p"), &params).await.unwrap();
        assert_eq!(output, "abcdefgh");
        assert_eq!(*provider.delivered.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_greedy_when_sampling_disabled() {
        let provider = Arc::new(StreamingProvider::new(vec!["x"]));
        let generator = ProviderGenerator::new(provider.clone(), "m");
        let params = GenerationParams { do_sample: false, ..GenerationParams::default() };

        generator.generate(&prompt("p"), &params).await.unwrap();
        let request = provider.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.options.temperature, 0.0);
    }

    #[test]
    fn test_finalize_strips_prompt_echo() {
        let p = prompt("Question:\nwhy?\n\nAnswer:\n");
        let raw = "Question:\nwhy?\n\nAnswer:\n Because of a duplicate charge.";
        assert_eq!(finalize_output(raw, &p, 100), "Because of a duplicate charge.");
    }

    #[test]
    fn test_finalize_removes_control_characters() {
        let raw = "Refund\u{0007} issued\r\n\tby the bank\u{001b}[0m";
        assert_eq!(finalize_output(raw, &prompt("p"), 100), "Refund issued\n\tby the bank[0m");
    }

    #[test]
    fn test_finalize_bounds_length_in_characters() {
        assert_eq!(finalize_output("  ééééé  ", &prompt("p"), 3), "ééé");
    }
}
