use super::backends::Backends;
use super::cache::AnswerCache;
use super::generator::{finalize_output, GenerationParams, Generator};
use super::prompt::PromptBuilder;
use super::retriever::{validate_k, validate_query, Retriever};
use super::types::{AnswerResult, Fragment, Prompt};
use super::{RagError, Result};
use crate::config::Config;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a single `answer` call currently is.
///
/// Stages only move forward, in declaration order; `Error` is reachable from
/// any stage before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Retrieving,
    Prompting,
    Generating,
    Done,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Retrieving => "retrieving",
            Stage::Prompting => "prompting",
            Stage::Generating => "generating",
            Stage::Done => "done",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "Pipeline stage");
    *stage = next;
}

/// Answers questions by running retrieve, prompt and generate in order.
///
/// An orchestrator holds no per-call state; every call either returns a
/// complete [`AnswerResult`] or a typed [`RagError`]. It is `Send + Sync` and
/// meant to be shared, e.g. behind an `Arc`, by concurrent callers.
pub struct RagOrchestrator {
    retriever: Retriever,
    prompt_builder: PromptBuilder,
    generator: Arc<dyn Generator>,
    params: GenerationParams,
    default_k: usize,
    timeout: Duration,
    retries: u32,
    fallback_answer: String,
    cache: Option<AnswerCache>,
}

impl RagOrchestrator {
    pub fn new(config: &Config, backends: &Backends) -> Result<Self> {
        config.validate()?;

        let retriever = Retriever::new(
            backends.embedder(),
            backends.index(),
            config.retrieval.max_k,
        )?;
        let prompt_builder = PromptBuilder::from_config(&config.prompt)?;
        if !config.prompt.template.contains(&config.prompt.fallback_answer) {
            warn!("Prompt template does not mention the configured fallback answer");
        }

        Ok(Self {
            retriever,
            prompt_builder,
            generator: backends.generator(),
            params: GenerationParams::from_config(&config.llm),
            default_k: config.retrieval.default_k,
            timeout: config.llm.timeout(),
            retries: config.llm.retries,
            fallback_answer: config.prompt.fallback_answer.clone(),
            cache: config
                .cache
                .enabled
                .then(|| AnswerCache::new(config.cache.max_entries)),
        })
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// The phrase the prompt asks the model to reply with when the context is
    /// insufficient.
    pub fn fallback_answer(&self) -> &str {
        &self.fallback_answer
    }

    /// Whether `result` is the insufficient-information reply rather than a
    /// grounded answer.
    pub fn is_fallback(&self, result: &AnswerResult) -> bool {
        result.answer.trim() == self.fallback_answer.trim()
    }

    /// Answers `question` using the configured default `k`.
    pub async fn answer(&self, question: &str) -> Result<AnswerResult> {
        self.answer_with_k(question, self.default_k).await
    }

    /// Answers `question` from the `k` most relevant fragments.
    ///
    /// Validation happens before any capability is touched. With the cache
    /// enabled, concurrent calls for the same `(question, k)` run the pipeline
    /// once and share its result.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidQuery`] / [`RagError::InvalidParameter`] for bad input
    /// - [`RagError::EmbeddingFailure`], [`RagError::DimensionMismatch`] or
    ///   [`RagError::IndexUnavailable`] from retrieval
    /// - [`RagError::PromptTooLarge`] if truncation is disabled and the prompt
    ///   exceeds its bound
    /// - [`RagError::GenerationTimeout`] / [`RagError::GenerationUnavailable`]
    ///   once retries are exhausted
    pub async fn answer_with_k(&self, question: &str, k: usize) -> Result<AnswerResult> {
        let question = validate_query(question)?;
        validate_k(k, self.retriever.max_k())?;

        match &self.cache {
            Some(cache) => {
                cache
                    .get_or_try_insert_with(question, k, || self.run_stages(question, k))
                    .await
            }
            None => self.run_stages(question, k).await,
        }
    }

    async fn run_stages(&self, question: &str, k: usize) -> Result<AnswerResult> {
        let mut stage = Stage::Start;
        let result = self.execute(question, k, &mut stage).await;

        match &result {
            Ok(answer) => info!(k, sources = answer.sources.len(), "Answered question"),
            Err(e) => {
                warn!(stage = %stage, error = %e, "Question failed");
                advance(&mut stage, Stage::Error);
            }
        }
        result
    }

    async fn execute(&self, question: &str, k: usize, stage: &mut Stage) -> Result<AnswerResult> {
        advance(stage, Stage::Retrieving);
        let retrieved = self.retriever.retrieve(question, k).await?;

        advance(stage, Stage::Prompting);
        let prompt = self.prompt_builder.build(&retrieved.texts(), question)?;

        advance(stage, Stage::Generating);
        let raw = self.generate_with_retry(&prompt).await?;
        let answer = finalize_output(&raw, &prompt, self.params.max_output_length);

        let sources: Vec<Fragment> = retrieved
            .into_fragments()
            .into_iter()
            .take(prompt.included_fragments())
            .collect();

        advance(stage, Stage::Done);
        Ok(AnswerResult {
            question: question.to_string(),
            answer,
            sources,
        })
    }

    /// Runs the generator under the timeout, retrying timeouts and backend
    /// failures up to `retries` extra times with the same prompt.
    ///
    /// A timed-out attempt is dropped, which cancels the backend request.
    async fn generate_with_retry(&self, prompt: &Prompt) -> Result<String> {
        let attempts = self.retries + 1;
        let mut attempt = 1;

        loop {
            let generation = self.generator.generate(prompt, &self.params);
            let outcome = tokio::time::timeout(self.timeout, generation).await;
            let err = match outcome {
                Ok(Ok(raw)) => return Ok(raw),
                Ok(Err(e)) => RagError::from(e),
                Err(_) => RagError::GenerationTimeout(self.timeout),
            };

            if attempt >= attempts {
                return Err(err);
            }
            warn!(attempt, attempts, error = %err, "Generation attempt failed, retrying");
            attempt += 1;
        }
    }
}
