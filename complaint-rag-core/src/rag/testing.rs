//! In-memory capability stubs shared by the pipeline tests.

use super::embedder::{Embedder, EmbedderError};
use super::generator::{GenerationParams, Generator, GeneratorError};
use super::index::{DistanceMetric, IndexError, IndexHit, IndexRecord, VectorIndex};
use super::types::Prompt;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn record(id: &str, text: &str) -> IndexRecord {
    IndexRecord {
        id: Some(id.to_string()),
        text: text.to_string(),
        metadata: Default::default(),
    }
}

pub struct StubEmbedder {
    dimension: usize,
    returned: usize,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            returned: dimension,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Declares `dimension` but returns vectors of another length.
    pub fn returning_dimension(mut self, returned: usize) -> Self {
        self.returned = returned;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbedderError::ModelUnavailable("stub".to_string()));
        }
        Ok(vec![0.5; self.returned])
    }
}

/// Index that answers every search with a fixed neighbor list.
pub struct ScriptedIndex {
    dimension: usize,
    metric: DistanceMetric,
    hits: Vec<IndexHit>,
    records: Vec<Option<IndexRecord>>,
    fail: bool,
    pub searches: AtomicUsize,
}

impl ScriptedIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            hits: Vec::new(),
            records: Vec::new(),
            fail: false,
            searches: AtomicUsize::new(0),
        }
    }

    pub fn with_hits(mut self, hits: &[(usize, f32)]) -> Self {
        self.hits = hits
            .iter()
            .map(|&(position, value)| IndexHit { position, value })
            .collect();
        self
    }

    pub fn with_records(mut self, records: Vec<IndexRecord>) -> Self {
        self.records = records.into_iter().map(Some).collect();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    async fn search(&self, _vector: &[f32], k: usize) -> Result<Vec<IndexHit>, IndexError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(IndexError::Corrupt("scripted failure".to_string()));
        }
        Ok(self.hits.iter().copied().take(k).collect())
    }

    fn lookup_metadata(&self, position: usize) -> Option<&IndexRecord> {
        self.records.get(position).and_then(Option::as_ref)
    }
}

/// How a [`ScriptedGenerator`] responds.
pub enum Behavior {
    Answer(String),
    /// Fails the first `failures` calls, then answers.
    Flaky { failures: usize, answer: String },
    /// Never completes.
    Hang,
    Fail,
}

pub struct ScriptedGenerator {
    behavior: Behavior,
    delay: Duration,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn answering(answer: &str) -> Self {
        Self::with_behavior(Behavior::Answer(answer.to_string()))
    }

    pub fn flaky(failures: usize, answer: &str) -> Self {
        Self::with_behavior(Behavior::Flaky {
            failures,
            answer: answer.to_string(),
        })
    }

    pub fn hanging() -> Self {
        Self::with_behavior(Behavior::Hang)
    }

    pub fn failing() -> Self {
        Self::with_behavior(Behavior::Fail)
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
        _params: &GenerationParams,
    ) -> Result<String, GeneratorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.as_str().to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Answer(answer) => Ok(answer.clone()),
            Behavior::Flaky { failures, answer } => {
                if call < *failures {
                    Err(GeneratorError::Unavailable("flaky failure".to_string()))
                } else {
                    Ok(answer.clone())
                }
            }
            Behavior::Hang => std::future::pending().await,
            Behavior::Fail => Err(GeneratorError::Unavailable("scripted failure".to_string())),
        }
    }
}
