//! Runs the full question-answering pipeline against in-memory backends.
//!
//! No model server is needed: questions are embedded by counting topic
//! keywords, and the "generator" summarizes the first fragment it is given.
//!
//! ```text
//! cargo run --example stub_pipeline -- "Why was my card charged twice?"
//! ```

use async_trait::async_trait;
use complaint_rag::config::Config;
use complaint_rag::rag::{
    Backends, DistanceMetric, Embedder, EmbedderError, FlatIndex, GenerationParams, Generator,
    GeneratorError, IndexRecord, IndexSnapshot, Metadata, Prompt, RagOrchestrator,
};
use std::sync::Arc;

const TOPICS: [&[&str]; 3] = [
    &["charge", "charged", "card", "fee", "billing"],
    &["loan", "payment", "installment", "bnpl"],
    &["transfer", "wire", "sent", "account"],
];

/// Embeds text as keyword counts per topic.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        TOPICS.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        if text.trim().is_empty() {
            return Err(EmbedderError::EmptyInput);
        }
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).collect();
        Ok(TOPICS
            .iter()
            .map(|topic| words.iter().filter(|w| topic.contains(w)).count() as f32)
            .collect())
    }
}

/// Answers with the first line of context, or the fallback when there is none.
struct FirstFragmentGenerator {
    fallback: String,
}

#[async_trait]
impl Generator for FirstFragmentGenerator {
    async fn generate(
        &self,
        prompt: &Prompt,
        _params: &GenerationParams,
    ) -> Result<String, GeneratorError> {
        let context = prompt
            .as_str()
            .split("Context:\n")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .filter(|line| !line.trim().is_empty());

        Ok(match context {
            Some(line) => format!("Customers report: {}", line),
            None => self.fallback.clone(),
        })
    }
}

fn record(id: &str, product: &str, text: &str) -> Option<IndexRecord> {
    let mut metadata = Metadata::new();
    metadata.insert("product".to_string(), product.into());
    Some(IndexRecord {
        id: Some(id.to_string()),
        text: text.to_string(),
        metadata,
    })
}

fn demo_index() -> anyhow::Result<FlatIndex> {
    let snapshot = IndexSnapshot {
        dimension: 3,
        metric: Some(DistanceMetric::Cosine),
        vectors: vec![
            vec![3.0, 0.0, 0.0],
            vec![2.0, 0.0, 1.0],
            vec![0.0, 3.0, 0.0],
            vec![0.0, 0.0, 3.0],
        ],
        records: vec![
            record(
                "c-101",
                "Credit card",
                "My card was charged twice for one purchase and the fee was never refunded.",
            ),
            record(
                "c-102",
                "Credit card",
                "A duplicate charge appeared after I disputed a transfer.",
            ),
            record(
                "c-201",
                "Buy Now, Pay Later",
                "The BNPL installment was taken before the payment date.",
            ),
            record("c-301", "Money transfers", "My wire transfer was sent to the wrong account."),
        ],
    };
    Ok(FlatIndex::from_snapshot(snapshot, DistanceMetric::Cosine)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("complaint_rag_core=debug".parse()?),
        )
        .init();

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Why was my card charged twice?".to_string());

    let mut config = Config::default();
    config.embedding.model = "keyword-demo".to_string();
    config.embedding.dimension = Some(TOPICS.len());
    config.retrieval.default_k = 2;
    config.cache.enabled = true;

    let backends = Backends::new(
        Arc::new(KeywordEmbedder),
        Arc::new(demo_index()?),
        Arc::new(FirstFragmentGenerator {
            fallback: config.prompt.fallback_answer.clone(),
        }),
    )?;
    let orchestrator = RagOrchestrator::new(&config, &backends)?;

    let result = orchestrator.answer(&question).await?;
    println!("Q: {}", result.question);
    println!("A: {}", result.answer);
    for (i, source) in result.sources.iter().enumerate() {
        println!("  [{}] {} {}", i + 1, source.id, source.text);
    }

    backends.close();
    Ok(())
}
