use super::embedder::Embedder;
use super::index::{IndexHit, IndexRecord, VectorIndex};
use super::types::{Fragment, RetrievalResult, ScoredFragment};
use super::{RagError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns a query into ranked, deduplicated fragments.
///
/// The retriever shares the embedder and index with every other query; it
/// never mutates either and keeps no per-call state, so one instance can serve
/// concurrent callers.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    max_k: usize,
}

impl Retriever {
    /// Creates a retriever over a shared embedder and index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the embedder and index
    /// disagree on the vector dimension.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        max_k: usize,
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
            max_k,
        })
    }

    pub fn max_k(&self) -> usize {
        self.max_k
    }

    /// Retrieves up to `k` fragments for `query`, most relevant first.
    ///
    /// Positions the index reports without a stored record are dropped and
    /// logged, so the result may be shorter than `k`. It is never padded.
    /// Equal scores keep the index's native order.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidQuery`] for a blank query
    /// - [`RagError::InvalidParameter`] for `k` outside `1..=max_k`
    /// - [`RagError::EmbeddingFailure`] / [`RagError::DimensionMismatch`] from the embedder
    /// - [`RagError::IndexUnavailable`] if the search itself fails
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        let query = validate_query(query)?;
        validate_k(k, self.max_k)?;

        let embedding = self.embedder.embed(query).await?;
        if embedding.len() != self.index.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: embedding.len(),
            });
        }
        debug!(dimension = embedding.len(), k, "Query embedded, searching index");

        let mut hits = self.index.search(&embedding, k).await?;
        if hits.len() > k {
            warn!(returned = hits.len(), k, "Index returned more neighbors than requested");
            hits.truncate(k);
        }

        let scored = self.collect_fragments(&hits);
        info!(
            requested = k,
            neighbors = hits.len(),
            fragments = scored.len(),
            "Retrieved fragments"
        );

        Ok(RetrievalResult::new(scored))
    }

    fn collect_fragments(&self, hits: &[IndexHit]) -> Vec<ScoredFragment> {
        let metric = self.index.metric();
        let mut seen = HashSet::new();
        let mut scored = Vec::with_capacity(hits.len());

        for hit in hits {
            if !hit.value.is_finite() {
                warn!(position = hit.position, "Dropping neighbor with non-finite score");
                continue;
            }
            let Some(record) = self.index.lookup_metadata(hit.position) else {
                warn!(position = hit.position, "No record stored for index position, dropping");
                continue;
            };
            if record.text.trim().is_empty() {
                warn!(position = hit.position, "Record has empty text, dropping");
                continue;
            }

            let fragment = build_fragment(hit.position, record);
            if !seen.insert(fragment.id.clone()) {
                debug!(id = %fragment.id, "Duplicate fragment id, keeping the first occurrence");
                continue;
            }

            scored.push(ScoredFragment {
                fragment,
                score: metric.to_similarity(hit.value),
            });
        }

        let ordered = scored.windows(2).all(|w| w[0].score >= w[1].score);
        if !ordered {
            warn!("Index returned neighbors out of score order, re-ranking");
            // Stable, so equal scores keep native order
            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        }

        scored
    }
}

/// Builds the fragment seen by the rest of the pipeline from a raw index record.
///
/// The record's explicit id wins; otherwise the index position becomes the id.
fn build_fragment(position: usize, record: &IndexRecord) -> Fragment {
    Fragment {
        id: record.id.clone().unwrap_or_else(|| position.to_string()),
        text: record.text.clone(),
        metadata: record.metadata.clone(),
    }
}

/// Returns the trimmed query, or [`RagError::InvalidQuery`] if nothing is left.
pub fn validate_query(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidQuery("query is empty".to_string()));
    }
    Ok(trimmed)
}

pub fn validate_k(k: usize, max_k: usize) -> Result<()> {
    if k == 0 || k > max_k {
        return Err(RagError::InvalidParameter(format!("k must be in 1..={}, got {}", max_k, k)));
    }
    Ok(())
}
