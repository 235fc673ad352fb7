//! Exact in-memory vector index loaded from a JSON snapshot.
//!
//! The snapshot is produced offline by whatever builds the complaint index.
//! Its shape is:
//!
//! ```text
//! {
//!   "dimension": 384,
//!   "metric": "cosine",            // optional
//!   "vectors": [[0.1, ...], ...],
//!   "records": [{"id": "...", "text": "...", "metadata": {...}}, null, ...]
//! }
//! ```
//!
//! `records[i]` describes `vectors[i]`. Records may be missing (`null` or a
//! shorter list); such positions are still searchable but have no fragment.

use super::index::{DistanceMetric, IndexError, IndexHit, IndexRecord, Result, VectorIndex};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Serialized form of a [`FlatIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub dimension: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<DistanceMetric>,
    pub vectors: Vec<Vec<f32>>,
    #[serde(default)]
    pub records: Vec<Option<IndexRecord>>,
}

/// Brute-force index: every search scans all vectors.
///
/// Suitable for corpora of a few hundred thousand fragments; the scan is
/// O(n * d) per query and allocation-free apart from the hit list.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    vectors: Vec<Vec<f32>>,
    records: Vec<Option<IndexRecord>>,
}

impl FlatIndex {
    /// Reads and validates a snapshot from disk.
    ///
    /// `metric` comes from configuration; a snapshot that declares a different
    /// metric is rejected rather than silently reinterpreted.
    pub async fn load(path: impl AsRef<Path>, metric: DistanceMetric) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes)?;
        let index = Self::from_snapshot(snapshot, metric)?;

        info!(
            path = %path.display(),
            vectors = index.vectors.len(),
            dimension = index.dimension,
            metric = ?index.metric,
            "Loaded vector index"
        );
        Ok(index)
    }

    pub fn from_snapshot(snapshot: IndexSnapshot, metric: DistanceMetric) -> Result<Self> {
        if snapshot.dimension == 0 {
            return Err(IndexError::Corrupt("dimension must be at least 1".into()));
        }
        if let Some(declared) = snapshot.metric {
            if declared != metric {
                return Err(IndexError::Corrupt(format!(
                    "snapshot was built for {:?}, configured metric is {:?}",
                    declared, metric
                )));
            }
        }
        if snapshot.records.len() > snapshot.vectors.len() {
            return Err(IndexError::Corrupt(format!(
                "{} records for {} vectors",
                snapshot.records.len(),
                snapshot.vectors.len()
            )));
        }
        for (position, vector) in snapshot.vectors.iter().enumerate() {
            if vector.len() != snapshot.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: snapshot.dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(IndexError::Corrupt(format!("non-finite value in vector {}", position)));
            }
        }
        for (position, record) in snapshot.records.iter().enumerate() {
            if let Some(record) = record {
                if record.text.trim().is_empty() {
                    return Err(IndexError::Corrupt(format!("record {} has empty text", position)));
                }
            }
        }

        Ok(Self {
            dimension: snapshot.dimension,
            metric,
            vectors: snapshot.vectors,
            records: snapshot.records,
        })
    }

    fn raw_value(&self, query: &[f32], vector: &[f32]) -> f32 {
        match self.metric {
            DistanceMetric::Cosine => cosine_similarity(query, vector),
            DistanceMetric::InnerProduct => dot(query, vector),
            DistanceMetric::L2 => euclidean_distance(query, vector),
        }
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<IndexHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, stored)| IndexHit {
                position,
                value: self.raw_value(vector, stored),
            })
            .collect();

        // Stable sort: equal values keep ascending position order.
        if self.metric.is_distance() {
            hits.sort_by(|a, b| a.value.total_cmp(&b.value));
        } else {
            hits.sort_by(|a, b| b.value.total_cmp(&a.value));
        }
        hits.truncate(k);

        Ok(hits)
    }

    fn lookup_metadata(&self, position: usize) -> Option<&IndexRecord> {
        self.records.get(position).and_then(Option::as_ref)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (magnitude_a * magnitude_b)
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
