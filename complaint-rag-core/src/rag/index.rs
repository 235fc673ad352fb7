//! Vector index abstraction.
//!
//! The index is a pre-built, read-only resource: this crate only searches it
//! and reads the records stored next to each vector.

use super::types::Metadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed index snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt index: {0}")]
    Corrupt(String),

    #[error("Vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// How the index compares vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity; higher is closer.
    #[default]
    Cosine,
    /// Raw dot product; higher is closer.
    InnerProduct,
    /// Euclidean distance; lower is closer.
    L2,
}

impl DistanceMetric {
    /// Whether raw values from this metric are distances rather than similarities.
    pub fn is_distance(self) -> bool {
        matches!(self, DistanceMetric::L2)
    }

    /// Maps a raw index value onto a similarity score where higher means more relevant.
    pub fn to_similarity(self, raw: f32) -> f32 {
        if self.is_distance() {
            -raw
        } else {
            raw
        }
    }
}

/// One neighbor as reported by the index: an internal position and the
/// metric's raw value (similarity or distance).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub position: usize,
    pub value: f32,
}

/// The raw record stored alongside a vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Explicit fragment id; the position is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Nearest-neighbor search over pre-computed embeddings.
///
/// Implementations must be safe to query concurrently and must never be
/// mutated by a search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Dimension of every stored vector.
    fn dimension(&self) -> usize;

    fn metric(&self) -> DistanceMetric;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns up to `k` neighbors in the index's native order, best first.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Looks up the record stored for `position`, if any.
    fn lookup_metadata(&self, position: usize) -> Option<&IndexRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_similarity_direction() {
        assert_eq!(DistanceMetric::Cosine.to_similarity(0.8), 0.8);
        assert_eq!(DistanceMetric::InnerProduct.to_similarity(3.0), 3.0);
        assert_eq!(DistanceMetric::L2.to_similarity(0.5), -0.5);
        assert!(DistanceMetric::L2.to_similarity(0.1) > DistanceMetric::L2.to_similarity(0.2));
    }

    #[test]
    fn test_metric_serde_names() {
        let metric: DistanceMetric = serde_json::from_str("\"inner_product\"").unwrap();
        assert_eq!(metric, DistanceMetric::InnerProduct);
        assert_eq!(serde_json::to_string(&DistanceMetric::L2).unwrap(), "\"l2\"");
    }
}
