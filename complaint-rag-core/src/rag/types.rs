use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar metadata value attached to a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{}", v),
            MetadataValue::Integer(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Ordered so that serialized fragments are byte-stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// An immutable unit of retrievable complaint text.
///
/// Fragments are built by the [`Retriever`](super::Retriever) from raw index
/// records, so nothing downstream depends on how the index stores them.
///
/// # Example
///
/// ```
/// # use complaint_rag_core::rag::Fragment;
/// let fragment = Fragment::new("42", "I was charged twice for one purchase")
///     .with_metadata("product", "Credit card")
///     .with_metadata("complaint_id", 1234567_i64);
/// assert_eq!(fragment.metadata["product"].to_string(), "Credit card");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Fragment {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A fragment paired with its relevance score (higher is more relevant).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFragment {
    pub fragment: Fragment,
    pub score: f32,
}

/// Ranked fragments for one query.
///
/// Ordered by non-increasing score, at most `k` long, with unique fragment ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    hits: Vec<ScoredFragment>,
}

impl RetrievalResult {
    pub(crate) fn new(hits: Vec<ScoredFragment>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredFragment> {
        self.hits.iter()
    }

    pub fn as_slice(&self) -> &[ScoredFragment] {
        &self.hits
    }

    /// Fragment texts in relevance order.
    pub fn texts(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.fragment.text.as_str()).collect()
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        self.hits.into_iter().map(|hit| hit.fragment).collect()
    }
}

/// The fully assembled text handed to the generation backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    text: String,
    included: usize,
    truncated: bool,
}

impl Prompt {
    pub(crate) fn new(text: String, included: usize, truncated: bool) -> Self {
        Self {
            text,
            included,
            truncated,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of leading fragments that made it into the context block.
    pub fn included_fragments(&self) -> usize {
        self.included
    }

    /// True when lower-relevance fragments were dropped to respect the size bound.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A grounded answer together with the fragments that informed it.
///
/// `sources` is in the order the fragments appeared in the prompt, so
/// consumers can cite them positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Fragment>,
}
