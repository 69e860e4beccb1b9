use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Ranked semantic search over the host's embedded collection.
///
/// Relevance lives entirely on the other side of this contract; the core
/// only shapes the query and folds the ordered results.
#[async_trait]
pub trait SearchCollection: Send + Sync {
    async fn lookup(&self, spec: LookupSpec) -> Result<Vec<SearchHit>>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupSpec {
    /// Query-by-example passages driving the similarity search.
    pub hypotheticals: Vec<String>,
    pub filter: LookupFilter,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupFilter {
    /// Folder scoping: only keys under this prefix match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_starts_with: Option<String>,

    /// Keys the caller already holds; never returned again.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub exclude_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub key: String,
    pub score: f64,

    /// Item size in bytes, when the collection reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl SearchHit {
    pub fn new(key: impl Into<String>, score: f64) -> Self {
        Self {
            key: key.into(),
            score,
            size: None,
        }
    }
}

/// Re-rank hits by score divided by item size, descending.
///
/// Long notes accumulate raw similarity; dividing by size keeps short,
/// dense matches from being drowned out. Hits without a size are treated
/// as unit-length.
pub fn sort_by_size_adjusted_score(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        let a_adjusted = a.score / a.size.unwrap_or(1).max(1) as f64;
        let b_adjusted = b.score / b.size.unwrap_or(1).max(1) as f64;
        b_adjusted.partial_cmp(&a_adjusted).unwrap_or(Ordering::Equal)
    });
    hits
}
