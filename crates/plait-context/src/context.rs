use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named set of reference items (vault paths or block ids) attachable to
/// completions. Shared across turns by key, never copied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub key: String,
    pub context_items: BTreeMap<String, ContextItem>,
}

/// Per-item metadata inside a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Traversal depth at which the item entered the context; directly
    /// attached or retrieved items sit at 0.
    pub depth: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ContextItem {
    pub fn direct() -> Self {
        Self { depth: 0, score: None }
    }

    pub fn scored(score: f64) -> Self {
        Self { depth: 0, score: Some(score) }
    }
}

/// One entry of a merge batch: the item key plus optional relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub key: String,
    pub score: Option<f64>,
}

impl ContextEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), score: None }
    }

    pub fn scored(key: impl Into<String>, score: f64) -> Self {
        Self { key: key.into(), score: Some(score) }
    }
}

impl Context {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            context_items: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.context_items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.context_items.len()
    }

    /// Member keys, used to build lookup exclusion filters so a
    /// "retrieve more" follow-up never returns material already present.
    pub fn member_keys(&self) -> Vec<String> {
        self.context_items.keys().cloned().collect()
    }

    /// Set-union merge: re-adding a present key updates its metadata in
    /// place (the later entry wins), so merging the same batch twice
    /// leaves the same final set.
    pub fn merge_entries(&mut self, entries: &[ContextEntry]) {
        for entry in entries {
            let item = match entry.score {
                Some(score) => ContextItem::scored(score),
                None => ContextItem::direct(),
            };
            self.context_items.insert(entry.key.clone(), item);
        }
    }
}
