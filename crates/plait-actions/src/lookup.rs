use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use plait_context::{ContextEntry, ContextStore};
use plait_llm::Tool;
use serde_json::{json, Value};

use crate::registry::Action;
use crate::search::{LookupFilter, LookupSpec, SearchCollection};

pub const LOOKUP_ACTION_KEY: &str = "lookup_context";

/// Semantic lookup: turns hypothetical passages into a ranked search,
/// folds the hits into a context, and hands back the context key.
pub struct LookupAction {
    search: Arc<dyn SearchCollection>,
    contexts: Arc<ContextStore>,
}

impl LookupAction {
    pub fn new(search: Arc<dyn SearchCollection>, contexts: Arc<ContextStore>) -> Self {
        Self { search, contexts }
    }
}

#[async_trait]
impl Action for LookupAction {
    fn key(&self) -> &str {
        LOOKUP_ACTION_KEY
    }

    fn tool(&self) -> Tool {
        lookup_tool()
    }

    async fn run(&self, params: Value) -> Result<Value> {
        let hypotheticals = normalize_hypotheticals(&params);
        if hypotheticals.is_empty() {
            return Ok(json!({"error": "hypotheticals is required"}));
        }

        let target_key = params
            .get("context_key")
            .and_then(Value::as_str)
            .filter(|k| !k.is_empty());

        let mut filter = LookupFilter::default();

        // Folder scoping; the vault root means "everywhere".
        if let Some(folder) = params.get("in_folder").and_then(Value::as_str) {
            if !folder.is_empty() && folder != "/" {
                let prefix = if folder.ends_with('/') {
                    folder.to_string()
                } else {
                    format!("{folder}/")
                };
                filter.key_starts_with = Some(prefix);
            }
        }

        // Never return material the target context already holds.
        if let Some(key) = target_key {
            filter.exclude_keys = self.contexts.exclusion_keys(key);
        }

        tracing::debug!(
            hypotheticals = hypotheticals.len(),
            appending = target_key.is_some(),
            "running semantic lookup"
        );
        let hits = self
            .search
            .lookup(LookupSpec { hypotheticals, filter })
            .await?;

        let entries: Vec<ContextEntry> = hits
            .into_iter()
            .map(|hit| ContextEntry::scored(hit.key, hit.score))
            .collect();
        let context = self.contexts.merge_into(target_key, &entries);

        Ok(json!(context.key))
    }
}

/// Collects hypotheticals from the tool parameters.
///
/// `hypotheticals` may arrive as a list, as a JSON-array string, as a
/// newline-joined string, or as a single passage; the numbered
/// `hypothetical_1..3` parameters of the tool schema are appended on top.
/// Blank entries are dropped.
pub fn normalize_hypotheticals(params: &Value) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    match params.get("hypotheticals") {
        Some(Value::Array(items)) => {
            out.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            let parsed = if trimmed.starts_with('[') && trimmed.ends_with(']') {
                serde_json::from_str::<Vec<String>>(trimmed).ok()
            } else {
                None
            };
            match parsed {
                Some(items) => out.extend(items),
                None if s.contains('\n') => out.extend(s.lines().map(str::to_string)),
                None => out.push(s.clone()),
            }
        }
        _ => {}
    }

    for name in ["hypothetical_1", "hypothetical_2", "hypothetical_3"] {
        if let Some(h) = params.get(name).and_then(Value::as_str) {
            out.push(h.to_string());
        }
    }

    out.retain(|h| !h.trim().is_empty());
    out
}

fn lookup_tool() -> Tool {
    Tool::new(
        LOOKUP_ACTION_KEY,
        "Performs a semantic search of the user's notes. Use to respond to \
         'Based on my notes…' or any other request that may require surfacing \
         unspecified content. Provide at least two hypothetical passages \
         predicted to be semantically similar to the material needed; begin \
         each with breadcrumbs (FOLDER NAME > FILE NAME) followed by the \
         passage contents.",
        json!({
            "type": "object",
            "properties": {
                "hypothetical_1": {
                    "type": "string",
                    "description": "Breadcrumbs then contents, e.g. FOLDER NAME > FILE NAME: passage."
                },
                "hypothetical_2": {
                    "type": "string",
                    "description": "Distinct from hypothetical_1, sharing no breadcrumbs."
                },
                "hypothetical_3": {
                    "type": "string",
                    "description": "Distinct from hypothetical_1 and hypothetical_2."
                },
                "in_folder": {
                    "type": "string",
                    "description": "Optional. Limits the lookup to items under this folder. Prefer omitting it."
                }
            },
            "required": ["hypothetical_1", "hypothetical_2"]
        }),
    )
}
