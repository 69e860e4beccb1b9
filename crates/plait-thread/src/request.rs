use std::collections::HashSet;

use plait_context::{Context, ContextStore};
use plait_llm::Message;

use crate::completion::Completion;
use crate::folder_tree::{expand_folder_tree_var, FolderTreeSource};
use crate::thread::Thread;

/// Renders a context as request text.
///
/// The host owns content embedding (reading notes, trimming blocks); this
/// trait is the seam it plugs into. The default lists the member keys so
/// the model at least sees what material is attached.
pub trait ContextRenderer: Send + Sync {
    fn render(&self, context: &Context) -> Option<String>;
}

/// Fallback renderer: one line per item key, highest-scored first.
#[derive(Debug, Default)]
pub struct KeyListRenderer;

impl ContextRenderer for KeyListRenderer {
    fn render(&self, context: &Context) -> Option<String> {
        if context.is_empty() {
            return None;
        }
        let mut items: Vec<(&String, Option<f64>)> = context
            .context_items
            .iter()
            .map(|(key, item)| (key, item.score))
            .collect();
        items.sort_by(|a, b| {
            b.1.unwrap_or(0.0)
                .partial_cmp(&a.1.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        let mut out = String::from("Context items:\n");
        for (key, _) in items {
            out.push_str("- ");
            out.push_str(key);
            out.push('\n');
        }
        Some(out)
    }
}

/// The messages a single completion contributes to a request: its system
/// message, its rendered context block, then its user message, with
/// `{{folder_tree}}` expanded in the text bodies.
pub fn own_messages(
    completion: &Completion,
    contexts: &ContextStore,
    renderer: &dyn ContextRenderer,
    folder_source: Option<&dyn FolderTreeSource>,
) -> Vec<Message> {
    let mut out = Vec::new();
    if let Some(system) = &completion.system_message {
        out.push(Message::system(expand_folder_tree_var(system, folder_source)));
    }
    if let Some(context_key) = &completion.context_key {
        if let Some(context) = contexts.get(context_key) {
            if let Some(text) = renderer.render(&context) {
                out.push(Message::user(text));
            }
        }
    }
    if let Some(user) = &completion.user_message {
        out.push(Message::user(expand_folder_tree_var(user, folder_source)));
    }
    out
}

/// Full request message list for `completion`.
///
/// Prior active-path completions each contribute their own messages plus a
/// synthesized assistant message carrying their final response text. The
/// prior block is then deduplicated by content, first occurrence kept, so
/// a context block repeated across turns appears once. The current
/// completion's own messages come last, untouched.
pub fn build_request_messages(
    thread: &Thread,
    completion: &Completion,
    completions: &crate::completion::CompletionStore,
    contexts: &ContextStore,
    renderer: &dyn ContextRenderer,
    folder_source: Option<&dyn FolderTreeSource>,
) -> Vec<Message> {
    let mut messages = Vec::new();

    for prior_key in thread
        .completion_keys()
        .iter()
        .take_while(|key| key.as_str() != completion.key)
    {
        let Some(prior) = completions.get(prior_key) else {
            tracing::debug!(key = %prior_key, "prior completion missing from store");
            continue;
        };
        messages.extend(own_messages(&prior, contexts, renderer, folder_source));
        if !prior.response_text.is_empty() {
            messages.push(Message::assistant(prior.response_text.clone()));
        }
    }

    let mut seen = HashSet::new();
    messages.retain(|message| match message.dedup_key() {
        Some(key) => seen.insert(key),
        None => true,
    });

    messages.extend(own_messages(completion, contexts, renderer, folder_source));
    messages
}
