use chrono::{DateTime, Local};
use plait_tree::ThreadTree;
use serde::{Deserialize, Serialize};

use crate::completion::{Completion, CompletionStore};
use crate::folder_tree::{expand_folder_tree_var, FolderTreeSource};
use crate::language::contains_self_referential_keywords;
use crate::settings::ThreadSettings;

/// A named, persisted multi-turn conversation.
///
/// Owns the branching tree of completion keys and the thread-level
/// settings; the completions themselves live in the flat
/// [`CompletionStore`] and are resolved by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub key: String,
    pub settings: ThreadSettings,
    pub tree: ThreadTree,
    pub deleted: bool,

    /// The in-flight turn, if any. Only meaningful while that completion
    /// has produced no response yet; afterwards the turn is history.
    current_completion_key: Option<String>,
}

impl Thread {
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_settings(key, ThreadSettings::default())
    }

    pub fn with_settings(key: impl Into<String>, settings: ThreadSettings) -> Self {
        Self {
            key: key.into(),
            settings,
            tree: ThreadTree::new(),
            deleted: false,
            current_completion_key: None,
        }
    }

    /// Default key for an unnamed thread, e.g.
    /// `Untitled Chat 2025-07-30 14-03-59`.
    pub fn default_key(now: DateTime<Local>) -> String {
        format!("Untitled Chat {}", now.format("%Y-%m-%d %H-%M-%S"))
    }

    /// Completion keys on the active path, in thread order.
    pub fn completion_keys(&self) -> Vec<String> {
        self.tree.active_path()
    }

    /// Active-path completions resolved through the store; stale keys are
    /// skipped.
    pub fn completions(&self, store: &CompletionStore) -> Vec<Completion> {
        self.completion_keys()
            .iter()
            .filter_map(|key| store.get(key))
            .collect()
    }

    /// Latest completion that has a response.
    pub fn last_completion(&self, store: &CompletionStore) -> Option<Completion> {
        self.completions(store)
            .into_iter()
            .rev()
            .find(Completion::has_response)
    }

    /// The unanswered in-flight completion, if one exists. A completion
    /// that has started responding is no longer "current".
    pub fn current_completion(&self, store: &CompletionStore) -> Option<Completion> {
        let key = self.current_completion_key.as_deref()?;
        store.get(key).filter(|c| c.responses.is_empty())
    }

    pub fn set_current_completion(&mut self, key: Option<String>) {
        self.current_completion_key = key;
    }

    pub fn has_default_system_prompt(&self) -> bool {
        !self.settings.system_prompt.trim().is_empty()
    }

    /// Assemble the system-prompt text: the thread default, any per-send
    /// addition, and `{{folder_tree}}` expansion.
    pub fn system_prompt(
        &self,
        extra: Option<&str>,
        folder_source: Option<&dyn FolderTreeSource>,
    ) -> String {
        let mut prompt = self.settings.system_prompt.clone();
        if let Some(extra) = extra.filter(|s| !s.trim().is_empty()) {
            if prompt.is_empty() {
                prompt = extra.to_string();
            } else {
                prompt = format!("{prompt}\n\n{extra}");
            }
        }
        expand_folder_tree_var(&prompt, folder_source)
    }

    /// Whether `user_message` references the user's own material, per the
    /// thread language. Disabled threads never match.
    pub fn has_self_referential_pronoun(&self, user_message: &str) -> bool {
        if user_message.is_empty() || !self.settings.detect_self_referential {
            return false;
        }
        contains_self_referential_keywords(user_message, &self.settings.language)
    }

    /// Whether either of the last two completions carries a user message.
    pub fn has_recent_user_message(&self, store: &CompletionStore) -> bool {
        let completions = self.completions(store);
        completions
            .iter()
            .rev()
            .take(2)
            .any(|c| c.user_message.is_some())
    }
}
