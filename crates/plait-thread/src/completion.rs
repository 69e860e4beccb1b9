use std::collections::HashMap;
use std::sync::RwLock;

use plait_llm::ModelSelection;
use plait_store::{Persister, Result, SaveQueue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a completion. `Errored` is reached from `Streaming` but is
/// not terminal: re-running clears the partial accumulator and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    Created,
    ToolPending,
    RequestBuilt,
    Streaming,
    Done,
    Errored,
}

/// A recorded tool invocation: which action, with what arguments, and —
/// once resolved — what it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCall {
    pub action_key: String,
    pub args: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ActionCall {
    pub fn new(action_key: impl Into<String>, args: Value) -> Self {
        Self {
            action_key: action_key.into(),
            args,
            result: None,
        }
    }
}

/// One model-invocation turn within a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub key: String,
    pub thread_key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_call: Option<ActionCall>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_key: Option<String>,

    /// Partial response chunks in arrival order.
    pub responses: Vec<String>,

    /// Final response text, set when the turn completes.
    pub response_text: String,

    pub model: ModelSelection,
    pub stream: bool,
    pub state: CompletionState,

    /// Set when a newer completion was created while this one streamed;
    /// further stream writes are discarded.
    pub superseded: bool,
}

impl Completion {
    pub fn new(key: impl Into<String>, thread_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            thread_key: thread_key.into(),
            system_message: None,
            user_message: None,
            action_call: None,
            context_key: None,
            responses: Vec::new(),
            response_text: String::new(),
            model: ModelSelection::default(),
            stream: true,
            state: CompletionState::Created,
            superseded: false,
        }
    }

    /// Whether the model has produced anything for this turn yet.
    pub fn has_response(&self) -> bool {
        !self.responses.is_empty() || !self.response_text.is_empty()
    }

    /// Reset the accumulator for a retry after a stream error.
    pub fn clear_partial(&mut self) {
        self.responses.clear();
        self.response_text.clear();
        self.state = CompletionState::Created;
    }
}

/// Flat keyed storage for completions; threads reference them by key only.
#[derive(Debug, Default)]
pub struct CompletionStore {
    items: RwLock<HashMap<String, Completion>>,
    save_queue: SaveQueue,
}

impl CompletionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, completion: Completion) {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.insert(completion.key.clone(), completion);
    }

    pub fn get(&self, key: &str) -> Option<Completion> {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        let items = self.items.read().unwrap_or_else(|e| e.into_inner());
        items.contains_key(key)
    }

    /// Apply `f` to the stored completion; returns the updated snapshot,
    /// or `None` when the key is absent (recoverable, never an error).
    pub fn update<F: FnOnce(&mut Completion)>(&self, key: &str, f: F) -> Option<Completion> {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        items.get_mut(key).map(|completion| {
            f(completion);
            completion.clone()
        })
    }

    pub fn queue_save(&self, key: &str) {
        self.save_queue.queue(key);
    }

    pub async fn process_save_queue(&self, persister: &dyn Persister) -> Result<usize> {
        self.save_queue.flush(persister).await
    }
}
