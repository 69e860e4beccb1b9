//! # Plait
//!
//! Chat-thread orchestration core for retrieval-augmented chat: branching
//! message history with a single active path, a streaming completion
//! lifecycle with tool-call follow-up, and idempotent context merging.
//!
//! ## Overview
//!
//! Plait manages the conversational state machine around an LLM without
//! owning any provider, search engine, or UI:
//!
//! - **Threads** hold a branching tree of completion keys; the walk along
//!   active pointers is what the user sees and what the model receives.
//! - **Completions** move through `Created → RequestBuilt → Streaming →
//!   Done`, with tool calls resolving into an auto-created follow-up turn.
//! - **Contexts** are shared sets of retrieved or attached references,
//!   merged idempotently as lookups and drops accumulate.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use plait::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo(invoker: Arc<dyn ModelInvoker>, search: Arc<dyn SearchCollection>) -> anyhow::Result<()> {
//! let mut plait = EngineBuilder::new()
//!     .invoker(invoker)
//!     .search_collection(search)
//!     .build()
//!     .await?;
//!
//! let thread = plait.threads.create(None);
//! plait
//!     .engine
//!     .send_user_message(thread, "What do my notes say about ownership?", None);
//! let key = thread.completion_keys().last().cloned().unwrap();
//! plait.engine.run(thread, &key, &StreamHandlers::none()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - **`plait-tree`**: branching thread tree with active-path resolution
//! - **`plait-llm`**: provider-agnostic model invoker contract
//! - **`plait-context`**: context entities and idempotent merging
//! - **`plait-actions`**: action registry and the semantic lookup action
//! - **`plait-thread`**: thread aggregate and the completion engine
//! - **`plait-store`**: save-queue persistence contracts

pub mod builder;
pub mod prelude;

pub use builder::{EngineBuilder, Plait};

pub use plait_llm::{
    replay_response, CompletionRequest, Content, EventStream, Message, ModelInvoker,
    ModelResponse, ModelSelection, RequestOptions, StreamEvent, Tool, ToolCall, ToolChoice,
};

pub use plait_tree::{Node, ThreadTree};

pub use plait_context::{parse_dropped_refs, Context, ContextEntry, ContextItem, ContextStore, DroppedPayload};

pub use plait_actions::{
    sort_by_size_adjusted_score, Action, ActionRegistry, LookupAction, LookupFilter, LookupSpec,
    SearchCollection, SearchHit, LOOKUP_ACTION_KEY,
};

pub use plait_thread::{
    expand_folder_tree_var, ActionCall, Completion, CompletionEngine, CompletionSeed,
    CompletionState, CompletionStore, ContextRenderer, FolderTreeSource, KeyListRenderer,
    SendModifier, StreamHandlers, Thread, ThreadCollection, ThreadSettings,
};

pub use plait_store::{MemoryPersister, NullPersister, Persister, SaveQueue, StoreError};
