//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust
//! use plait::prelude::*;
//! ```

pub use crate::{
    Action, ActionCall, ActionRegistry, Completion, CompletionEngine, CompletionRequest,
    CompletionSeed, CompletionState, CompletionStore, Content, Context, ContextEntry,
    ContextRenderer, ContextStore, EngineBuilder, FolderTreeSource, LookupAction, LookupSpec,
    Message, ModelInvoker, ModelResponse, ModelSelection, Persister, Plait, SearchCollection,
    SearchHit, StreamEvent, StreamHandlers, Thread, ThreadCollection, ThreadSettings, ThreadTree,
    Tool, ToolCall, ToolChoice,
};
