//! Thread aggregate and completion lifecycle.
//!
//! A [`Thread`] owns a branching tree of completion keys and its settings;
//! the [`CompletionEngine`] drives each turn from construction through
//! request building, streaming, tool-call resolution, and persistence
//! queueing. Collaborators (model invoker, action registry, stores) are
//! injected — nothing reaches for globals.

pub mod collection;
pub mod completion;
pub mod engine;
pub mod folder_tree;
pub mod language;
pub mod request;
pub mod settings;
pub mod thread;

pub use collection::ThreadCollection;
pub use completion::{ActionCall, Completion, CompletionState, CompletionStore};
pub use engine::{CompletionEngine, CompletionSeed, StreamHandlers};
pub use folder_tree::{expand_folder_tree_var, FolderTreeSource, FOLDER_TREE_VAR};
pub use language::{contains_self_referential_keywords, initial_message, language_options};
pub use request::{build_request_messages, ContextRenderer, KeyListRenderer};
pub use settings::{SendModifier, ThreadSettings};
pub use thread::Thread;
