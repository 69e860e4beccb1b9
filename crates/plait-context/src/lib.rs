//! Context entities and merge logic.
//!
//! A [`Context`] is a named set of reference items (vault paths, block
//! ids) with optional relevance scores, shared across completions by key.
//! Merging is an idempotent set-union: re-adding a present key updates its
//! metadata instead of duplicating it. The [`ContextStore`] owns the
//! canonical objects and the dirty-tracking save queue.

pub mod context;
pub mod dropped;
pub mod store;

pub use context::{Context, ContextEntry, ContextItem};
pub use dropped::{parse_dropped_refs, DroppedPayload};
pub use store::ContextStore;
