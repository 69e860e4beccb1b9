//! Action registry and the built-in lookup action.
//!
//! Actions are in-process tools: each describes itself to the model as a
//! [`plait_llm::Tool`] and executes against JSON parameters. The registry
//! offers the definitions for auto tool choice and routes calls by name.

pub mod lookup;
pub mod registry;
pub mod search;

pub use lookup::{normalize_hypotheticals, LookupAction, LOOKUP_ACTION_KEY};
pub use registry::{Action, ActionRegistry};
pub use search::{sort_by_size_adjusted_score, LookupFilter, LookupSpec, SearchCollection, SearchHit};
