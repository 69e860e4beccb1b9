pub mod error;
pub mod persister;
pub mod save_queue;

pub use error::{Result, StoreError};
pub use persister::{MemoryPersister, NullPersister, Persister};
pub use save_queue::SaveQueue;
