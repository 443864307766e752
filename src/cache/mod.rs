//! Cache Module
//!
//! Provides the expiration-aware key/value table and its public handle.

mod entry;
mod options;
mod stats;
mod store;
mod timeout_heap;


// Re-export public types
pub use entry::{expired, slide, Entry, Timeout};
pub use options::{CasPredicate, PutOptions};
pub use stats::CacheStats;
pub use store::KvStore;
pub use timeout_heap::{TimeoutHeap, TimeoutNode};

pub(crate) use store::Shared;
