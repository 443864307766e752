//! tinykv - An embedded key/value cache with expiring entries
//!
//! Provides a concurrent in-process store with absolute and sliding TTLs,
//! compare-and-swap writes and asynchronous expiration callbacks.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{CacheStats, KvStore, PutOptions};
pub use config::Config;
pub use error::{KvError, Result};
