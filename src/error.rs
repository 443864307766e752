//! Error types for the key/value store
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == KV Error Enum ==
/// Unified error type for the key/value store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KvError {
    /// The compare-and-swap predicate rejected the update
    #[error("CAS_COND_FAILED")]
    CasConditionFailed,

    /// A timeout descriptor was requested with a zero duration
    #[error("expires_after must be greater than zero")]
    NonPositiveExpiresAfter,

    /// The store was built outside of a Tokio runtime
    #[error("no Tokio runtime available to host the expiration task")]
    RuntimeUnavailable,
}

// == Result Type Alias ==
/// Convenience Result type for the key/value store.
pub type Result<T> = std::result::Result<T, KvError>;
