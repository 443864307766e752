//! Put Options Module
//!
//! Per-write options recognized by `put` and `cas`.

use std::fmt;
use std::time::Duration;

/// Predicate deciding whether a compare-and-swap may proceed.
///
/// Receives the current value, or `None` when the key is absent.
pub type CasPredicate<'a, V> = Box<dyn FnOnce(Option<&V>) -> bool + 'a>;

// == Put Options ==
/// Options for a single write. Setters may be chained in any order.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use tinykv::PutOptions;
///
/// let options: PutOptions<'_, String> = PutOptions::new()
///     .sliding(true)
///     .expires_after(Duration::from_secs(5));
/// assert!(options.is_sliding());
/// ```
pub struct PutOptions<'a, V> {
    expires_after: Duration,
    sliding: bool,
    cas: Option<CasPredicate<'a, V>>,
}

impl<'a, V> PutOptions<'a, V> {
    pub fn new() -> Self {
        Self {
            expires_after: Duration::ZERO,
            sliding: false,
            cas: None,
        }
    }

    /// Entry expires after this duration. Zero means it never expires.
    pub fn expires_after(mut self, expires_after: Duration) -> Self {
        self.expires_after = expires_after;
        self
    }

    /// Whether each successful read renews the expiration.
    pub fn sliding(mut self, sliding: bool) -> Self {
        self.sliding = sliding;
        self
    }

    /// Turns the write into a compare-and-swap guarded by `predicate`.
    pub fn cas<F>(mut self, predicate: F) -> Self
    where
        F: FnOnce(Option<&V>) -> bool + 'a,
    {
        self.cas = Some(Box::new(predicate));
        self
    }

    pub fn expiration(&self) -> Option<Duration> {
        (!self.expires_after.is_zero()).then_some(self.expires_after)
    }

    pub fn is_sliding(&self) -> bool {
        self.sliding
    }

    pub fn has_cas(&self) -> bool {
        self.cas.is_some()
    }

    pub(crate) fn take_cas(&mut self) -> Option<CasPredicate<'a, V>> {
        self.cas.take()
    }
}

impl<V> Default for PutOptions<'_, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for PutOptions<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutOptions")
            .field("expires_after", &self.expires_after)
            .field("sliding", &self.sliding)
            .field("cas", &self.cas.is_some())
            .finish()
    }
}
