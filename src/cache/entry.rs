//! Cache Entry Module
//!
//! Defines table entries and the timeout descriptor that governs their expiry.

use std::time::{Duration, Instant};

use crate::error::{KvError, Result};

/// Cap for deadlines the platform clock cannot represent (about 100 years).
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + expires_after`, saturating at [`FAR_FUTURE`] when the sum overflows.
fn deadline_after(now: Instant, expires_after: Duration) -> Instant {
    now.checked_add(expires_after)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

// == Timeout Descriptor ==
/// Expiration metadata attached to an entry.
///
/// The `id` identifies this descriptor among all descriptors the store has
/// created. Heap nodes carry the id so the expiration sweep can tell whether
/// the table still holds the descriptor the node was queued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeout {
    id: u64,
    expires_after: Duration,
    sliding: bool,
    expires_at: Instant,
}

impl Timeout {
    // == Constructor ==
    /// Creates a descriptor that expires `expires_after` from now.
    ///
    /// A zero duration is rejected: an entry without expiration simply has
    /// no descriptor.
    pub fn new(id: u64, expires_after: Duration, sliding: bool) -> Result<Self> {
        if expires_after.is_zero() {
            return Err(KvError::NonPositiveExpiresAfter);
        }

        Ok(Self {
            id,
            expires_after,
            sliding,
            expires_at: deadline_after(Instant::now(), expires_after),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn expires_after(&self) -> Duration {
        self.expires_after
    }

    pub fn is_sliding(&self) -> bool {
        self.sliding
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    // == Time Remaining ==
    /// Returns the time left before expiry, or zero once the deadline passed.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    fn renew(&mut self) {
        if !self.sliding || self.expires_after.is_zero() {
            return;
        }
        let renewed = deadline_after(Instant::now(), self.expires_after);
        // Never move the deadline backwards.
        if renewed > self.expires_at {
            self.expires_at = renewed;
        }
    }

    fn is_past(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

// == Slide ==
/// Renews a sliding descriptor. Absent and non-sliding descriptors are left alone.
pub fn slide(timeout: Option<&mut Timeout>) {
    if let Some(timeout) = timeout {
        timeout.renew();
    }
}

// == Expired ==
/// Checks whether a descriptor has expired.
///
/// Boundary condition: expiry is strict. An entry sitting exactly on its
/// deadline is still live; it expires once the clock moves past it.
pub fn expired(timeout: Option<&Timeout>) -> bool {
    expired_at(timeout, Instant::now())
}

/// Same as [`expired`] against a caller-supplied clock reading.
pub fn expired_at(timeout: Option<&Timeout>, now: Instant) -> bool {
    timeout.map_or(false, |t| t.is_past(now))
}

// == Entry ==
/// A single table entry: the stored value and its optional timeout.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    pub value: V,
    pub timeout: Option<Timeout>,
}

impl<V> Entry<V> {
    pub fn new(value: V, timeout: Option<Timeout>) -> Self {
        Self { value, timeout }
    }

    /// Returns true if the entry has a descriptor whose deadline has passed.
    pub fn is_expired(&self) -> bool {
        expired(self.timeout.as_ref())
    }

    /// Renews the entry's descriptor if it is sliding.
    pub fn slide(&mut self) {
        slide(self.timeout.as_mut());
    }
}
