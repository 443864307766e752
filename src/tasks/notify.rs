//! Expiration Notification
//!
//! Hands batches of expired entries to the caller's `on_expire` callback.
//!
//! Batches run on the runtime's blocking pool, never on the thread that
//! holds the table lock, so a slow callback cannot stall the store. A panic
//! inside the callback is caught, logged and dropped; the rest of the batch
//! still runs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Callback invoked once per expired `(key, value)` pair.
pub type OnExpire<K, V> = Arc<dyn Fn(K, V) + Send + Sync>;

pub struct Notifier<K, V> {
    on_expire: Option<OnExpire<K, V>>,
    runtime: Handle,
}

impl<K, V> Notifier<K, V> {
    pub fn new(runtime: Handle, on_expire: Option<OnExpire<K, V>>) -> Self {
        Self { on_expire, runtime }
    }

    pub fn is_enabled(&self) -> bool {
        self.on_expire.is_some()
    }
}

impl<K, V> Notifier<K, V>
where
    K: Send + 'static,
    V: Send + 'static,
{
    /// Schedules the callback for every pair in `batch` and returns immediately.
    ///
    /// Pairs within a batch are delivered serially; separate batches may
    /// overlap.
    pub fn dispatch(&self, batch: Vec<(K, V)>) {
        let Some(on_expire) = self.on_expire.clone() else {
            return;
        };
        if batch.is_empty() {
            return;
        }

        debug!("Dispatching {} expiration notifications", batch.len());
        self.runtime.spawn_blocking(move || {
            for (key, value) in batch {
                let delivered = catch_unwind(AssertUnwindSafe(|| on_expire(key, value)));
                if delivered.is_err() {
                    warn!("on_expire callback panicked; notification dropped");
                }
            }
        });
    }
}
