//! Cache Store Module
//!
//! Entry table plus timeout heap behind one lock, and the `KvStore` handle
//! callers use to reach them.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};

use crate::cache::entry::{Entry, Timeout};
use crate::cache::options::PutOptions;
use crate::cache::stats::CacheStats;
use crate::cache::timeout_heap::TimeoutHeap;
use crate::config::Config;
use crate::error::{KvError, Result};
use crate::tasks::{spawn_expiration_task, Notifier, OnExpire};

// == Lookup ==
/// Outcome of reading a key from the table.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Lookup<K, V> {
    Hit(V),
    Miss,
    /// The entry had expired and was removed by the read
    Expired(K, V),
}

/// Outcome of a compare-and-swap against the table.
pub(crate) struct CasOutcome<K, V> {
    pub result: Result<()>,
    /// Expired entry evicted before the predicate ran
    pub expired: Option<(K, V)>,
    pub wake: bool,
}

/// Result of draining the timeout heap.
#[derive(Debug)]
pub(crate) struct Drain<K, V> {
    pub expired: Vec<(K, V)>,
    /// Deadline of the earliest live entry that has not expired yet
    pub next_deadline: Option<Instant>,
}

// == Table ==
/// Key to entry map and its expiry index. Every method runs under the store lock.
#[derive(Debug)]
pub(crate) struct Table<K, V> {
    entries: HashMap<K, Entry<V>>,
    heap: TimeoutHeap<K>,
    next_timeout_id: u64,
    stats: CacheStats,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            heap: TimeoutHeap::new(),
            next_timeout_id: 0,
            stats: CacheStats::new(),
        }
    }

    fn new_timeout(&mut self, expires_after: Option<Duration>, sliding: bool) -> Result<Option<Timeout>> {
        match expires_after {
            Some(expires_after) => {
                self.next_timeout_id += 1;
                Timeout::new(self.next_timeout_id, expires_after, sliding).map(Some)
            }
            None => Ok(None),
        }
    }

    // == Insert ==
    /// Inserts or replaces `key`. Returns true when the new entry's deadline
    /// is earlier than anything already queued.
    pub fn insert(
        &mut self,
        key: K,
        value: V,
        expires_after: Option<Duration>,
        sliding: bool,
    ) -> Result<bool> {
        let timeout = self.new_timeout(expires_after, sliding)?;

        let mut earliest = false;
        if let Some(timeout) = &timeout {
            earliest = self
                .heap
                .next_deadline()
                .map_or(true, |deadline| timeout.expires_at() < deadline);
            self.heap.push(key.clone(), timeout);
        }

        self.entries.insert(key, Entry::new(value, timeout));
        Ok(earliest)
    }

    // == Get ==
    /// Reads `key`, sliding its timeout on a hit and evicting it if expired.
    pub fn get(&mut self, key: &K) -> Lookup<K, V> {
        if let Some((key, value)) = self.evict_if_expired(key) {
            self.stats.record_miss();
            return Lookup::Expired(key, value);
        }

        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.slide();
                self.stats.record_hit();
                Lookup::Hit(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                Lookup::Miss
            }
        }
    }

    // == Compare And Swap ==
    /// Applies `value` only if `predicate` accepts the current value.
    ///
    /// An existing entry keeps its timeout (slid, not replaced); expiration
    /// options only apply when the key is created.
    ///
    /// An entry that has expired but was not swept yet is evicted before the
    /// predicate runs, even when the predicate then rejects the write. The
    /// eviction is the same one a read would perform and is reported in
    /// `CasOutcome::expired`.
    pub fn cas<F>(
        &mut self,
        key: K,
        value: V,
        predicate: F,
        expires_after: Option<Duration>,
        sliding: bool,
    ) -> CasOutcome<K, V>
    where
        F: FnOnce(Option<&V>) -> bool,
    {
        let expired = self.evict_if_expired(&key);

        if !predicate(self.entries.get(&key).map(|entry| &entry.value)) {
            self.stats.record_cas_failure();
            return CasOutcome {
                result: Err(KvError::CasConditionFailed),
                expired,
                wake: false,
            };
        }

        let inserted = match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.slide();
                entry.value = value;
                Ok(false)
            }
            None => self.insert(key, value, expires_after, sliding),
        };

        match inserted {
            Ok(wake) => CasOutcome {
                result: Ok(()),
                expired,
                wake,
            },
            Err(err) => CasOutcome {
                result: Err(err),
                expired,
                wake: false,
            },
        }
    }

    pub fn take(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn delete(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Remaining lifetime of a live entry with a timeout.
    pub fn ttl(&self, key: &K) -> Option<Duration> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            return None;
        }
        entry.timeout.as_ref().map(Timeout::remaining)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Live deadline of `key`, read without sliding or evicting.
    #[cfg(test)]
    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.entries
            .get(key)
            .and_then(|entry| entry.timeout.as_ref())
            .map(Timeout::expires_at)
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    fn evict_if_expired(&mut self, key: &K) -> Option<(K, V)> {
        let is_expired = self.entries.get(key).map_or(false, Entry::is_expired);
        if !is_expired {
            return None;
        }
        let (key, entry) = self.entries.remove_entry(key)?;
        self.stats.record_expirations(1);
        Some((key, entry.value))
    }

    // == Drain Expired ==
    /// Pops every expired entry off the heap and out of the table.
    ///
    /// Heap nodes are checked against the table before anything is removed:
    /// nodes whose key is gone or whose descriptor was replaced are dropped,
    /// and nodes whose descriptor slid are re-queued at the live deadline.
    pub fn drain_expired(&mut self, now: Instant) -> Drain<K, V> {
        let mut expired = Vec::new();

        let next_deadline = loop {
            let (queued_at, live) = match self.heap.peek() {
                Some(node) => {
                    let live = self
                        .entries
                        .get(&node.key)
                        .and_then(|entry| entry.timeout.as_ref())
                        .filter(|timeout| node.tracks(timeout))
                        .map(Timeout::expires_at);
                    (node.deadline, live)
                }
                None => break None,
            };

            match live {
                // Stale: key deleted, taken, or replaced.
                None => {
                    self.heap.pop();
                }
                Some(deadline) if deadline > queued_at => {
                    if let Some(node) = self.heap.pop() {
                        self.heap.requeue(node, deadline);
                    }
                }
                // Expiry is strict: live until the clock passes the deadline.
                Some(deadline) if now <= deadline => break Some(deadline),
                Some(_) => {
                    if let Some(node) = self.heap.pop() {
                        if let Some((key, entry)) = self.entries.remove_entry(&node.key) {
                            expired.push((key, entry.value));
                        }
                    }
                }
            }
        };

        self.stats.record_expirations(expired.len());
        Drain {
            expired,
            next_deadline,
        }
    }
}

// == Shared State ==
/// State shared by every `KvStore` handle and the expiration task.
pub(crate) struct Shared<K, V> {
    table: Mutex<Table<K, V>>,
    notifier: Notifier<K, V>,
    shutdown: watch::Sender<bool>,
    wake: Arc<Notify>,
}

/// Counts reported by one sweep of the timeout heap.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sweep {
    pub expired: usize,
    pub next_deadline: Option<Instant>,
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Drains expired entries under the lock, then notifies outside it.
    pub fn sweep(&self) -> Sweep {
        let drain = self.table.lock().drain_expired(Instant::now());
        let sweep = Sweep {
            expired: drain.expired.len(),
            next_deadline: drain.next_deadline,
        };
        self.notifier.dispatch(drain.expired);
        sweep
    }
}

// == KV Store ==
/// Concurrent key/value store with absolute and sliding expiration.
///
/// Cloning the handle is cheap; all clones share one table. A background
/// Tokio task removes expired entries and feeds them to the optional
/// `on_expire` callback. It runs until [`KvStore::stop`] is called or every
/// handle is dropped.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use tinykv::{Config, KvStore, PutOptions};
///
/// #[tokio::main]
/// async fn main() -> tinykv::Result<()> {
///     let store = KvStore::new(Config::default())?;
///
///     store.put("session", 42, PutOptions::new().expires_after(Duration::from_secs(60)))?;
///     assert_eq!(store.get(&"session"), Some(42));
///
///     store.stop();
///     Ok(())
/// }
/// ```
pub struct KvStore<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> Clone for KvStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> fmt::Debug for KvStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore")
            .field("notifications", &self.shared.notifier.is_enabled())
            .field("stopped", &*self.shared.shutdown.borrow())
            .finish_non_exhaustive()
    }
}

impl<K, V> KvStore<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates a store without expiration notifications.
    ///
    /// Must be called from within a Tokio runtime, which hosts the
    /// expiration task and the notification pool.
    pub fn new(config: Config) -> Result<Self> {
        Self::build(config, None)
    }

    /// Creates a store that calls `on_expire` for each entry removed because
    /// its timeout elapsed.
    pub fn with_on_expire<F>(config: Config, on_expire: F) -> Result<Self>
    where
        F: Fn(K, V) + Send + Sync + 'static,
    {
        let on_expire: OnExpire<K, V> = Arc::new(on_expire);
        Self::build(config, Some(on_expire))
    }

    fn build(config: Config, on_expire: Option<OnExpire<K, V>>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| KvError::RuntimeUnavailable)?;
        let config = config.normalized();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());

        let shared = Arc::new(Shared {
            table: Mutex::new(Table::new()),
            notifier: Notifier::new(runtime.clone(), on_expire),
            shutdown,
            wake: Arc::clone(&wake),
        });

        spawn_expiration_task(&runtime, Arc::downgrade(&shared), wake, shutdown_rx, config);

        Ok(Self { shared })
    }

    // == Get ==
    /// Returns a copy of the value for `key`.
    ///
    /// A hit renews a sliding timeout. An expired entry counts as a miss: it
    /// is removed and reported to `on_expire`.
    pub fn get(&self, key: &K) -> Option<V> {
        let lookup = self.shared.table.lock().get(key);
        match lookup {
            Lookup::Hit(value) => Some(value),
            Lookup::Miss => None,
            Lookup::Expired(key, value) => {
                self.shared.notifier.dispatch(vec![(key, value)]);
                None
            }
        }
    }

    // == Put ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// When `options` carries a CAS predicate the write behaves exactly like
    /// [`KvStore::cas`] and may fail with [`KvError::CasConditionFailed`].
    pub fn put(&self, key: K, value: V, mut options: PutOptions<'_, V>) -> Result<()> {
        if let Some(predicate) = options.take_cas() {
            return self.cas(key, value, predicate, options);
        }

        let wake = self
            .shared
            .table
            .lock()
            .insert(key, value, options.expiration(), options.is_sliding())?;
        if wake {
            self.shared.wake.notify_one();
        }
        Ok(())
    }

    // == Compare And Swap ==
    /// Stores `value` only if `predicate` accepts the current value.
    ///
    /// The predicate sees `None` when the key is absent. On an existing key
    /// the value is swapped in place and the entry keeps its original timeout
    /// policy; expiration options are only applied when the key is created.
    /// A CAS predicate inside `options` is ignored.
    ///
    /// An expired entry still awaiting the sweep is removed and reported to
    /// `on_expire` first, so the predicate sees `None`. That removal stands
    /// even if the predicate rejects the write.
    pub fn cas<F>(&self, key: K, value: V, predicate: F, options: PutOptions<'_, V>) -> Result<()>
    where
        F: FnOnce(Option<&V>) -> bool,
    {
        let outcome = self.shared.table.lock().cas(
            key,
            value,
            predicate,
            options.expiration(),
            options.is_sliding(),
        );

        if let Some(expired) = outcome.expired {
            self.shared.notifier.dispatch(vec![expired]);
        }
        if outcome.wake {
            self.shared.wake.notify_one();
        }
        outcome.result
    }

    // == Delete ==
    /// Removes `key` if present.
    pub fn delete(&self, key: &K) {
        self.shared.table.lock().delete(key);
    }

    // == Take ==
    /// Removes `key` and returns its value. No expiry check, no notification.
    pub fn take(&self, key: &K) -> Option<V> {
        self.shared.table.lock().take(key)
    }

    /// Remaining lifetime of `key`. `None` if the key is absent, expired, or
    /// never expires. Does not renew sliding timeouts.
    pub fn ttl(&self, key: &K) -> Option<Duration> {
        self.shared.table.lock().ttl(key)
    }

    // == Purge Expired ==
    /// Runs one expiration sweep on the calling thread.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        self.shared.sweep().expired
    }

    // == Stop ==
    /// Stops the background expiration task. Idempotent.
    ///
    /// Synchronous operations keep working afterwards; expired entries are
    /// then only removed by reads or [`KvStore::purge_expired`].
    pub fn stop(&self) {
        self.shared.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.table.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.shared.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
