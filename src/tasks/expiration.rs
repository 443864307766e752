//! Expiration Task
//!
//! Background task that removes expired entries and reports them to the
//! store's `on_expire` callback.
//!
//! The task sleeps for the configured expiration interval, or less when an
//! entry is due sooner. It wakes early when a write queues a deadline earlier
//! than anything pending, and exits on `stop` or once the last store handle
//! is dropped.

use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::Shared;
use crate::config::Config;

/// Spawns the expiration task on `runtime`.
///
/// # Arguments
/// * `shared` - Weak reference to the store state, so the task never keeps
///   a dropped store alive
/// * `wake` - Raised by writes that queue a new earliest deadline
/// * `shutdown` - Flips to `true` when the store is stopped
/// * `config` - Base interval and adaptive sleep floor
///
/// # Returns
/// A JoinHandle for the spawned task.
pub(crate) fn spawn_expiration_task<K, V>(
    runtime: &Handle,
    shared: Weak<Shared<K, V>>,
    wake: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
    config: Config,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    runtime.spawn(async move {
        info!(
            "Starting expiration task with interval of {:?}",
            config.expiration_interval
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            // Hold the strong reference only for the sweep itself.
            let pause = match shared.upgrade() {
                Some(state) => {
                    let sweep = state.sweep();
                    if sweep.expired > 0 {
                        debug!("Expiration sweep: removed {} entries", sweep.expired);
                    }
                    next_pause(sweep.next_deadline, &config, Instant::now())
                }
                None => break,
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = wake.notified() => {
                    debug!("Expiration task woken by an earlier deadline");
                }
                changed = shutdown.changed() => {
                    // Err means every store handle is gone.
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Expiration task stopped");
    })
}

// == Next Pause ==
/// Time to sleep before the next sweep.
///
/// With a pending deadline the pause is the time left until it, clamped to
/// `[min_wake_interval, expiration_interval]`. Otherwise the full interval.
pub(crate) fn next_pause(next_deadline: Option<Instant>, config: &Config, now: Instant) -> Duration {
    match next_deadline {
        Some(deadline) => deadline
            .saturating_duration_since(now)
            .clamp(config.min_wake_interval, config.expiration_interval),
        None => config.expiration_interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::{KvStore, PutOptions};

    fn config(interval_ms: u64) -> Config {
        Config::default()
            .with_expiration_interval(Duration::from_millis(interval_ms))
            .with_min_wake_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_next_pause_without_pending_deadline() {
        let config = config(200);
        assert_eq!(
            next_pause(None, &config, Instant::now()),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_next_pause_shrinks_to_deadline() {
        let config = config(200);
        let now = Instant::now();
        let pause = next_pause(Some(now + Duration::from_millis(40)), &config, now);
        assert_eq!(pause, Duration::from_millis(40));
    }

    #[test]
    fn test_next_pause_is_clamped() {
        let config = Config::default()
            .with_expiration_interval(Duration::from_millis(200))
            .with_min_wake_interval(Duration::from_millis(5));
        let now = Instant::now();

        // Deadline already reached: never busy-wake below the floor.
        assert_eq!(next_pause(Some(now), &config, now), Duration::from_millis(5));
        // Deadline far away: never sleep past the base interval.
        assert_eq!(
            next_pause(Some(now + Duration::from_secs(60)), &config, now),
            Duration::from_millis(200)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_task_removes_expired_entries() {
        let store: KvStore<String, String> = KvStore::new(config(1000)).unwrap();

        store
            .put(
                "expire_soon".to_string(),
                "value".to_string(),
                PutOptions::new().expires_after(Duration::from_millis(20)),
            )
            .unwrap();

        // The write queued the earliest deadline, so the task wakes well
        // before its one-second base interval.
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(store.len(), 0, "Expired entry should have been swept");
        assert_eq!(store.stats().expirations, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_task_preserves_valid_entries() {
        let store: KvStore<String, String> = KvStore::new(config(10)).unwrap();

        store
            .put(
                "long_lived".to_string(),
                "value".to_string(),
                PutOptions::new().expires_after(Duration::from_secs(3600)),
            )
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&"long_lived".to_string()), Some("value".to_string()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stopped_task_no_longer_sweeps() {
        let expired = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&expired);
        let store = KvStore::with_on_expire(config(10), move |_: &'static str, _: u8| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        store.stop();
        store.stop();
        tokio::time::sleep(Duration::from_millis(20)).await;

        store
            .put("k", 1, PutOptions::new().expires_after(Duration::from_millis(5)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(store.is_stopped());
        assert_eq!(store.len(), 1, "Stopped task must not remove entries");
        assert_eq!(expired.load(Ordering::SeqCst), 0);

        // Reads still observe expiry on their own.
        assert_eq!(store.get(&"k"), None);
    }
}
