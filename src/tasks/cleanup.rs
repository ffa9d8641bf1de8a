//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries so that
//! keys stored once and never looked up again do not pile up.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheCounters, TtlStore};

/// Spawns a background task that sweeps expired entries out of `store`.
///
/// The task holds only a weak reference, so it stops on its own once the
/// owning cache drops the store. It can also be aborted through the handle.
///
/// # Example
/// ```ignore
/// let store = Arc::new(TtlStore::new(Duration::from_secs(10)));
/// let handle = spawn_sweeper(Arc::downgrade(&store), counters, Duration::from_secs(60));
/// // Later, when the cache goes away:
/// handle.abort();
/// ```
pub(crate) fn spawn_sweeper(
    store: Weak<TtlStore>,
    counters: Arc<CacheCounters>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval = ?interval, "Starting TTL sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let Some(store) = store.upgrade() else {
                debug!("TTL sweep: cache dropped, stopping");
                break;
            };
            let removed = store.cleanup_expired();
            counters.record_swept(removed);

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }
    })
}
