//! Memory Cache Module
//!
//! The two entry points the pipeline calls: `load` before forwarding a
//! request and `store` once the upstream response head is known.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::capture::BodyCapture;
use crate::cache::policy::AdmissionPolicy;
use crate::cache::stats::{CacheCounters, CacheStats};
use crate::cache::store::TtlStore;
use crate::cache::TAG_CACHE_LOAD;
use crate::config::CacheSpec;
use crate::context::{HttpContext, Request};
use crate::tasks::spawn_sweeper;

const CLEANUP_INTERVAL_FACTOR: u32 = 2;
const CLEANUP_INTERVAL_MIN: Duration = Duration::from_secs(60);

// == Memory Cache ==
/// In-process response cache owned by one pipeline filter.
///
/// Each instance holds its own store; nothing is shared across instances.
/// Dropping the cache stops its background sweep.
#[derive(Debug)]
pub struct MemoryCache {
    policy: AdmissionPolicy,
    max_entry_bytes: usize,
    store: Arc<TtlStore>,
    counters: Arc<CacheCounters>,
    sweeper: Option<JoinHandle<()>>,
}

impl MemoryCache {
    // == Constructor ==
    /// Builds the cache from `spec`.
    ///
    /// Never fails: a malformed expiration falls back to the default. The
    /// sweep is spawned on the current tokio runtime when there is one;
    /// expiry on lookup holds either way.
    pub fn new(spec: &CacheSpec) -> Self {
        let expiration = spec.expiration_or_default();
        let store = Arc::new(TtlStore::new(expiration));
        let counters = Arc::new(CacheCounters::default());

        let sweeper = match Handle::try_current() {
            Ok(_) => Some(spawn_sweeper(
                Arc::downgrade(&store),
                Arc::clone(&counters),
                sweep_interval(expiration),
            )),
            Err(_) => {
                debug!("no tokio runtime, TTL sweep disabled");
                None
            }
        };

        Self {
            policy: spec.admission_policy(),
            max_entry_bytes: spec.max_entry_bytes as usize,
            store,
            counters,
            sweeper,
        }
    }

    // == Key ==
    /// Derives the cache key for `request`.
    ///
    /// `METHOD scheme://host/path`: method tokens and hosts never contain a
    /// space or `/`, so distinct tuples cannot produce the same key.
    pub fn key(request: &Request) -> String {
        format!(
            "{} {}://{}{}",
            request.method(),
            request.scheme(),
            request.host(),
            request.path()
        )
    }

    // == Load ==
    /// Tries to answer `ctx` from the cache.
    ///
    /// On a hit the stored status, headers and body are written onto the
    /// response and the request is tagged `cacheLoad`. Otherwise the context
    /// is left untouched.
    pub fn load(&self, ctx: &mut HttpContext) -> bool {
        if !self.policy.admits_load(ctx.request()) {
            return false;
        }

        let key = Self::key(ctx.request());
        let Some(entry) = self.store.get(&key) else {
            self.counters.record_miss();
            return false;
        };

        self.counters.record_hit();
        debug!(key = %key, status = %entry.status, "cache hit");

        let response = ctx.response_mut();
        response.set_status(entry.status);
        response.add_headers_from(&entry.headers);
        response.set_body(entry.body);
        ctx.add_tag(TAG_CACHE_LOAD);

        true
    }

    // == Store ==
    /// Arranges for the response in `ctx` to be cached once fully sent.
    ///
    /// Registers a capture on the response body when the exchange passes the
    /// admission policy; does not wait for the body.
    pub fn store(&self, ctx: &mut HttpContext) {
        if !self.policy.admits_store(ctx.request(), ctx.response()) {
            return;
        }

        let capture = BodyCapture::new(
            Arc::clone(&self.store),
            Arc::clone(&self.counters),
            ctx.tags().clone(),
            Self::key(ctx.request()),
            ctx.response().status(),
            ctx.response().headers().clone(),
            self.max_entry_bytes,
        );
        ctx.response_mut().on_flush_body(capture);
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.store.len())
    }

    /// Lifetime given to stored entries.
    pub fn expiration(&self) -> Duration {
        self.store.expiration()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Drop for MemoryCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// Sweeps run at twice the entry lifetime, but never more than once a minute.
pub(crate) fn sweep_interval(expiration: Duration) -> Duration {
    cmp::max(
        expiration.saturating_mul(CLEANUP_INTERVAL_FACTOR),
        CLEANUP_INTERVAL_MIN,
    )
}
