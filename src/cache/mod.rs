//! Cache Module
//!
//! In-process HTTP response cache: admission policy, streaming body capture
//! and a TTL store with background sweeping.

mod capture;
mod entry;
mod memory;
mod policy;
mod stats;
mod store;


// Re-export public types
pub use capture::BodyCapture;
pub use entry::CachedEntry;
pub use memory::MemoryCache;
pub use policy::AdmissionPolicy;
pub use stats::CacheStats;
pub use store::TtlStore;

pub(crate) use stats::CacheCounters;

// == Public Constants ==
/// Tag attached to a request answered from the cache
pub const TAG_CACHE_LOAD: &str = "cacheLoad";

/// Tag attached to a request whose response was committed to the cache
pub const TAG_CACHE_STORE: &str = "cacheStore";
