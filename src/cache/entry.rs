//! Cache Entry Module
//!
//! Defines the cached response snapshot and its timed wrapper inside the store.

use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

// == Cached Entry ==
/// An immutable snapshot of a response that may be replayed.
///
/// The header map is an independent copy taken when the capture started, so
/// later mutations of the live response never reach the stored entry.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    /// Status code of the captured response
    pub status: StatusCode,
    /// Header snapshot of the captured response
    pub headers: HeaderMap,
    /// Full response body, never larger than `maxEntryBytes`
    pub body: Bytes,
}

impl CachedEntry {
    /// Creates a new entry from a status, header snapshot and body.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

// == Timed Entry ==
/// A cached entry together with the instant it stops being servable.
#[derive(Debug, Clone)]
pub(crate) struct TimedEntry {
    pub(crate) entry: CachedEntry,
    pub(crate) expires_at: Instant,
}

/// Cap applied to lifetimes too long for the platform clock.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

impl TimedEntry {
    pub(crate) fn new(entry: CachedEntry, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self { entry, expires_at }
    }

    // == Is Expired ==
    /// An entry is expired once the current instant reaches its expiry.
    pub(crate) fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use std::thread::sleep;

    fn sample_entry() -> CachedEntry {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        CachedEntry::new(StatusCode::OK, headers, "hello")
    }

    #[test]
    fn test_entry_creation() {
        let entry = sample_entry();

        assert_eq!(entry.status, StatusCode::OK);
        assert_eq!(entry.headers[CONTENT_TYPE], "text/plain");
        assert_eq!(&entry.body[..], b"hello");
    }

    #[test]
    fn test_timed_entry_not_expired() {
        let timed = TimedEntry::new(sample_entry(), Duration::from_secs(60));
        assert!(!timed.is_expired());
    }

    #[test]
    fn test_timed_entry_expiration() {
        let timed = TimedEntry::new(sample_entry(), Duration::from_millis(20));

        assert!(!timed.is_expired());
        sleep(Duration::from_millis(30));
        assert!(timed.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let timed = TimedEntry::new(sample_entry(), Duration::from_secs(1));

        // Expired exactly at the expiry instant, not one tick later
        assert!(timed.is_expired_at(timed.expires_at));
        assert!(!timed.is_expired_at(timed.expires_at - Duration::from_millis(1)));
    }

    #[test]
    fn test_huge_ttl_saturates_instead_of_overflowing() {
        let timed = TimedEntry::new(sample_entry(), Duration::from_secs(i64::MAX as u64));
        assert!(!timed.is_expired());

        let timed = TimedEntry::new(sample_entry(), Duration::MAX);
        assert!(!timed.is_expired());
    }
}
