//! Streaming Capture Module
//!
//! Accumulates a response body while it streams to the client and commits
//! it to the store on the final chunk, unless it outgrew the size ceiling.

use std::mem;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use tracing::debug;

use crate::cache::entry::CachedEntry;
use crate::cache::stats::CacheCounters;
use crate::cache::store::TtlStore;
use crate::cache::TAG_CACHE_STORE;
use crate::context::{BodyObserver, Tags};

// == Body Capture ==
/// Side-channel tap collecting one response body for the cache.
///
/// Owned by a single response, so the buffer needs no locking. Chunks are
/// passed back untouched.
#[derive(Debug)]
pub struct BodyCapture {
    store: Arc<TtlStore>,
    counters: Arc<CacheCounters>,
    tags: Tags,
    key: String,
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    seen: usize,
    max_entry_bytes: usize,
    state: CaptureState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Accumulating,
    Abandoned,
    Committed,
}

impl BodyCapture {
    pub(crate) fn new(
        store: Arc<TtlStore>,
        counters: Arc<CacheCounters>,
        tags: Tags,
        key: String,
        status: StatusCode,
        headers: HeaderMap,
        max_entry_bytes: usize,
    ) -> Self {
        Self {
            store,
            counters,
            tags,
            key,
            status,
            headers,
            body: BytesMut::new(),
            seen: 0,
            max_entry_bytes,
            state: CaptureState::Accumulating,
        }
    }

    /// Bytes observed so far, including any past the ceiling.
    pub fn bytes_seen(&self) -> usize {
        self.seen
    }

    pub fn is_abandoned(&self) -> bool {
        self.state == CaptureState::Abandoned
    }

    pub fn is_committed(&self) -> bool {
        self.state == CaptureState::Committed
    }

    fn commit(&mut self) {
        let entry = CachedEntry::new(
            self.status,
            mem::take(&mut self.headers),
            self.body.split().freeze(),
        );
        debug!(key = %self.key, bytes = entry.body.len(), "cache store");
        self.store.put(mem::take(&mut self.key), entry);
        self.counters.record_store();
        self.tags.add(TAG_CACHE_STORE);
        self.state = CaptureState::Committed;
    }
}

impl BodyObserver for BodyCapture {
    fn on_flush(&mut self, chunk: Bytes, complete: bool) -> Bytes {
        if self.state != CaptureState::Accumulating {
            return chunk;
        }

        self.seen = self.seen.saturating_add(chunk.len());
        if self.seen > self.max_entry_bytes {
            debug!(
                key = %self.key,
                limit = self.max_entry_bytes,
                "response body exceeds cache entry limit, not caching"
            );
            self.state = CaptureState::Abandoned;
            self.body = BytesMut::new();
            self.counters.record_skipped();
            return chunk;
        }

        self.body.extend_from_slice(&chunk);
        if complete {
            self.commit();
        }

        chunk
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::header_map;
    use std::time::Duration;

    const KEY: &str = "GET https://example.com/a";

    fn capture(max_entry_bytes: usize) -> (BodyCapture, Arc<TtlStore>, Arc<CacheCounters>, Tags) {
        let store = Arc::new(TtlStore::new(Duration::from_secs(10)));
        let counters = Arc::new(CacheCounters::default());
        let tags = Tags::default();
        let capture = BodyCapture::new(
            Arc::clone(&store),
            Arc::clone(&counters),
            tags.clone(),
            KEY.to_string(),
            StatusCode::OK,
            header_map([("content-type", "text/plain")]),
            max_entry_bytes,
        );
        (capture, store, counters, tags)
    }

    #[test]
    fn test_chunks_pass_through_unchanged() {
        let (mut capture, _, _, _) = capture(1024);

        let chunk = Bytes::from_static(b"hello");
        let sent = capture.on_flush(chunk.clone(), false);

        assert_eq!(sent, chunk);
        assert_eq!(capture.bytes_seen(), 5);
    }

    #[test]
    fn test_commit_on_final_chunk() {
        let (mut capture, store, counters, tags) = capture(1024);

        capture.on_flush(Bytes::from_static(b"hel"), false);
        assert!(store.get(KEY).is_none(), "nothing is stored before the end");
        capture.on_flush(Bytes::from_static(b"lo"), true);

        let entry = store.get(KEY).unwrap();
        assert_eq!(entry.status, StatusCode::OK);
        assert_eq!(entry.headers["content-type"], "text/plain");
        assert_eq!(&entry.body[..], b"hello");
        assert!(capture.is_committed());
        assert!(tags.contains(TAG_CACHE_STORE));
        assert_eq!(counters.snapshot(store.len()).stores, 1);
    }

    #[test]
    fn test_empty_body_commits() {
        let (mut capture, store, _, _) = capture(1024);

        capture.on_flush(Bytes::new(), true);

        assert!(store.get(KEY).unwrap().body.is_empty());
    }

    #[test]
    fn test_exactly_max_bytes_is_stored() {
        let (mut capture, store, _, _) = capture(8);

        capture.on_flush(Bytes::from_static(b"1234"), false);
        capture.on_flush(Bytes::from_static(b"5678"), true);

        assert_eq!(&store.get(KEY).unwrap().body[..], b"12345678");
    }

    #[test]
    fn test_one_byte_over_max_is_abandoned() {
        let (mut capture, store, counters, tags) = capture(8);

        let first = capture.on_flush(Bytes::from_static(b"12345"), false);
        let second = capture.on_flush(Bytes::from_static(b"6789"), false);
        let last = capture.on_flush(Bytes::from_static(b""), true);

        // Client still receives everything
        assert_eq!([first, second, last].concat(), b"123456789");
        assert!(capture.is_abandoned());
        assert!(store.get(KEY).is_none());
        assert!(!tags.contains(TAG_CACHE_STORE));
        assert_eq!(counters.snapshot(0).skipped, 1);
    }

    #[test]
    fn test_missing_final_chunk_never_commits() {
        let (mut capture, store, _, _) = capture(1024);

        capture.on_flush(Bytes::from_static(b"partial"), false);
        drop(capture);

        assert!(store.is_empty());
    }
}
