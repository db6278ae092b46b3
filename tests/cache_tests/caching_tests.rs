//! Tests for CachingBuffer
//!
//! These tests verify:
//! - Read-through behaviour and hit/miss accounting
//! - LRU eviction at capacity
//! - Expiry through the shared reaper and on lookup
//! - Reset/dispose forwarded only to capable wrapped buffers
//! - Reads overlapping a reset or invalidate never cache the old record

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use spool::cache::{reaper_started, CacheStats};
use spool::codec::StringCodec;
use spool::{
    BlockingCircularBuffer, Buffer, BufferConfig, CacheConfig, CachingBuffer, Disposable,
    PersistentCodecBuffer, Resettable, SpoolError,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// In-memory buffer counting reads, optionally disposable
struct CountingBuffer {
    values: Vec<String>,
    reads: AtomicUsize,
    disposable: bool,
    disposed: AtomicBool,
}

impl CountingBuffer {
    fn new(values: &[&str]) -> Self {
        Self {
            values: values.iter().map(|v| v.to_string()).collect(),
            reads: AtomicUsize::new(0),
            disposable: false,
            disposed: AtomicBool::new(false),
        }
    }

    fn disposable(values: &[&str]) -> Self {
        Self {
            disposable: true,
            ..Self::new(values)
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl Buffer<String> for CountingBuffer {
    fn get(&self, index: u64) -> Option<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.values.get(index as usize).cloned()
    }

    fn size(&self) -> u64 {
        self.values.len() as u64
    }

    fn is_full(&self) -> bool {
        false
    }

    fn as_disposable(&self) -> Option<&dyn Disposable> {
        if self.disposable {
            Some(self)
        } else {
            None
        }
    }
}

impl Disposable for CountingBuffer {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

/// Single-record resettable buffer whose reads stall after fetching
struct SlowBuffer {
    value: Mutex<Option<String>>,
    reading: AtomicBool,
    delay: Duration,
}

impl SlowBuffer {
    fn new(value: &str, delay: Duration) -> Self {
        Self {
            value: Mutex::new(Some(value.to_string())),
            reading: AtomicBool::new(false),
            delay,
        }
    }
}

impl Buffer<String> for SlowBuffer {
    fn get(&self, index: u64) -> Option<String> {
        if index != 0 {
            return None;
        }
        let value = self.value.lock().unwrap().clone();
        self.reading.store(true, Ordering::SeqCst);
        thread::sleep(self.delay);
        value
    }

    fn size(&self) -> u64 {
        self.value.lock().unwrap().is_some() as u64
    }

    fn is_full(&self) -> bool {
        false
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }
}

impl Resettable for SlowBuffer {
    fn reset(&self) -> spool::Result<()> {
        *self.value.lock().unwrap() = None;
        Ok(())
    }
}

/// Start a read of record 0 on another thread and wait until it has fetched
fn start_slow_read(
    cache: &Arc<CachingBuffer<String, SlowBuffer>>,
) -> thread::JoinHandle<Option<String>> {
    let reader = Arc::clone(cache);
    let handle = thread::spawn(move || reader.get(0));
    while !cache.inner().reading.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    handle
}

fn setup_cache(values: &[&str], capacity: usize) -> CachingBuffer<String, CountingBuffer> {
    CachingBuffer::new(CountingBuffer::new(values), CacheConfig::new(capacity)).unwrap()
}

// =============================================================================
// Read-through Tests
// =============================================================================

#[test]
fn test_zero_capacity_rejected() {
    let result = CachingBuffer::new(CountingBuffer::new(&[]), CacheConfig::new(0));
    assert!(matches!(result, Err(SpoolError::Config(_))));
}

#[test]
fn test_second_read_is_a_hit() {
    let cache = setup_cache(&["a", "b"], 8);

    assert_eq!(cache.get(0), Some("a".to_string()));
    assert_eq!(cache.get(0), Some("a".to_string()));
    assert_eq!(cache.get(1), Some("b".to_string()));

    assert_eq!(cache.inner().reads(), 2);
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 2,
            cached: 2
        }
    );
}

#[test]
fn test_absent_records_are_not_cached() {
    let cache = setup_cache(&["a"], 8);

    assert_eq!(cache.get(5), None);
    assert_eq!(cache.get(5), None);

    assert_eq!(cache.inner().reads(), 2);
    assert_eq!(cache.cached_len(), 0);
}

#[test]
fn test_size_and_flags_come_from_inner() {
    let cache = setup_cache(&["a", "b", "c"], 1);

    assert_eq!(cache.size(), 3);
    assert!(!cache.is_full());
    assert!(!cache.is_empty());
}

// =============================================================================
// Eviction Tests
// =============================================================================

#[test]
fn test_lru_eviction_at_capacity() {
    let cache = setup_cache(&["a", "b", "c"], 2);

    cache.get(0);
    cache.get(1);
    cache.get(0); // 1 is now least recently used
    cache.get(2); // evicts 1
    assert_eq!(cache.cached_len(), 2);
    assert_eq!(cache.inner().reads(), 3);

    cache.get(0);
    assert_eq!(cache.inner().reads(), 3);

    cache.get(1);
    assert_eq!(cache.inner().reads(), 4);
}

#[test]
fn test_invalidate_and_clear() {
    let cache = setup_cache(&["a", "b"], 4);
    cache.get(0);
    cache.get(1);

    cache.invalidate(0);
    assert_eq!(cache.cached_len(), 1);
    cache.get(0);
    assert_eq!(cache.inner().reads(), 3);

    cache.clear();
    assert_eq!(cache.cached_len(), 0);
    cache.get(1);
    assert_eq!(cache.inner().reads(), 4);
}

#[test]
fn test_ttl_entries_are_reaped() {
    let config = CacheConfig::new(16)
        .ttl(Duration::from_millis(200))
        .sweep_interval(Duration::from_millis(10));
    let cache = CachingBuffer::new(CountingBuffer::new(&["a", "b"]), config).unwrap();
    assert!(reaper_started());

    cache.get(0);
    cache.get(1);
    assert_eq!(cache.cached_len(), 2);

    let mut waited = Duration::ZERO;
    while cache.cached_len() > 0 && waited < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(20));
        waited += Duration::from_millis(20);
    }
    assert_eq!(cache.cached_len(), 0);

    assert_eq!(cache.get(0), Some("a".to_string()));
    assert_eq!(cache.inner().reads(), 3);
}

#[test]
fn test_expired_entry_refetched_on_lookup() {
    let config = CacheConfig::new(16)
        .ttl(Duration::from_millis(20))
        .sweep_interval(Duration::from_millis(10));
    let cache = CachingBuffer::new(CountingBuffer::new(&["a"]), config).unwrap();

    cache.get(0);
    thread::sleep(Duration::from_millis(40));
    cache.get(0);

    assert_eq!(cache.inner().reads(), 2);
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_dropped_cache_does_not_stop_reaper() {
    let config = CacheConfig::new(4)
        .ttl(Duration::from_millis(10))
        .sweep_interval(Duration::from_millis(10));
    for _ in 0..3 {
        let cache = CachingBuffer::new(CountingBuffer::new(&["a"]), config).unwrap();
        cache.get(0);
    }

    let survivor = CachingBuffer::new(CountingBuffer::new(&["a"]), config).unwrap();
    survivor.get(0);
    let mut waited = Duration::ZERO;
    while survivor.cached_len() > 0 && waited < Duration::from_secs(5) {
        thread::sleep(Duration::from_millis(20));
        waited += Duration::from_millis(20);
    }
    assert_eq!(survivor.cached_len(), 0);
}

// =============================================================================
// Concurrent Invalidation Tests
// =============================================================================

#[test]
fn test_reset_during_miss_does_not_cache_old_record() {
    let inner = SlowBuffer::new("old", Duration::from_millis(100));
    let cache = Arc::new(CachingBuffer::new(inner, CacheConfig::new(4)).unwrap());

    let reader = start_slow_read(&cache);
    cache.reset().unwrap();

    // The overlapping read may still return what it fetched
    assert_eq!(reader.join().unwrap(), Some("old".to_string()));

    assert_eq!(cache.size(), 0);
    assert_eq!(cache.cached_len(), 0);
    assert_eq!(cache.get(0), None);
}

#[test]
fn test_invalidate_during_miss_does_not_cache_record() {
    let inner = SlowBuffer::new("a", Duration::from_millis(100));
    let cache = Arc::new(CachingBuffer::new(inner, CacheConfig::new(4)).unwrap());

    let reader = start_slow_read(&cache);
    cache.invalidate(0);
    assert_eq!(reader.join().unwrap(), Some("a".to_string()));

    assert_eq!(cache.cached_len(), 0);
}

#[test]
fn test_unrelated_miss_is_cached_after_clear() {
    let cache = setup_cache(&["a", "b"], 4);
    cache.clear();

    assert_eq!(cache.get(1), Some("b".to_string()));
    assert_eq!(cache.cached_len(), 1);
}

// =============================================================================
// Capability Forwarding Tests
// =============================================================================

#[test]
fn test_reset_without_resettable_inner_only_clears() {
    let cache = setup_cache(&["a"], 4);
    cache.get(0);

    cache.reset().unwrap();
    assert_eq!(cache.cached_len(), 0);
    assert_eq!(cache.size(), 1);
}

#[test]
fn test_reset_forwards_to_persistent_buffer() {
    let temp = TempDir::new().unwrap();
    let config = BufferConfig::builder(temp.path().join("cached.data")).build();
    let inner = PersistentCodecBuffer::open(config, StringCodec).unwrap();
    inner.add(&"a".to_string()).unwrap();

    let cache = CachingBuffer::new(inner, CacheConfig::new(4)).unwrap();
    assert_eq!(cache.get(0), Some("a".to_string()));

    cache.reset().unwrap();
    assert_eq!(cache.size(), 0);
    assert_eq!(cache.get(0), None);
}

#[test]
fn test_reset_forwards_to_ring() {
    let ring = BlockingCircularBuffer::with_capacity(4, Duration::ZERO).unwrap();
    ring.add(7u32);

    let cache = CachingBuffer::new(ring, CacheConfig::new(4)).unwrap();
    assert_eq!(cache.get(0), Some(7));

    let as_buffer: &dyn Buffer<u32> = &cache;
    as_buffer.as_resettable().unwrap().reset().unwrap();
    assert!(cache.inner().is_empty());
    assert_eq!(cache.cached_len(), 0);
}

#[test]
fn test_dispose_forwards_only_when_capable() {
    let plain = setup_cache(&["a"], 4);
    plain.get(0);
    plain.dispose();
    assert_eq!(plain.cached_len(), 0);
    assert!(!plain.inner().disposed.load(Ordering::SeqCst));

    let capable =
        CachingBuffer::new(CountingBuffer::disposable(&["a"]), CacheConfig::new(4)).unwrap();
    capable.get(0);
    capable.dispose();
    assert_eq!(capable.cached_len(), 0);
    assert!(capable.inner().disposed.load(Ordering::SeqCst));
}
