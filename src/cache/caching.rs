//! Caching Buffer
//!
//! Read-through LRU cache in front of any buffer.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::buffer::{Buffer, Disposable, Resettable};
use crate::config::CacheConfig;
use crate::error::{Result, SpoolError};

use super::reaper::{self, Sweep};

/// Snapshot of cache effectiveness counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries currently held
    pub cached: usize,
}

struct CacheEntry<T> {
    value: T,
    inserted: Instant,
}

/// State shared with the reaper thread
struct CacheShared<T> {
    entries: Mutex<LruCache<u64, CacheEntry<T>>>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Bumped under the entries lock whenever cached records are dropped
    generation: AtomicU64,
}

impl<T: Clone> CacheShared<T> {
    fn lookup(&self, index: u64) -> Option<T> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(&index) {
            Some(entry) => self.is_expired(entry, Instant::now()),
            None => return None,
        };

        if expired {
            entries.pop(&index);
            None
        } else {
            entries.get(&index).map(|entry| entry.value.clone())
        }
    }

    fn is_expired(&self, entry: &CacheEntry<T>, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(entry.inserted) >= ttl,
            None => false,
        }
    }
}

impl<T: Clone + Send> Sweep for CacheShared<T> {
    fn sweep(&self, now: Instant) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let mut entries = self.entries.lock();
        let expired: Vec<u64> = entries
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(index, _)| *index)
            .collect();

        for index in &expired {
            entries.pop(index);
        }
        expired.len()
    }
}

/// Read-through cache keyed by logical index
///
/// Entries are bounded by `capacity` (LRU) and optionally by age. A cached
/// value is served as-is, so records changed in the wrapped buffer after
/// being cached (sparse `set`, ring eviction) stay visible until evicted or
/// [`invalidate`](Self::invalidate)d.
pub struct CachingBuffer<T, B> {
    inner: B,
    shared: Arc<CacheShared<T>>,
}

impl<T, B> CachingBuffer<T, B>
where
    T: Clone + Send + 'static,
    B: Buffer<T>,
{
    pub fn new(inner: B, config: CacheConfig) -> Result<Self> {
        let capacity = NonZeroUsize::new(config.capacity).ok_or_else(|| {
            SpoolError::Config("Cache capacity must be at least 1".to_string())
        })?;

        let shared = Arc::new(CacheShared {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        });

        if config.ttl.is_some() {
            let weak = Arc::downgrade(&shared);
            let weak: Weak<dyn Sweep> = weak;
            reaper::register(weak, config.sweep_interval);
        }

        Ok(Self { inner, shared })
    }

    /// Get a record, from the cache if present, else from the wrapped buffer
    ///
    /// A value read from the wrapped buffer is only cached if no `clear`,
    /// `invalidate` or `reset` ran while it was being read.
    pub fn get(&self, index: u64) -> Option<T> {
        if let Some(value) = self.shared.lookup(index) {
            self.shared.hits.fetch_add(1, Ordering::Relaxed);
            return Some(value);
        }

        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        let generation = self.shared.generation.load(Ordering::Acquire);
        let value = self.inner.get(index)?;

        let mut entries = self.shared.entries.lock();
        if self.shared.generation.load(Ordering::Acquire) == generation {
            entries.put(
                index,
                CacheEntry {
                    value: value.clone(),
                    inserted: Instant::now(),
                },
            );
        }
        Some(value)
    }

    /// Drop the cached copy of one record
    pub fn invalidate(&self, index: u64) {
        let mut entries = self.shared.entries.lock();
        self.shared.generation.fetch_add(1, Ordering::Release);
        entries.pop(&index);
    }

    /// Drop every cached record
    pub fn clear(&self) {
        let mut entries = self.shared.entries.lock();
        self.shared.generation.fetch_add(1, Ordering::Release);
        entries.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            cached: self.cached_len(),
        }
    }

    /// The wrapped buffer
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Clear the cache, then reset the wrapped buffer if it can be reset
    ///
    /// The cache is cleared again afterwards so reads that overlapped the
    /// reset cannot leave pre-reset records behind.
    pub fn reset(&self) -> Result<()> {
        self.clear();
        let result = match self.inner.as_resettable() {
            Some(resettable) => resettable.reset(),
            None => Ok(()),
        };
        self.clear();
        result
    }

    /// Clear the cache, then dispose the wrapped buffer if it can be disposed
    pub fn dispose(&self) {
        self.clear();
        if let Some(disposable) = self.inner.as_disposable() {
            disposable.dispose();
        }
        self.clear();
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<T, B> Buffer<T> for CachingBuffer<T, B>
where
    T: Clone + Send + 'static,
    B: Buffer<T>,
{
    fn get(&self, index: u64) -> Option<T> {
        CachingBuffer::get(self, index)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }

    fn as_disposable(&self) -> Option<&dyn Disposable> {
        Some(self)
    }
}

impl<T, B> Resettable for CachingBuffer<T, B>
where
    T: Clone + Send + 'static,
    B: Buffer<T>,
{
    fn reset(&self) -> Result<()> {
        CachingBuffer::reset(self)
    }
}

impl<T, B> Disposable for CachingBuffer<T, B>
where
    T: Clone + Send + 'static,
    B: Buffer<T>,
{
    fn dispose(&self) {
        CachingBuffer::dispose(self)
    }
}

impl<T, B: std::fmt::Debug> std::fmt::Debug for CachingBuffer<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingBuffer")
            .field("inner", &self.inner)
            .field("ttl", &self.shared.ttl)
            .finish()
    }
}
