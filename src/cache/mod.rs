//! Cache Module
//!
//! Read-through caching decorator for any [`Buffer`](crate::buffer::Buffer).
//!
//! ## Eviction
//! - **Capacity**: bounded LRU, the least recently used entry is evicted
//!   inline when a new one is inserted
//! - **Age** (optional TTL): one process-wide reaper thread sweeps every
//!   registered cache; expired entries are also dropped on lookup
//!
//! A miss always falls through to the wrapped buffer. Hits are served from
//! the cache even if the wrapped record changed since it was cached.

mod caching;
mod reaper;

pub use caching::{CacheStats, CachingBuffer};
pub use reaper::reaper_started;
