//! Configuration for spool
//!
//! Centralized configuration with sensible defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extension given to an index file derived from its data file
pub const INDEX_EXTENSION: &str = "index";

/// Derive the default index path for a data file
///
/// `events.data` → `events.index`, `events` → `events.index`
pub fn default_index_path(data_path: &Path) -> PathBuf {
    data_path.with_extension(INDEX_EXTENSION)
}

// =============================================================================
// Persistent Buffer Configuration
// =============================================================================

/// Configuration for a [`PersistentCodecBuffer`](crate::persist::PersistentCodecBuffer)
#[derive(Debug, Clone)]
pub struct BufferConfig {
    // -------------------------------------------------------------------------
    // File Pair
    // -------------------------------------------------------------------------
    /// Data file holding the file header followed by the records
    pub data_path: PathBuf,

    /// Offset index file (8 bytes per record)
    pub index_path: PathBuf,

    // -------------------------------------------------------------------------
    // Header
    // -------------------------------------------------------------------------
    /// Caller chosen tag identifying the content type, validated on reopen
    pub magic_value: u32,

    /// Optional key/value metadata written into a fresh header
    ///
    /// `None` writes no metadata block at all (unless `sparse` forces one).
    pub metadata: Option<BTreeMap<String, String>>,

    // -------------------------------------------------------------------------
    // Data Layout
    // -------------------------------------------------------------------------
    /// Use the sparse layout for newly created files
    ///
    /// Only consulted when the header is written; an existing header wins.
    pub sparse: bool,

    /// Whether sparse `set` may replace an already present record
    pub allow_overwrite: bool,
}

impl BufferConfig {
    /// Create a new config builder for the given data file
    pub fn builder(data_path: impl Into<PathBuf>) -> BufferConfigBuilder {
        let data_path = data_path.into();
        BufferConfigBuilder {
            config: BufferConfig {
                index_path: default_index_path(&data_path),
                data_path,
                magic_value: 0,
                metadata: None,
                sparse: false,
                allow_overwrite: true,
            },
        }
    }
}

/// Builder for BufferConfig
pub struct BufferConfigBuilder {
    config: BufferConfig,
}

impl BufferConfigBuilder {
    /// Override the index file location
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// Set the magic value
    pub fn magic_value(mut self, magic: u32) -> Self {
        self.config.magic_value = magic;
        self
    }

    /// Set the header metadata map
    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.config.metadata = Some(metadata);
        self
    }

    /// Add a single metadata entry
    pub fn metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Select the sparse data layout
    pub fn sparse(mut self, sparse: bool) -> Self {
        self.config.sparse = sparse;
        self
    }

    /// Allow or forbid sparse overwrites
    pub fn allow_overwrite(mut self, allow: bool) -> Self {
        self.config.allow_overwrite = allow;
        self
    }

    pub fn build(self) -> BufferConfig {
        self.config
    }
}

// =============================================================================
// Ring Buffer Configuration
// =============================================================================

/// Configuration for a [`BlockingCircularBuffer`](crate::ring::BlockingCircularBuffer)
#[derive(Debug, Clone, Copy)]
pub struct RingConfig {
    /// Number of slots (must be at least 1)
    pub capacity: usize,

    /// How long a producer waits on a full buffer before retrying
    pub congestion_delay: Duration,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            congestion_delay: Duration::from_millis(10),
        }
    }
}

impl RingConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn congestion_delay(mut self, delay: Duration) -> Self {
        self.congestion_delay = delay;
        self
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

/// Configuration for a [`CachingBuffer`](crate::cache::CachingBuffer)
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum number of cached records (LRU eviction beyond this)
    pub capacity: usize,

    /// Entries older than this are purged by the background reaper
    pub ttl: Option<Duration>,

    /// How often the shared reaper sweeps registered caches
    ///
    /// The reaper is process-wide; the first cache to start it decides the interval.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl: None,
            sweep_interval: Duration::from_secs(1),
        }
    }
}

impl CacheConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
