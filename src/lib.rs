//! # spool
//!
//! Embeddable record buffers:
//! - Persistent indexed buffer backed by a data file and an offset index
//! - Dense (append-only) and sparse (random write, tombstones) layouts
//! - Overwrite-on-full in-memory ring buffers, with a blocking variant
//! - Read-through cache decorator for any buffer
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PersistentCodecBuffer                      │
//! │              (RwLock: shared get / exclusive add)            │
//! └──────┬──────────────┬───────────────┬───────────────┬───────┘
//!        │              │               │               │
//!        ▼              ▼               ▼               ▼
//!   ┌─────────┐   ┌───────────┐   ┌───────────┐   ┌───────────┐
//!   │  Codec  │   │  Header   │   │   Index   │   │   Data    │
//!   │ (T↔[u8])│   │ Strategy  │   │ Strategy  │   │ Strategy  │
//!   └─────────┘   └───────────┘   └───────────┘   └───────────┘
//!
//! ┌──────────────────────────┐     ┌──────────────────────────┐
//! │ BlockingCircularBuffer   │     │ CachingBuffer<B: Buffer> │
//! │  └ OverwritingCircular…  │     │  └ any Buffer            │
//! └──────────────────────────┘     └──────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod codec;
pub mod persist;
pub mod ring;
pub mod cache;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use buffer::{Buffer, Disposable, ElementProcessor, Resettable};
pub use cache::CachingBuffer;
pub use codec::Codec;
pub use config::{BufferConfig, CacheConfig, RingConfig};
pub use error::{Result, SpoolError};
pub use persist::{IndexRecovery, PersistentCodecBuffer};
pub use ring::{BlockingCircularBuffer, OverwritingCircularBuffer};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of spool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
