//! Persistent Buffer Module
//!
//! An append-mostly record store backed by a data file and an offset index.
//!
//! ## Responsibilities
//! - Validate or write the data file header (sentinel, magic value, metadata)
//! - Map logical record indices to data file offsets
//! - Read and write length-prefixed record blobs (dense or sparse layout)
//! - Heal a deleted index file while the buffer is live
//!
//! ## Data File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Header                                                   │
//! │ ┌────────────┬───────────┬──────────┬──────────────────┐ │
//! │ │Sentinel (4)│ Magic (4) │MetaLen(4)│ gzip(bincode meta)│ │
//! │ └────────────┴───────────┴──────────┴──────────────────┘ │
//! ├──────────────────────────────────────────────────────────┤
//! │ Records (dense)                                          │
//! │ ┌─────────┬──────────────────┐                           │
//! │ │ Len (4) │ Payload (Len)    │  ... repeated             │
//! │ └─────────┴──────────────────┘                           │
//! │ Records (sparse)                                         │
//! │ ┌─────────┬───────────┬──────────────────┐               │
//! │ │ Len (4) │ Index (8) │ Payload (Len)    │  ... repeated │
//! │ └─────────┴───────────┴──────────────────┘               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Index File Format
//! ```text
//! ┌────────────┬────────────┬─────┐
//! │ Offset (8) │ Offset (8) │ ... │   -1 = absent / tombstone
//! └────────────┴────────────┴─────┘
//! ```
//!
//! All integers are big-endian.

mod buffer;
mod data;
mod header;
mod index;
mod recovery;

pub use buffer::PersistentCodecBuffer;
pub(crate) use data::strategy_for;
pub(crate) use index::slot_position;
pub use data::{scan_entries, DataStrategy, DenseDataStrategy, EntryInfo, FilePair, Scan, SparseDataStrategy};
pub use header::{DefaultFileHeaderStrategy, FileHeader, FileHeaderStrategy, Metadata};
pub use index::{DefaultIndexStrategy, IndexStrategy};
pub use recovery::{IndexRecovery, RecoveryReport};

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::Result;

// =============================================================================
// Shared Constants
// =============================================================================

/// Sentinel tag opening every data file ("SPL1")
pub const SENTINEL: u32 = 0x5350_4C31;

/// Fixed header prefix: Sentinel (4) + Magic (4) + MetaLen (4) = 12 bytes
pub const HEADER_PREFIX_SIZE: u64 = 12;

/// Width of one index table entry
pub const INDEX_ENTRY_SIZE: u64 = 8;

/// On-disk marker for an absent or tombstoned record
pub(crate) const ABSENT_OFFSET: i64 = -1;

/// Record length prefix width
pub(crate) const LENGTH_PREFIX_SIZE: u64 = 4;

/// Stored logical index width (sparse layout only)
pub(crate) const LOGICAL_INDEX_SIZE: u64 = 8;

/// Largest storable record (length prefix is a signed 32-bit value)
pub const MAX_RECORD_SIZE: usize = i32::MAX as usize;

// =============================================================================
// File Helpers
// =============================================================================

/// Length of a file, or 0 if it does not exist
pub(crate) fn file_len(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Delete a file, ignoring a missing one
pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
