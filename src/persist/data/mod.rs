//! Data Strategies
//!
//! Record layout policies for the data file.
//!
//! - **Dense**: append-only, record `n` is the `n`-th entry in the file
//! - **Sparse**: records may be written at any index, overwritten, or
//!   tombstoned; each entry carries its logical index for recovery
//!
//! The policy is fixed when the file is created and recorded in the header.

mod dense;
mod sparse;

pub use dense::DenseDataStrategy;
pub use sparse::SparseDataStrategy;

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Result, SpoolError};

use super::{FileHeader, IndexStrategy, LENGTH_PREFIX_SIZE, MAX_RECORD_SIZE};

// =============================================================================
// File Pair
// =============================================================================

/// Data and index files opened for the duration of one operation
pub struct FilePair<'a> {
    /// Data file (header + records)
    pub data: File,
    /// Offset index file
    pub index: File,
    /// Byte position of record 0 in the data file
    pub data_offset: u64,
    /// Index table layout
    pub index_strategy: &'a dyn IndexStrategy,
}

impl<'a> FilePair<'a> {
    /// Open both files read-only
    ///
    /// Fails with `NotFound` if either file is missing.
    pub fn open_read(
        data_path: &Path,
        index_path: &Path,
        data_offset: u64,
        index_strategy: &'a dyn IndexStrategy,
    ) -> Result<Self> {
        Ok(Self {
            data: File::open(data_path)?,
            index: File::open(index_path)?,
            data_offset,
            index_strategy,
        })
    }

    /// Open both files for writing, creating the index if needed
    pub fn open_write(
        data_path: &Path,
        index_path: &Path,
        data_offset: u64,
        index_strategy: &'a dyn IndexStrategy,
    ) -> Result<Self> {
        let data = OpenOptions::new().read(true).write(true).open(data_path)?;
        let index = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(index_path)?;
        Ok(Self {
            data,
            index,
            data_offset,
            index_strategy,
        })
    }

    /// Current data file length (never cached)
    pub fn data_len(&self) -> Result<u64> {
        Ok(self.data.metadata()?.len())
    }

    /// Current number of index slots
    pub fn index_size(&self) -> Result<u64> {
        self.index_strategy.size(&self.index)
    }

    pub fn offset_of(&mut self, element: u64) -> Result<Option<u64>> {
        self.index_strategy.get_offset(&mut self.index, element)
    }

    pub fn set_offset(&mut self, element: u64, offset: Option<u64>) -> Result<()> {
        self.index_strategy.set_offset(&mut self.index, element, offset)
    }

    /// Append a complete entry at the end of the data file, returning its offset
    pub fn append(&mut self, entry: &[u8]) -> Result<u64> {
        let offset = self.data.seek(SeekFrom::End(0))?;
        self.data.write_all(entry)?;
        Ok(offset)
    }

    /// Read `len` bytes at `offset`
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.data.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        self.data.read_exact(&mut buf)?;
        Ok(buf)
    }
}

// =============================================================================
// Entries
// =============================================================================

/// Location of one complete entry in the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    /// Offset of the length prefix
    pub offset: u64,
    /// Payload length
    pub payload_len: u32,
    /// Logical index stored with the entry (sparse only)
    pub logical_index: Option<u64>,
    /// Offset just past the entry
    pub next_offset: u64,
}

/// Result of walking the data file entry by entry
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Complete entries in file order
    pub entries: Vec<EntryInfo>,
    /// Where the walk stopped (data length unless the tail is torn)
    pub end: u64,
    /// Bytes after `end` that do not form a complete entry
    pub torn_bytes: u64,
}

/// Walk every complete entry from `start` to the end of the data file
pub fn scan_entries(strategy: &dyn DataStrategy, data: &mut File, start: u64) -> Result<Scan> {
    let data_len = data.metadata()?.len();
    let mut entries = Vec::new();
    let mut position = start;

    while position < data_len {
        match strategy.read_entry(data, position, data_len)? {
            Some(entry) => {
                position = entry.next_offset;
                entries.push(entry);
            }
            None => break,
        }
    }

    Ok(Scan {
        entries,
        end: position,
        torn_bytes: data_len.saturating_sub(position),
    })
}

/// Read the length prefix at `offset`, `None` if it lies past `data_len`
pub(crate) fn read_length(data: &mut File, offset: u64, data_len: u64) -> Result<Option<u32>> {
    if offset + LENGTH_PREFIX_SIZE > data_len {
        return Ok(None);
    }
    data.seek(SeekFrom::Start(offset))?;
    let mut len = [0u8; LENGTH_PREFIX_SIZE as usize];
    match data.read_exact(&mut len) {
        Ok(()) => Ok(Some(u32::from_be_bytes(len))),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Layout recorded in the header's sparse flag
pub(crate) fn strategy_for(header: &FileHeader) -> Box<dyn DataStrategy> {
    if header.is_sparse() {
        Box::new(SparseDataStrategy)
    } else {
        Box::new(DenseDataStrategy)
    }
}

pub(crate) fn check_record_size(payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_RECORD_SIZE {
        return Err(SpoolError::Codec(format!(
            "Record too large: {} bytes (max {})",
            payload.len(),
            MAX_RECORD_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// Strategy
// =============================================================================

/// Reads and writes record entries in the data file
pub trait DataStrategy: Send + Sync {
    /// Whether this layout stores logical indices and allows `set`
    fn is_sparse(&self) -> bool;

    /// Number of addressable records
    fn size(&self, files: &mut FilePair<'_>) -> Result<u64> {
        files.index_size()
    }

    /// Raw payload of record `element`, `None` if absent
    fn get(&self, files: &mut FilePair<'_>, element: u64) -> Result<Option<Vec<u8>>>;

    /// Append a record at the next logical index, returning that index
    fn add(&self, files: &mut FilePair<'_>, payload: &[u8]) -> Result<u64>;

    /// Write or tombstone record `element`
    ///
    /// Returns `false` when an existing record was kept because overwrite is
    /// disabled.
    fn set(
        &self,
        _files: &mut FilePair<'_>,
        _element: u64,
        _payload: Option<&[u8]>,
        _allow_overwrite: bool,
    ) -> Result<bool> {
        Err(SpoolError::Unsupported(
            "set requires the sparse data layout".to_string(),
        ))
    }

    /// Describe the complete entry at `offset`, `None` if it is torn or out of range
    fn read_entry(&self, data: &mut File, offset: u64, data_len: u64) -> Result<Option<EntryInfo>>;
}
