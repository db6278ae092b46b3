//! Dense Layout
//!
//! `[len:4][payload]` entries appended back to back; record `n` is entry `n`.

use std::fs::File;

use tracing::warn;

use crate::error::{Result, SpoolError};

use super::{check_record_size, read_length, scan_entries, DataStrategy, EntryInfo, FilePair};
use crate::persist::LENGTH_PREFIX_SIZE;

/// Append-only sequential layout
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseDataStrategy;

impl DenseDataStrategy {
    /// Index every record present in the data file but missing from the index
    ///
    /// Starts after the last indexed record (or at `data_offset` for an empty
    /// index) and adds one slot per complete entry found. Returns the new
    /// index size.
    fn catch_up(&self, files: &mut FilePair<'_>) -> Result<u64> {
        let mut size = files.index_size()?;
        let data_len = files.data_len()?;

        let start = match size.checked_sub(1) {
            None => files.data_offset,
            Some(last) => match files.offset_of(last)? {
                Some(offset) => match self.read_entry(&mut files.data, offset, data_len)? {
                    Some(entry) => entry.next_offset,
                    // Last indexed record is no longer intact; nothing to walk.
                    None => data_len,
                },
                None => data_len,
            },
        };

        if start >= data_len {
            return Ok(size);
        }

        let scan = scan_entries(self, &mut files.data, start)?;
        for entry in &scan.entries {
            files.set_offset(size, Some(entry.offset))?;
            size += 1;
        }

        if !scan.entries.is_empty() {
            warn!(
                recovered = scan.entries.len(),
                from_offset = start,
                "Re-indexed records missing from the index file"
            );
        }
        if scan.torn_bytes > 0 {
            warn!(
                offset = scan.end,
                bytes = scan.torn_bytes,
                "Skipping torn entry at end of data file"
            );
        }

        Ok(size)
    }
}

impl DataStrategy for DenseDataStrategy {
    fn is_sparse(&self) -> bool {
        false
    }

    fn get(&self, files: &mut FilePair<'_>, element: u64) -> Result<Option<Vec<u8>>> {
        let offset = match files.offset_of(element)? {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let data_len = files.data_len()?;
        // Bounds the stored length by the file before anything is allocated
        let entry = self.read_entry(&mut files.data, offset, data_len)?.ok_or_else(|| {
            SpoolError::Corruption(format!(
                "Record {} points past end of data file (offset {}, length {})",
                element, offset, data_len
            ))
        })?;

        files
            .read_at(offset + LENGTH_PREFIX_SIZE, entry.payload_len as usize)
            .map(Some)
    }

    fn add(&self, files: &mut FilePair<'_>, payload: &[u8]) -> Result<u64> {
        check_record_size(payload)?;
        let element = self.catch_up(files)?;

        let mut entry = Vec::with_capacity(LENGTH_PREFIX_SIZE as usize + payload.len());
        entry.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        entry.extend_from_slice(payload);

        // Data first: a record is reachable only once its offset is published.
        let offset = files.append(&entry)?;
        files.set_offset(element, Some(offset))?;

        Ok(element)
    }

    fn read_entry(&self, data: &mut File, offset: u64, data_len: u64) -> Result<Option<EntryInfo>> {
        let len = match read_length(data, offset, data_len)? {
            Some(len) => len,
            None => return Ok(None),
        };

        let next_offset = offset + LENGTH_PREFIX_SIZE + len as u64;
        if next_offset > data_len {
            return Ok(None);
        }

        Ok(Some(EntryInfo {
            offset,
            payload_len: len,
            logical_index: None,
            next_offset,
        }))
    }
}
