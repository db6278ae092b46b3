//! Sparse Layout
//!
//! `[len:4][index:8][payload]` entries. Records may be written at any index,
//! overwritten (new entry appended, old bytes stay behind) or tombstoned in
//! the index only. The stored index is not checked on reads; recovery uses it
//! to rebuild a lost index file.

use std::fs::File;
use std::io::Read;

use tracing::warn;

use crate::error::{Result, SpoolError};

use super::{check_record_size, read_length, scan_entries, DataStrategy, EntryInfo, FilePair};
use crate::persist::{slot_position, LENGTH_PREFIX_SIZE, LOGICAL_INDEX_SIZE};

const ENTRY_HEADER_SIZE: u64 = LENGTH_PREFIX_SIZE + LOGICAL_INDEX_SIZE;

/// Random-access layout with overwrite and tombstones
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseDataStrategy;

impl SparseDataStrategy {
    fn write(&self, files: &mut FilePair<'_>, element: u64, payload: &[u8]) -> Result<()> {
        check_record_size(payload)?;
        // Refuse before appending so a rejected slot leaves no orphan entry
        slot_position(element, files.index_size()?)?;

        let mut entry = Vec::with_capacity(ENTRY_HEADER_SIZE as usize + payload.len());
        entry.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        entry.extend_from_slice(&element.to_be_bytes());
        entry.extend_from_slice(payload);

        let offset = files.append(&entry)?;
        files.set_offset(element, Some(offset))
    }

    /// Rebuild an empty index from the logical indices stored in the data file
    ///
    /// Later entries win, matching overwrite order. Tombstones are not stored
    /// in the data file and cannot be recovered.
    fn rebuild_if_lost(&self, files: &mut FilePair<'_>) -> Result<()> {
        if files.index_size()? > 0 || files.data_len()? <= files.data_offset {
            return Ok(());
        }

        let start = files.data_offset;
        let scan = scan_entries(self, &mut files.data, start)?;
        for entry in &scan.entries {
            if let Some(element) = entry.logical_index {
                files.set_offset(element, Some(entry.offset))?;
            }
        }

        warn!(
            recovered = scan.entries.len(),
            torn_bytes = scan.torn_bytes,
            "Rebuilt lost sparse index from data file"
        );
        Ok(())
    }
}

impl DataStrategy for SparseDataStrategy {
    fn is_sparse(&self) -> bool {
        true
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
            .read_at(offset + ENTRY_HEADER_SIZE, entry.payload_len as usize)
            .map(Some)
    }

    fn add(&self, files: &mut FilePair<'_>, payload: &[u8]) -> Result<u64> {
        self.rebuild_if_lost(files)?;
        let element = files.index_size()?;
        self.write(files, element, payload)?;
        Ok(element)
    }

    fn set(
        &self,
        files: &mut FilePair<'_>,
        element: u64,
        payload: Option<&[u8]>,
        allow_overwrite: bool,
    ) -> Result<bool> {
        self.rebuild_if_lost(files)?;

        match payload {
            None => {
                files.set_offset(element, None)?;
                Ok(true)
            }
            Some(payload) => {
                if !allow_overwrite && files.offset_of(element)?.is_some() {
                    return Ok(false);
                }
                self.write(files, element, payload)?;
                Ok(true)
            }
        }
    }

    fn read_entry(&self, data: &mut File, offset: u64, data_len: u64) -> Result<Option<EntryInfo>> {
        let len = match read_length(data, offset, data_len)? {
            Some(len) => len,
            None => return Ok(None),
        };

        let next_offset = offset + ENTRY_HEADER_SIZE + len as u64;
        if next_offset > data_len {
            return Ok(None);
        }

        // read_length left the cursor right after the length prefix
        let mut index = [0u8; LOGICAL_INDEX_SIZE as usize];
        data.read_exact(&mut index)?;

        Ok(Some(EntryInfo {
            offset,
            payload_len: len,
            logical_index: Some(u64::from_be_bytes(index)),
            next_offset,
        }))
    }
}
