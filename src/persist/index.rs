//! Offset Index
//!
//! Flat table of fixed-width offsets, one per logical record index.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Result, SpoolError};

use super::{ABSENT_OFFSET, INDEX_ENTRY_SIZE};

/// Number of back-fill slots written per chunk when a sparse write jumps ahead
const BACKFILL_CHUNK: u64 = 4096;

/// Byte position of a slot, rejecting elements whose slot would end past `i64::MAX`
pub(crate) fn slot_position(element: u64, size: u64) -> Result<u64> {
    element
        .checked_add(1)
        .and_then(|end| end.checked_mul(INDEX_ENTRY_SIZE))
        .filter(|end| *end <= i64::MAX as u64)
        .map(|end| end - INDEX_ENTRY_SIZE)
        .ok_or(SpoolError::IndexOutOfBounds {
            index: element,
            available: size,
        })
}

/// Maps logical record indices to data file offsets
pub trait IndexStrategy: Send + Sync {
    /// Number of slots in the table (tombstones included)
    fn size(&self, index: &File) -> Result<u64>;

    /// Offset stored for `element`
    ///
    /// `None` if the table does not reach `element` or the slot is absent.
    fn get_offset(&self, index: &mut File, element: u64) -> Result<Option<u64>>;

    /// Store an offset (or a tombstone for `None`) for `element`
    ///
    /// Slots between the current end of the table and `element` are
    /// back-filled with tombstones.
    fn set_offset(&self, index: &mut File, element: u64, offset: Option<u64>) -> Result<()>;
}

/// 8-byte signed big-endian offsets, `-1` for absent
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIndexStrategy;

impl IndexStrategy for DefaultIndexStrategy {
    fn size(&self, index: &File) -> Result<u64> {
        Ok(index.metadata()?.len() / INDEX_ENTRY_SIZE)
    }

    fn get_offset(&self, index: &mut File, element: u64) -> Result<Option<u64>> {
        let size = self.size(index)?;
        if element >= size {
            return Ok(None);
        }

        index.seek(SeekFrom::Start(slot_position(element, size)?))?;
        let mut slot = [0u8; INDEX_ENTRY_SIZE as usize];
        index.read_exact(&mut slot)?;

        let offset = i64::from_be_bytes(slot);
        Ok(if offset < 0 { None } else { Some(offset as u64) })
    }

    fn set_offset(&self, index: &mut File, element: u64, offset: Option<u64>) -> Result<()> {
        let size = self.size(index)?;
        let position = slot_position(element, size)?;

        if element > size {
            index.seek(SeekFrom::Start(size * INDEX_ENTRY_SIZE))?;
            let absent = ABSENT_OFFSET.to_be_bytes();
            let mut remaining = element - size;
            while remaining > 0 {
                let chunk = remaining.min(BACKFILL_CHUNK);
                let fill: Vec<u8> = absent
                    .iter()
                    .copied()
                    .cycle()
                    .take((chunk * INDEX_ENTRY_SIZE) as usize)
                    .collect();
                index.write_all(&fill)?;
                remaining -= chunk;
            }
        }

        let value = offset.map(|o| o as i64).unwrap_or(ABSENT_OFFSET);
        index.seek(SeekFrom::Start(position))?;
        index.write_all(&value.to_be_bytes())?;

        Ok(())
    }
}
