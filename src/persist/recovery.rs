//! Index Recovery
//!
//! Offline verification and rebuilding of an index file from its data file.
//! Use these when a buffer refuses to open because its index is gone, or to
//! check a file pair before handing it to an application.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;

use tracing::info;

use crate::config::BufferConfig;
use crate::error::{Result, SpoolError};

use super::{
    scan_entries, strategy_for, DefaultFileHeaderStrategy, DefaultIndexStrategy, FileHeader,
    FileHeaderStrategy, IndexStrategy,
};

/// Handles verification and repair of a data/index file pair
pub struct IndexRecovery;

/// Result of a verify or rebuild operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Magic value found in the header
    pub magic_value: u32,

    /// Whether the data file uses the sparse layout
    pub sparse: bool,

    /// Complete entries found in the data file
    pub records_in_data: u64,

    /// Index slots pointing at a complete entry
    pub records_indexed: u64,

    /// Index slots holding the absent marker
    pub tombstones: u64,

    /// Index slots pointing anywhere but the start of a complete entry
    pub dangling_offsets: u64,

    /// Data entries no index slot points at
    ///
    /// Expected for the sparse layout after overwrites.
    pub unreferenced_records: u64,

    /// Bytes at the end of the data file that do not form a complete entry
    pub torn_bytes: u64,
}

impl RecoveryReport {
    /// No dangling offsets, no torn tail and (dense) every record indexed
    pub fn is_consistent(&self) -> bool {
        self.dangling_offsets == 0
            && self.torn_bytes == 0
            && (self.sparse || self.unreferenced_records == 0)
    }
}

impl IndexRecovery {
    /// Verify a file pair without modifying it
    pub fn verify(config: &BufferConfig) -> Result<RecoveryReport> {
        let header = Self::read_header(config)?;
        let strategy = strategy_for(&header);

        let mut data = File::open(&config.data_path)?;
        let scan = scan_entries(strategy.as_ref(), &mut data, header.data_offset)?;
        let starts: HashSet<u64> = scan.entries.iter().map(|e| e.offset).collect();

        let mut report = RecoveryReport {
            magic_value: header.magic_value,
            sparse: header.is_sparse(),
            records_in_data: scan.entries.len() as u64,
            torn_bytes: scan.torn_bytes,
            ..Default::default()
        };

        let mut referenced = HashSet::new();
        match File::open(&config.index_path) {
            Ok(mut index) => {
                let index_strategy = DefaultIndexStrategy;
                let size = index_strategy.size(&index)?;
                for slot in 0..size {
                    match index_strategy.get_offset(&mut index, slot)? {
                        None => report.tombstones += 1,
                        Some(offset) if starts.contains(&offset) => {
                            report.records_indexed += 1;
                            referenced.insert(offset);
                        }
                        Some(_) => report.dangling_offsets += 1,
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        report.unreferenced_records = starts.difference(&referenced).count() as u64;
        Ok(report)
    }

    /// Rewrite the index file from the data file
    ///
    /// Returns the verification report of the repaired pair.
    ///
    /// This will:
    /// 1. Walk every complete entry after the header
    /// 2. Truncate a torn entry at the end of the data file
    /// 3. Write a new index (dense: file order; sparse: stored logical
    ///    index, later entries win)
    ///
    /// Sparse tombstones live only in the index and are lost.
    pub fn rebuild(config: &BufferConfig) -> Result<RecoveryReport> {
        let header = Self::read_header(config)?;
        let strategy = strategy_for(&header);

        let mut data = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.data_path)?;
        let scan = scan_entries(strategy.as_ref(), &mut data, header.data_offset)?;

        if scan.torn_bytes > 0 {
            data.set_len(scan.end)?;
            data.sync_all()?;
        }

        let mut index = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&config.index_path)?;
        let index_strategy = DefaultIndexStrategy;
        for (position, entry) in scan.entries.iter().enumerate() {
            let slot = entry.logical_index.unwrap_or(position as u64);
            index_strategy.set_offset(&mut index, slot, Some(entry.offset))?;
        }
        index.sync_all()?;

        info!(
            data = %config.data_path.display(),
            records = scan.entries.len(),
            torn_bytes = scan.torn_bytes,
            "Rebuilt index"
        );

        Self::verify(config)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_header(config: &BufferConfig) -> Result<FileHeader> {
        DefaultFileHeaderStrategy
            .read_file_header(&config.data_path)?
            .ok_or_else(|| {
                SpoolError::HeaderMismatch(format!(
                    "{} has no compatible file header",
                    config.data_path.display()
                ))
            })
    }
}
