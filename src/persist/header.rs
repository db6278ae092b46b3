//! File Header
//!
//! Reads and writes the fixed header at the start of every data file.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SpoolError};

use super::{HEADER_PREFIX_SIZE, SENTINEL};

/// Optional header metadata
///
/// Stored as gzip-compressed bincode. A header without metadata is distinct
/// from one carrying an empty map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Records use the sparse layout
    pub sparse: bool,

    /// Caller supplied key/value pairs
    pub entries: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(sparse: bool, entries: BTreeMap<String, String>) -> Self {
        Self { sparse, entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let raw = bincode::serialize(self)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut raw = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut raw)?;
        Ok(bincode::deserialize(&raw)?)
    }
}

/// A validated data file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Caller chosen content tag
    pub magic_value: u32,

    /// Metadata block, if one was written
    pub metadata: Option<Metadata>,

    /// Byte position where record 0 begins
    pub data_offset: u64,
}

impl FileHeader {
    pub fn is_sparse(&self) -> bool {
        self.metadata.as_ref().map(|m| m.sparse).unwrap_or(false)
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// Reads and writes data file headers
pub trait FileHeaderStrategy: Send + Sync {
    /// Write a header into an absent or empty file
    ///
    /// Fails instead of clobbering a file that already holds bytes.
    fn write_file_header(
        &self,
        path: &Path,
        magic_value: u32,
        metadata: Option<&Metadata>,
    ) -> Result<FileHeader>;

    /// Read the header
    ///
    /// `Ok(None)` means "not present or incompatible": missing file, short
    /// file, wrong sentinel, or an unreadable metadata block.
    fn read_file_header(&self, path: &Path) -> Result<Option<FileHeader>>;

    /// Read only the magic value, validating nothing but the sentinel
    fn read_magic_value(&self, path: &Path) -> Result<Option<u32>>;

    /// Smallest file length that can hold a header
    fn minimal_header_size(&self) -> u64 {
        HEADER_PREFIX_SIZE
    }
}

/// `sentinel | magic | metaLen | metaBytes`, big-endian
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFileHeaderStrategy;

impl DefaultFileHeaderStrategy {
    /// Open and read the fixed prefix: (file, file_len, magic, meta_len)
    fn read_prefix(path: &Path) -> Result<Option<(File, u64, u32, u32)>> {
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file_len = file.metadata()?.len();
        if file_len < HEADER_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; HEADER_PREFIX_SIZE as usize];
        file.read_exact(&mut prefix)?;

        let sentinel = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
        if sentinel != SENTINEL {
            debug!(path = %path.display(), sentinel, "Sentinel mismatch");
            return Ok(None);
        }

        let magic = u32::from_be_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]);
        let meta_len = u32::from_be_bytes([prefix[8], prefix[9], prefix[10], prefix[11]]);

        Ok(Some((file, file_len, magic, meta_len)))
    }
}

impl FileHeaderStrategy for DefaultFileHeaderStrategy {
    fn write_file_header(
        &self,
        path: &Path,
        magic_value: u32,
        metadata: Option<&Metadata>,
    ) -> Result<FileHeader> {
        let mut file = OpenOptions::new().create(true).write(true).open(path)?;
        if file.metadata()?.len() > 0 {
            return Err(SpoolError::Config(format!(
                "Refusing to write header into non-empty file {}",
                path.display()
            )));
        }

        let meta_bytes = match metadata {
            Some(m) => m.to_bytes()?,
            None => Vec::new(),
        };

        let mut header = Vec::with_capacity(HEADER_PREFIX_SIZE as usize + meta_bytes.len());
        header.extend_from_slice(&SENTINEL.to_be_bytes());
        header.extend_from_slice(&magic_value.to_be_bytes());
        header.extend_from_slice(&(meta_bytes.len() as u32).to_be_bytes());
        header.extend_from_slice(&meta_bytes);

        file.write_all(&header)?;
        file.sync_all()?;

        debug!(
            path = %path.display(),
            magic_value,
            meta_len = meta_bytes.len(),
            "Wrote file header"
        );

        Ok(FileHeader {
            magic_value,
            metadata: metadata.cloned(),
            data_offset: header.len() as u64,
        })
    }

    fn read_file_header(&self, path: &Path) -> Result<Option<FileHeader>> {
        let (mut file, file_len, magic_value, meta_len) = match Self::read_prefix(path)? {
            Some(prefix) => prefix,
            None => return Ok(None),
        };

        let data_offset = HEADER_PREFIX_SIZE + meta_len as u64;
        if data_offset > file_len {
            warn!(
                path = %path.display(),
                meta_len,
                file_len,
                "Truncated header metadata"
            );
            return Ok(None);
        }

        let metadata = if meta_len == 0 {
            None
        } else {
            let mut meta_bytes = vec![0u8; meta_len as usize];
            file.read_exact(&mut meta_bytes)?;
            match Metadata::from_bytes(&meta_bytes) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable header metadata");
                    return Ok(None);
                }
            }
        };

        Ok(Some(FileHeader {
            magic_value,
            metadata,
            data_offset,
        }))
    }

    fn read_magic_value(&self, path: &Path) -> Result<Option<u32>> {
        Ok(Self::read_prefix(path)?.map(|(_, _, magic, _)| magic))
    }
}
