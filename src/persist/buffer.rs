//! Persistent Codec Buffer
//!
//! Composes header, index and data strategies with a codec into an on-disk
//! buffer of typed records.

use std::fs;
use std::io::ErrorKind;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::buffer::{Buffer, ElementProcessor, Resettable};
use crate::codec::Codec;
use crate::config::BufferConfig;
use crate::error::{Result, SpoolError};

use super::{
    file_len, remove_if_exists, strategy_for, DataStrategy, DefaultFileHeaderStrategy,
    DefaultIndexStrategy, FileHeader, FileHeaderStrategy, FilePair, IndexStrategy, Metadata,
    INDEX_ENTRY_SIZE,
};

/// On-disk buffer of records addressed by logical index
///
/// ## Concurrency
/// - `get` / `size`: shared read lock, may run concurrently
/// - `add` / `add_all` / `set` / `reset`: exclusive write lock
/// - No file handle outlives a call, so files deleted between calls are
///   detected on the next call. Another process writing the same files
///   concurrently is not detected and corrupts the buffer.
///
/// ## Recovery
/// - Data file deleted: the next write rewrites the header and starts over
/// - Index file deleted: the next write re-indexes the data file
/// - Index missing when *opening* a data file with records: `open` fails
///   with [`SpoolError::Config`]; see [`IndexRecovery`](super::IndexRecovery)
pub struct PersistentCodecBuffer<T> {
    config: BufferConfig,
    codec: Arc<dyn Codec<T>>,
    header_strategy: Arc<dyn FileHeaderStrategy>,
    index_strategy: Arc<dyn IndexStrategy>,
    state: RwLock<State<T>>,
}

/// Mutable state guarded by the buffer lock
struct State<T> {
    /// Header currently on disk
    header: FileHeader,
    /// Metadata written whenever the header has to be recreated
    creation_metadata: Option<Metadata>,
    /// Layout fixed by the header's sparse flag
    data_strategy: Box<dyn DataStrategy>,
    /// Invoked after successful writes, under the write lock
    processors: Vec<Arc<dyn ElementProcessor<T>>>,
}

impl<T> PersistentCodecBuffer<T> {
    /// Open or create a buffer with the default header and index formats
    pub fn open(config: BufferConfig, codec: impl Codec<T> + 'static) -> Result<Self> {
        Self::with_strategies(
            config,
            Arc::new(codec),
            Arc::new(DefaultFileHeaderStrategy),
            Arc::new(DefaultIndexStrategy),
        )
    }

    /// Open or create a buffer with custom strategies
    ///
    /// On open:
    /// 1. Data file missing or shorter than a header: write a fresh header,
    ///    discard any index file
    /// 2. Otherwise read the header and check sentinel and magic value
    /// 3. Data file holds records: require a non-empty, 8-byte aligned index
    pub fn with_strategies(
        config: BufferConfig,
        codec: Arc<dyn Codec<T>>,
        header_strategy: Arc<dyn FileHeaderStrategy>,
        index_strategy: Arc<dyn IndexStrategy>,
    ) -> Result<Self> {
        if let Some(parent) = config.data_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data_len = file_len(&config.data_path)?;

        let header = if data_len < header_strategy.minimal_header_size() {
            let metadata = Self::configured_metadata(&config);
            Self::write_fresh_header(&config, header_strategy.as_ref(), metadata.as_ref())?
        } else {
            let header = header_strategy
                .read_file_header(&config.data_path)?
                .ok_or_else(|| {
                    SpoolError::HeaderMismatch(format!(
                        "{} has no compatible file header",
                        config.data_path.display()
                    ))
                })?;

            if header.magic_value != config.magic_value {
                return Err(SpoolError::HeaderMismatch(format!(
                    "{}: expected magic value 0x{:08x}, found 0x{:08x}",
                    config.data_path.display(),
                    config.magic_value,
                    header.magic_value
                )));
            }

            if data_len > header.data_offset {
                let index_len = file_len(&config.index_path)?;
                if index_len < INDEX_ENTRY_SIZE || index_len % INDEX_ENTRY_SIZE != 0 {
                    return Err(SpoolError::Config(format!(
                        "{} holds records but index {} is missing or inconsistent ({} bytes)",
                        config.data_path.display(),
                        config.index_path.display(),
                        index_len
                    )));
                }
            }

            if header.is_sparse() != config.sparse {
                warn!(
                    path = %config.data_path.display(),
                    sparse = header.is_sparse(),
                    "Existing header overrides configured data layout"
                );
            }

            header
        };

        debug!(
            data = %config.data_path.display(),
            index = %config.index_path.display(),
            magic_value = header.magic_value,
            sparse = header.is_sparse(),
            "Opened persistent buffer"
        );

        let state = State {
            creation_metadata: header.metadata.clone(),
            data_strategy: strategy_for(&header),
            header,
            processors: Vec::new(),
        };

        Ok(Self {
            config,
            codec,
            header_strategy,
            index_strategy,
            state: RwLock::new(state),
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get the record at `index`
    ///
    /// Returns `None` if either file is unreadable, `index` is out of range or
    /// tombstoned, or the record fails to decode. Failures are logged.
    pub fn get(&self, index: u64) -> Option<T> {
        let state = self.state.read();

        let mut files = self.open_read(&state)?;
        let payload = match self.read_payload(&state, &mut files, index) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(index, error = %e, "Failed to read record");
                return None;
            }
        };

        match self.codec.decode(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(index, error = %e, "Failed to decode record");
                None
            }
        }
    }

    /// Number of record slots (tombstones included for the sparse layout)
    pub fn size(&self) -> u64 {
        let state = self.state.read();
        match self.open_read(&state) {
            Some(mut files) => state.data_strategy.size(&mut files).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read index size");
                0
            }),
            None => 0,
        }
    }

    /// Growth is bounded only by disk space
    pub fn is_full(&self) -> bool {
        false
    }

    /// Iterate over every slot from 0 to the current size
    ///
    /// Each item is the result of [`get`](Self::get); concurrent writes may
    /// or may not be observed.
    pub fn iter(&self) -> impl Iterator<Item = Option<T>> + '_ {
        (0..self.size()).map(move |i| self.get(i))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Append a record, returning its logical index
    pub fn add(&self, element: &T) -> Result<u64> {
        let payload = self.codec.encode(element)?;

        let mut state = self.state.write();
        self.ensure_initialized(&mut state)?;

        let index = {
            let mut files = self.open_write(&state)?;
            state.data_strategy.add(&mut files, &payload)?
        };

        for processor in &state.processors {
            processor.process(element);
        }

        Ok(index)
    }

    /// Append several records, returning the range of assigned indices
    ///
    /// All elements are encoded before anything is written. The batch is not
    /// atomic: an I/O error leaves the records written so far in place.
    pub fn add_all(&self, elements: &[T]) -> Result<Range<u64>> {
        let payloads = elements
            .iter()
            .map(|e| self.codec.encode(e))
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state.write();
        self.ensure_initialized(&mut state)?;

        let range = {
            let mut files = self.open_write(&state)?;
            let mut assigned: Option<Range<u64>> = None;
            for payload in &payloads {
                let index = state.data_strategy.add(&mut files, payload)?;
                assigned.get_or_insert(index..index).end = index + 1;
            }
            match assigned {
                Some(range) => range,
                None => {
                    let size = state.data_strategy.size(&mut files)?;
                    size..size
                }
            }
        };

        if !elements.is_empty() {
            for processor in &state.processors {
                processor.process_batch(elements);
            }
        }

        Ok(range)
    }

    /// Write (`Some`) or tombstone (`None`) the record at `index`
    ///
    /// Sparse layout only; the dense layout returns
    /// [`SpoolError::Unsupported`]. Returns `false` when overwrite is disabled
    /// and `index` already holds a record.
    pub fn set(&self, index: u64, element: Option<&T>) -> Result<bool> {
        let payload = element.map(|e| self.codec.encode(e)).transpose()?;

        let mut state = self.state.write();
        if !state.data_strategy.is_sparse() {
            return Err(SpoolError::Unsupported(
                "set requires the sparse data layout".to_string(),
            ));
        }
        self.ensure_initialized(&mut state)?;

        let written = {
            let mut files = self.open_write(&state)?;
            state.data_strategy.set(
                &mut files,
                index,
                payload.as_deref(),
                self.config.allow_overwrite,
            )?
        };

        if written {
            if let Some(element) = element {
                for processor in &state.processors {
                    processor.process(element);
                }
            }
        }

        Ok(written)
    }

    /// Delete both files, write a fresh header and reset resettable processors
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.write();

        remove_if_exists(&self.config.data_path)?;
        remove_if_exists(&self.config.index_path)?;

        let header = Self::write_fresh_header(
            &self.config,
            self.header_strategy.as_ref(),
            state.creation_metadata.as_ref(),
        )?;
        state.header = header;

        for processor in &state.processors {
            if let Some(resettable) = processor.as_resettable() {
                resettable.reset()?;
            }
        }

        debug!(data = %self.config.data_path.display(), "Reset persistent buffer");
        Ok(())
    }

    /// Register a processor invoked after every successful write
    pub fn register_processor(&self, processor: Arc<dyn ElementProcessor<T>>) {
        self.state.write().processors.push(processor);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Header currently on disk
    pub fn header(&self) -> FileHeader {
        self.state.read().header.clone()
    }

    pub fn metadata(&self) -> Option<Metadata> {
        self.state.read().header.metadata.clone()
    }

    pub fn magic_value(&self) -> u32 {
        self.state.read().header.magic_value
    }

    pub fn is_sparse(&self) -> bool {
        self.state.read().data_strategy.is_sparse()
    }

    pub fn data_path(&self) -> &Path {
        &self.config.data_path
    }

    pub fn index_path(&self) -> &Path {
        &self.config.index_path
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Metadata a brand new file gets from the configuration
    fn configured_metadata(config: &BufferConfig) -> Option<Metadata> {
        match (&config.metadata, config.sparse) {
            (Some(entries), sparse) => Some(Metadata::new(sparse, entries.clone())),
            (None, true) => Some(Metadata::new(true, Default::default())),
            (None, false) => None,
        }
    }

    /// Replace whatever is at the data path with a fresh header; drop the index
    fn write_fresh_header(
        config: &BufferConfig,
        header_strategy: &dyn FileHeaderStrategy,
        metadata: Option<&Metadata>,
    ) -> Result<FileHeader> {
        remove_if_exists(&config.data_path)?;
        remove_if_exists(&config.index_path)?;
        header_strategy.write_file_header(&config.data_path, config.magic_value, metadata)
    }

    /// Recreate the header if the data file vanished since the last write
    fn ensure_initialized(&self, state: &mut State<T>) -> Result<()> {
        let data_len = file_len(&self.config.data_path)?;
        if data_len >= self.header_strategy.minimal_header_size() {
            return Ok(());
        }

        debug!(
            data = %self.config.data_path.display(),
            "Data file missing, re-initialising header"
        );
        state.header = Self::write_fresh_header(
            &self.config,
            self.header_strategy.as_ref(),
            state.creation_metadata.as_ref(),
        )?;
        Ok(())
    }

    /// Open both files for reading, `None` if either is unavailable
    fn open_read(&self, state: &State<T>) -> Option<FilePair<'_>> {
        match FilePair::open_read(
            &self.config.data_path,
            &self.config.index_path,
            state.header.data_offset,
            self.index_strategy.as_ref(),
        ) {
            Ok(files) => Some(files),
            Err(SpoolError::Io(e)) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = %e, "Failed to open buffer files");
                None
            }
        }
    }

    fn open_write(&self, state: &State<T>) -> Result<FilePair<'_>> {
        FilePair::open_write(
            &self.config.data_path,
            &self.config.index_path,
            state.header.data_offset,
            self.index_strategy.as_ref(),
        )
    }

    fn read_payload(
        &self,
        state: &State<T>,
        files: &mut FilePair<'_>,
        index: u64,
    ) -> Result<Option<Vec<u8>>> {
        if index >= state.data_strategy.size(files)? {
            return Ok(None);
        }
        state.data_strategy.get(files, index)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<T> Buffer<T> for PersistentCodecBuffer<T> {
    fn get(&self, index: u64) -> Option<T> {
        PersistentCodecBuffer::get(self, index)
    }

    fn size(&self) -> u64 {
        PersistentCodecBuffer::size(self)
    }

    fn is_full(&self) -> bool {
        PersistentCodecBuffer::is_full(self)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }
}

impl<T> Resettable for PersistentCodecBuffer<T> {
    fn reset(&self) -> Result<()> {
        PersistentCodecBuffer::reset(self)
    }
}

impl<T> std::fmt::Debug for PersistentCodecBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentCodecBuffer")
            .field("data_path", &self.config.data_path)
            .field("index_path", &self.config.index_path)
            .field("magic_value", &self.config.magic_value)
            .finish()
    }
}
