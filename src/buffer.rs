//! Buffer Traits
//!
//! The read interface shared by every buffer, the element processors invoked
//! after persistent writes, and the optional capabilities collaborators may
//! expose.
//!
//! ## Capabilities
//! A collaborator that can be reset or disposed says so by overriding
//! `as_resettable()` / `as_disposable()`. Callers always check:
//!
//! ```text
//! if let Some(r) = buffer.as_resettable() {
//!     r.reset()?;
//! }
//! ```

use crate::error::Result;

// =============================================================================
// Capabilities
// =============================================================================

/// Something that can be returned to its initial, empty state
pub trait Resettable: Send + Sync {
    fn reset(&self) -> Result<()>;
}

/// Something holding resources that should be released before drop
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

// =============================================================================
// Buffer
// =============================================================================

/// Random-access read interface over an ordered sequence of records
pub trait Buffer<T>: Send + Sync {
    /// Get the record at a logical index
    ///
    /// Returns `None` for indices outside the buffer, evicted or tombstoned
    /// records, and records that failed to decode. Never panics.
    fn get(&self, index: u64) -> Option<T>;

    /// Number of addressable records
    fn size(&self) -> u64;

    /// Whether the buffer can accept no further elements without eviction
    fn is_full(&self) -> bool;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        None
    }

    fn as_disposable(&self) -> Option<&dyn Disposable> {
        None
    }
}

// =============================================================================
// Element Processor
// =============================================================================

/// Callback invoked synchronously after elements were written
///
/// Processors run while the writer still holds the buffer's write lock, so
/// they must not call back into the same buffer.
pub trait ElementProcessor<T>: Send + Sync {
    fn process(&self, element: &T);

    fn process_batch(&self, elements: &[T]) {
        for element in elements {
            self.process(element);
        }
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        None
    }
}
