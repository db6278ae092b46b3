//! Overwriting Circular Buffer
//!
//! Fixed-capacity ring that evicts its oldest element on add when full.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::buffer::Buffer;
use crate::error::{Result, SpoolError};

/// Fixed-capacity ring with overwrite-on-full eviction
///
/// Two index spaces:
/// - all-time (`get`): every added element gets the next index; evicted
///   indices return `None`
/// - window (`get_relative`): `0..available()`, oldest first
///
/// `start == end` is ambiguous between empty and full, hence the `full` flag.
/// Not synchronized; see [`BlockingCircularBuffer`](super::BlockingCircularBuffer)
/// for a thread-safe wrapper.
pub struct OverwritingCircularBuffer<T> {
    slots: Vec<Option<T>>,
    /// Slot of the oldest visible element
    start: usize,
    /// Slot the next add writes to
    end: usize,
    full: bool,
    /// All-time number of adds
    size: u64,
    /// All-time number of elements evicted by overwrite
    overflow_counter: u64,
}

impl<T> OverwritingCircularBuffer<T> {
    /// Create a ring with `capacity` slots (at least 1)
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SpoolError::Config(
                "Ring buffer capacity must be at least 1".to_string(),
            ));
        }

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Ok(Self {
            slots,
            start: 0,
            end: 0,
            full: false,
            size: 0,
            overflow_counter: 0,
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Add an element, evicting the oldest one if the ring is full
    pub fn add(&mut self, element: T) {
        if self.full {
            self.start = self.wrap(self.start + 1);
            self.overflow_counter += 1;
        }

        self.slots[self.end] = Some(element);
        self.end = self.wrap(self.end + 1);
        self.full = self.end == self.start;
        self.size += 1;
    }

    pub fn add_all<I: IntoIterator<Item = T>>(&mut self, elements: I) {
        for element in elements {
            self.add(element);
        }
    }

    /// Replace the element at window position `index`, returning the old one
    pub fn set_relative(&mut self, index: usize, element: T) -> Result<T> {
        let available = self.available();
        if index >= available {
            return Err(SpoolError::IndexOutOfBounds {
                index: index as u64,
                available: available as u64,
            });
        }

        let slot = self.wrap(self.start + index);
        self.slots[slot].replace(element).ok_or_else(|| {
            SpoolError::Corruption(format!("Ring slot {} unexpectedly empty", slot))
        })
    }

    /// Remove and return the oldest visible element
    pub fn remove_first(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let element = self.slots[self.start].take();
        self.start = self.wrap(self.start + 1);
        self.full = false;
        element
    }

    /// Remove every visible element, oldest first
    pub fn remove_all(&mut self) -> Vec<T> {
        let mut drained = Vec::with_capacity(self.available());
        while let Some(element) = self.remove_first() {
            drained.push(element);
        }
        drained
    }

    /// Drop all visible elements; the all-time counters are kept
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.start = 0;
        self.end = 0;
        self.full = false;
    }

    /// Drop all elements and zero the all-time counters
    pub fn reset(&mut self) {
        self.clear();
        self.size = 0;
        self.overflow_counter = 0;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Element with all-time index `index`, `None` if evicted, removed or not yet added
    pub fn get(&self, index: u64) -> Option<&T> {
        let first = self.size - self.available() as u64;
        if index < first || index >= self.size {
            return None;
        }
        self.get_relative((index - first) as usize)
    }

    /// Element at window position `index` (0 = oldest visible)
    pub fn get_relative(&self, index: usize) -> Option<&T> {
        if index >= self.available() {
            return None;
        }
        self.slots[self.wrap(self.start + index)].as_ref()
    }

    /// Number of currently visible elements
    pub fn available(&self) -> usize {
        if self.full {
            self.slots.len()
        } else if self.end >= self.start {
            self.end - self.start
        } else {
            self.slots.len() - self.start + self.end
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// All-time number of adds
    pub fn size(&self) -> u64 {
        self.size
    }

    /// All-time number of elements evicted by overwrite
    pub fn overflow_counter(&self) -> u64 {
        self.overflow_counter
    }

    pub fn is_empty(&self) -> bool {
        !self.full && self.start == self.end
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Iterate over the visible window, oldest first
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            ring: self,
            position: 0,
            remaining: self.available(),
        }
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    #[inline]
    fn wrap(&self, slot: usize) -> usize {
        slot % self.slots.len()
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Iterator over the visible window of an [`OverwritingCircularBuffer`]
pub struct Iter<'a, T> {
    ring: &'a OverwritingCircularBuffer<T>,
    position: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let element = self.ring.get_relative(self.position);
        self.position += 1;
        self.remaining -= 1;
        element
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}

impl<'a, T> IntoIterator for &'a OverwritingCircularBuffer<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

// Equality and hashing only see the visible window, never the counters.

impl<T: PartialEq> PartialEq for OverwritingCircularBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.available() == other.available() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for OverwritingCircularBuffer<T> {}

impl<T: Hash> Hash for OverwritingCircularBuffer<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.available().hash(state);
        for element in self.iter() {
            element.hash(state);
        }
    }
}

impl<T: Clone> Clone for OverwritingCircularBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            start: self.start,
            end: self.end,
            full: self.full,
            size: self.size,
            overflow_counter: self.overflow_counter,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OverwritingCircularBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverwritingCircularBuffer")
            .field("capacity", &self.capacity())
            .field("size", &self.size)
            .field("overflow_counter", &self.overflow_counter)
            .field("elements", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: Clone + Send + Sync> Buffer<T> for OverwritingCircularBuffer<T> {
    fn get(&self, index: u64) -> Option<T> {
        OverwritingCircularBuffer::get(self, index).cloned()
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_full(&self) -> bool {
        self.full
    }

    fn is_empty(&self) -> bool {
        OverwritingCircularBuffer::is_empty(self)
    }
}
