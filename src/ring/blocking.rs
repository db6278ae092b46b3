//! Blocking Circular Buffer
//!
//! Thread-safe ring that makes producers wait instead of overwriting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::buffer::{Buffer, Resettable};
use crate::config::RingConfig;
use crate::error::Result;

use super::OverwritingCircularBuffer;

/// Mutex-guarded [`OverwritingCircularBuffer`] with producer backpressure
///
/// ## Congestion
/// `add` on a full ring releases the lock, waits up to `congestion_delay`
/// (or until a consumer frees a slot), and retries until space appears.
///
/// ## Interruption
/// [`interrupt`](Self::interrupt) aborts every `add` waiting at that moment.
/// The pending element is dropped and `add` returns `false`; no error is
/// raised. Producers that start after the interrupt are unaffected.
///
/// All other operations forward to the ring under the lock and never block
/// beyond acquiring it.
pub struct BlockingCircularBuffer<T> {
    ring: Mutex<OverwritingCircularBuffer<T>>,
    /// Signalled whenever a slot is freed or waiters are interrupted
    space_available: Condvar,
    congestion_delay: Duration,
    /// Bumped by `interrupt`; waiters compare against the value they started with
    interrupt_epoch: AtomicU64,
}

impl<T> BlockingCircularBuffer<T> {
    pub fn new(config: RingConfig) -> Result<Self> {
        Ok(Self {
            ring: Mutex::new(OverwritingCircularBuffer::new(config.capacity)?),
            space_available: Condvar::new(),
            congestion_delay: config.congestion_delay,
            interrupt_epoch: AtomicU64::new(0),
        })
    }

    pub fn with_capacity(capacity: usize, congestion_delay: Duration) -> Result<Self> {
        Self::new(RingConfig::new(capacity).congestion_delay(congestion_delay))
    }

    // =========================================================================
    // Producer
    // =========================================================================

    /// Add an element, waiting while the ring is full
    ///
    /// Returns `true` once stored, `false` if an interrupt dropped it.
    pub fn add(&self, element: T) -> bool {
        let epoch = self.interrupt_epoch.load(Ordering::Acquire);
        let mut ring = self.ring.lock();

        if ring.is_full() {
            trace!(capacity = ring.capacity(), "Ring congested, producer waiting");
        }

        while ring.is_full() {
            if self.interrupted_since(epoch) {
                debug!("Producer interrupted while congested, dropping element");
                return false;
            }

            if self.congestion_delay.is_zero() {
                MutexGuard::unlocked(&mut ring, thread::yield_now);
            } else {
                self.space_available.wait_for(&mut ring, self.congestion_delay);
            }

            if self.interrupted_since(epoch) {
                debug!("Producer interrupted while congested, dropping element");
                return false;
            }
        }

        ring.add(element);
        true
    }

    /// Add several elements in order, stopping at the first interrupted add
    ///
    /// Returns the number of elements stored.
    pub fn add_all<I: IntoIterator<Item = T>>(&self, elements: I) -> usize {
        let mut stored = 0;
        for element in elements {
            if !self.add(element) {
                break;
            }
            stored += 1;
        }
        stored
    }

    /// Abort every `add` currently waiting for space
    pub fn interrupt(&self) {
        self.interrupt_epoch.fetch_add(1, Ordering::AcqRel);
        self.space_available.notify_all();
    }

    fn interrupted_since(&self, epoch: u64) -> bool {
        self.interrupt_epoch.load(Ordering::Acquire) != epoch
    }

    // =========================================================================
    // Consumer
    // =========================================================================

    pub fn remove_first(&self) -> Option<T> {
        let element = self.ring.lock().remove_first();
        if element.is_some() {
            self.space_available.notify_one();
        }
        element
    }

    pub fn remove_all(&self) -> Vec<T> {
        let drained = self.ring.lock().remove_all();
        if !drained.is_empty() {
            self.space_available.notify_all();
        }
        drained
    }

    pub fn clear(&self) {
        self.ring.lock().clear();
        self.space_available.notify_all();
    }

    pub fn reset(&self) {
        self.ring.lock().reset();
        self.space_available.notify_all();
    }

    // =========================================================================
    // Forwarded Reads
    // =========================================================================

    pub fn get(&self, index: u64) -> Option<T>
    where
        T: Clone,
    {
        self.ring.lock().get(index).cloned()
    }

    pub fn get_relative(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.ring.lock().get_relative(index).cloned()
    }

    pub fn set_relative(&self, index: usize, element: T) -> Result<T> {
        self.ring.lock().set_relative(index, element)
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.ring.lock().to_vec()
    }

    pub fn available(&self) -> usize {
        self.ring.lock().available()
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    pub fn size(&self) -> u64 {
        self.ring.lock().size()
    }

    pub fn overflow_counter(&self) -> u64 {
        self.ring.lock().overflow_counter()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.lock().is_full()
    }

    pub fn congestion_delay(&self) -> Duration {
        self.congestion_delay
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl<T: Clone + Send> Buffer<T> for BlockingCircularBuffer<T> {
    fn get(&self, index: u64) -> Option<T> {
        BlockingCircularBuffer::get(self, index)
    }

    fn size(&self) -> u64 {
        BlockingCircularBuffer::size(self)
    }

    fn is_full(&self) -> bool {
        BlockingCircularBuffer::is_full(self)
    }

    fn is_empty(&self) -> bool {
        BlockingCircularBuffer::is_empty(self)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }
}

impl<T: Send> Resettable for BlockingCircularBuffer<T> {
    fn reset(&self) -> Result<()> {
        BlockingCircularBuffer::reset(self);
        Ok(())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for BlockingCircularBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingCircularBuffer")
            .field("ring", &*self.ring.lock())
            .field("congestion_delay", &self.congestion_delay)
            .finish()
    }
}
