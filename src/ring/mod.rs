//! Ring Buffer Module
//!
//! Fixed-capacity in-memory buffers that evict their oldest element when full.
//!
//! ## Responsibilities
//! - Overwrite-on-full circular storage with all-time add/evict counters
//! - Addressing by all-time index (`get`) or by window position (`get_relative`)
//! - Producer backpressure for cross-thread hand-off
//!
//! ## Index Spaces
//! ```text
//! all-time:   0   1   2   3   4          size = 5, overflow = 2
//!            [x] [x] [3] [4] [5]
//!                     └──────┘
//! window:              0   1   2         available = 3
//! ```

mod blocking;
mod overwriting;

pub use blocking::BlockingCircularBuffer;
pub use overwriting::{Iter, OverwritingCircularBuffer};
