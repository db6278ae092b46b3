//! Tests for OverwritingCircularBuffer
//!
//! These tests verify:
//! - Overwrite-on-full eviction and the all-time counters
//! - All-time (`get`) versus window (`get_relative`) addressing
//! - Removal, clear and reset semantics
//! - Equality and hashing over the visible window only

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use spool::{Buffer, OverwritingCircularBuffer, SpoolError};

// =============================================================================
// Helper Functions
// =============================================================================

fn ring_with(capacity: usize, elements: &[i32]) -> OverwritingCircularBuffer<i32> {
    let mut ring = OverwritingCircularBuffer::new(capacity).unwrap();
    ring.add_all(elements.iter().copied());
    ring
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

// =============================================================================
// Construction Tests
// =============================================================================

#[test]
fn test_zero_capacity_rejected() {
    let result = OverwritingCircularBuffer::<i32>::new(0);
    assert!(matches!(result, Err(SpoolError::Config(_))));
}

#[test]
fn test_new_ring_is_empty() {
    let ring = OverwritingCircularBuffer::<i32>::new(4).unwrap();
    assert!(ring.is_empty());
    assert!(!ring.is_full());
    assert_eq!(ring.capacity(), 4);
    assert_eq!(ring.available(), 0);
    assert_eq!(ring.size(), 0);
    assert_eq!(ring.get(0), None);
    assert_eq!(ring.get_relative(0), None);
}

// =============================================================================
// Eviction Tests
// =============================================================================

#[test]
fn test_capacity_three_scenario() {
    let ring = ring_with(3, &[1, 2, 3, 4, 5]);

    assert_eq!(ring.size(), 5);
    assert_eq!(ring.overflow_counter(), 2);
    assert_eq!(ring.available(), 3);
    assert!(ring.is_full());

    assert_eq!(ring.get(0), None);
    assert_eq!(ring.get(1), None);
    assert_eq!(ring.get(2), Some(&3));
    assert_eq!(ring.get(3), Some(&4));
    assert_eq!(ring.get(4), Some(&5));
    assert_eq!(ring.get(5), None);
    assert_eq!(ring.get_relative(0), Some(&3));
    assert_eq!(ring.get_relative(2), Some(&5));
    assert_eq!(ring.get_relative(3), None);
}

#[test]
fn test_fill_exactly_to_capacity() {
    let ring = ring_with(3, &[1, 2, 3]);
    assert!(ring.is_full());
    assert_eq!(ring.overflow_counter(), 0);
    assert_eq!(ring.to_vec(), vec![1, 2, 3]);
}

#[test]
fn test_capacity_one() {
    let mut ring = ring_with(1, &[10, 20, 30]);
    assert_eq!(ring.to_vec(), vec![30]);
    assert_eq!(ring.overflow_counter(), 2);
    assert_eq!(ring.get(2), Some(&30));

    assert_eq!(ring.remove_first(), Some(30));
    assert!(ring.is_empty());
}

#[test]
fn test_long_run_keeps_newest() {
    let mut ring = OverwritingCircularBuffer::new(4).unwrap();
    ring.add_all(0..1000u64);

    assert_eq!(ring.size(), 1000);
    assert_eq!(ring.overflow_counter(), 996);
    assert_eq!(ring.to_vec(), vec![996, 997, 998, 999]);
    assert_eq!(ring.get(996), Some(&996));
    assert_eq!(ring.get(995), None);
}

// =============================================================================
// Relative Access Tests
// =============================================================================

#[test]
fn test_set_relative_replaces() {
    let mut ring = ring_with(3, &[1, 2, 3, 4]);

    assert_eq!(ring.set_relative(1, 40).unwrap(), 3);
    assert_eq!(ring.to_vec(), vec![2, 40, 4]);
    assert_eq!(ring.get(2), Some(&40));
}

#[test]
fn test_set_relative_out_of_bounds() {
    let mut ring = ring_with(3, &[1]);

    match ring.set_relative(1, 9) {
        Err(SpoolError::IndexOutOfBounds { index, available }) => {
            assert_eq!(index, 1);
            assert_eq!(available, 1);
        }
        other => panic!("expected IndexOutOfBounds, got {:?}", other),
    }
}

// =============================================================================
// Removal Tests
// =============================================================================

#[test]
fn test_remove_first_in_order() {
    let mut ring = ring_with(3, &[1, 2, 3, 4]);

    assert_eq!(ring.remove_first(), Some(2));
    assert!(!ring.is_full());
    assert_eq!(ring.available(), 2);
    assert_eq!(ring.remove_first(), Some(3));
    assert_eq!(ring.remove_first(), Some(4));
    assert_eq!(ring.remove_first(), None);
    assert!(ring.is_empty());

    // Counters are all-time
    assert_eq!(ring.size(), 4);
    assert_eq!(ring.overflow_counter(), 1);
}

#[test]
fn test_get_after_removal() {
    let mut ring = ring_with(4, &[1, 2, 3]);
    ring.remove_first();

    assert_eq!(ring.get(0), None);
    assert_eq!(ring.get(1), Some(&2));
    assert_eq!(ring.get(2), Some(&3));
}

#[test]
fn test_remove_all_drains_window() {
    let mut ring = ring_with(3, &[1, 2, 3, 4, 5]);

    assert_eq!(ring.remove_all(), vec![3, 4, 5]);
    assert!(ring.is_empty());
    assert!(ring.remove_all().is_empty());
}

#[test]
fn test_clear_keeps_counters() {
    let mut ring = ring_with(2, &[1, 2, 3]);
    ring.clear();

    assert!(ring.is_empty());
    assert_eq!(ring.size(), 3);
    assert_eq!(ring.overflow_counter(), 1);
    assert_eq!(ring.get(2), None);

    ring.add(4);
    assert_eq!(ring.get(3), Some(&4));
}

#[test]
fn test_reset_zeroes_counters() {
    let mut ring = ring_with(2, &[1, 2, 3]);
    ring.reset();

    assert!(ring.is_empty());
    assert_eq!(ring.size(), 0);
    assert_eq!(ring.overflow_counter(), 0);

    ring.add(7);
    assert_eq!(ring.get(0), Some(&7));
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_is_oldest_first() {
    let ring = ring_with(3, &[1, 2, 3, 4]);

    let iter = ring.iter();
    assert_eq!(iter.len(), 3);
    assert_eq!(iter.copied().collect::<Vec<_>>(), vec![2, 3, 4]);

    let mut via_ref = Vec::new();
    for element in &ring {
        via_ref.push(*element);
    }
    assert_eq!(via_ref, vec![2, 3, 4]);
}

// =============================================================================
// Equality Tests
// =============================================================================

#[test]
fn test_equality_ignores_counters_and_layout() {
    let a = ring_with(3, &[1, 2, 3, 4]);
    let mut b = ring_with(3, &[0, 0, 2, 3]);
    b.remove_first();
    b.add(4);

    assert_ne!(a.size(), b.size());
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
}

#[test]
fn test_inequality_on_content() {
    let a = ring_with(3, &[1, 2]);
    let b = ring_with(3, &[1, 3]);
    let c = ring_with(3, &[1, 2, 3]);

    assert_ne!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_clone_is_independent() {
    let original = ring_with(2, &[1, 2]);
    let mut copy = original.clone();
    copy.add(3);

    assert_eq!(original.to_vec(), vec![1, 2]);
    assert_eq!(copy.to_vec(), vec![2, 3]);
    assert_eq!(copy.overflow_counter(), 1);
}

// =============================================================================
// Buffer Trait Tests
// =============================================================================

#[test]
fn test_buffer_trait_view() {
    let ring = ring_with(3, &[1, 2, 3, 4, 5]);
    let buffer: &dyn Buffer<i32> = &ring;

    assert_eq!(buffer.get(4), Some(5));
    assert_eq!(buffer.get(0), None);
    assert_eq!(buffer.size(), 5);
    assert!(buffer.is_full());
    assert!(!buffer.is_empty());
    assert!(buffer.as_resettable().is_none());
}
