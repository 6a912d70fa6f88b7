//! Fixed-capacity FIFO buffer with eviction bookkeeping.
//!
//! Every rolling window in the monitor sits on top of this buffer: the
//! capacity is sized so that the buffer holds exactly one window's worth
//! of probe observations, and inserting into a full buffer hands the
//! evicted element back so dependent counters can be decremented.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// A bounded FIFO buffer that evicts the oldest element on overflow.
///
/// The capacity is fixed at construction and never changes.
#[derive(Debug, Clone)]
pub struct EvictingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> EvictingBuffer<T> {
    /// Create a buffer holding up to `capacity` elements.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.get()),
            capacity: capacity.get(),
        }
    }

    /// Append an element, evicting and returning the oldest one if the
    /// buffer is already at capacity.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.items.pop_front()
        } else {
            None
        };

        self.items.push_back(item);
        evicted
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Maximum number of elements the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over the current elements, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
