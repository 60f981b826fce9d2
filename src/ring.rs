//! Fixed-capacity circular storage.
//!
//! `Ring` knows nothing about threads. `BoundedQueue` wraps it in a mutex and
//! only touches it once the wait condition for the operation is satisfied.

use crate::Item;

/// Ring buffer of `capacity` slots with read (`head`) and write (`tail`)
/// cursors that wrap modulo the capacity.
#[derive(Debug, Clone)]
pub struct Ring {
    slots: Box<[Item]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl Ring {
    /// Creates an empty ring. A zero capacity is rounded up to one slot;
    /// `Config::validate` rejects it before it gets here.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity.max(1)].into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Next slot to be read.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Next slot to be written.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Writes `item` at `tail`. A full ring hands the item back untouched.
    pub fn push_back(&mut self, item: Item) -> Result<(), Item> {
        if self.is_full() {
            return Err(item);
        }
        self.slots[self.tail] = item;
        self.tail = (self.tail + 1) % self.slots.len();
        self.count += 1;
        Ok(())
    }

    /// Reads the item at `head`, or `None` when the ring is empty.
    pub fn pop_front(&mut self) -> Option<Item> {
        if self.is_empty() {
            return None;
        }
        let item = self.slots[self.head];
        self.head = (self.head + 1) % self.slots.len();
        self.count -= 1;
        Some(item)
    }
}

// =============================================================================
// Tests
// =============================================================================
