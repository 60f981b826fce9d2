//! Blocking bounded queue: one mutex, two condition variables.
//!
//! `put` waits on `not_full` while the ring has no free slot and signals
//! `not_empty` after writing. `take` waits on `not_empty` while the ring is
//! empty and the run is not over, and signals `not_full` after reading.
//! Completion is counter based: once `consumed_total` reaches the announced
//! `produced_total`, or producers are marked done and the ring is empty,
//! `take` returns `None` instead of waiting.
//!
//! Every read or write of the ring and the counters happens while holding
//! the lock, and every notification is issued before the guard is dropped.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::ring::Ring;
use crate::Item;

/// Lifecycle of a run as seen by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Producers may still enqueue.
    Running,
    /// Producers are finished; buffered items are still being drained.
    Draining,
    /// Producers are finished and the ring is empty; consumers exit.
    Done,
}

/// Counters maintained under the queue lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub puts: u64,
    pub takes: u64,
    /// Times a producer blocked on `not_full` (one per wait call).
    pub producer_waits: u64,
    /// Times a consumer blocked on `not_empty` (one per wait call).
    pub consumer_waits: u64,
    pub not_empty_signals: u64,
    pub not_full_signals: u64,
    pub broadcasts: u64,
    /// Highest occupancy ever observed.
    pub high_water: usize,
}

/// What a single `put` or `take` did, for logging by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    pub item: Item,
    /// Items in the ring right after the operation.
    pub occupancy: usize,
    /// Condition-variable waits the call went through before succeeding.
    pub waits: u64,
}

#[derive(Debug)]
struct State {
    ring: Ring,
    consumed_total: u64,
    producers_done: bool,
    consumer_lost: bool,
    stats: QueueStats,
}

#[derive(Debug)]
pub struct BoundedQueue {
    state: Mutex<State>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    produced_total: u64,
}

impl BoundedQueue {
    /// Empty queue of `capacity` slots expecting exactly `produced_total`
    /// items over its lifetime.
    pub fn new(capacity: usize, produced_total: u64) -> Self {
        let ring = Ring::with_capacity(capacity);
        Self {
            capacity: ring.capacity(),
            state: Mutex::new(State {
                ring,
                consumed_total: 0,
                producers_done: false,
                consumer_lost: false,
                stats: QueueStats::default(),
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            produced_total,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn produced_total(&self) -> u64 {
        self.produced_total
    }

    pub fn consumed_total(&self) -> u64 {
        self.lock().consumed_total
    }

    pub fn len(&self) -> usize {
        self.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ring.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }

    pub fn phase(&self) -> Phase {
        let state = self.lock();
        if !state.producers_done {
            Phase::Running
        } else if !state.ring.is_empty() {
            Phase::Draining
        } else {
            Phase::Done
        }
    }

    /// Blocks until a slot is free, then enqueues `item`. Once a consumer
    /// has been lost, a put that would have to wait drops `item` instead.
    pub fn put(&self, item: Item) {
        self.put_traced(item);
    }

    /// Blocks until an item is available and dequeues it, or returns `None`
    /// once every announced item has been consumed or producers are done and
    /// nothing is left.
    pub fn take(&self) -> Option<Item> {
        self.take_traced().map(|handoff| handoff.item)
    }

    /// `None` when the ring was full and a consumer had been lost, so no
    /// slot may ever free up.
    pub fn put_traced(&self, item: Item) -> Option<Handoff> {
        let mut state = self.lock();
        debug_assert!(!state.producers_done, "put after producers were marked done");

        let mut waits = 0;
        let mut pending = item;
        // The ring refuses the write while full; wait for a slot and retry.
        while let Err(rejected) = state.ring.push_back(pending) {
            if state.consumer_lost {
                return None;
            }
            pending = rejected;
            waits += 1;
            state.stats.producer_waits += 1;
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let occupancy = state.ring.len();
        debug_assert!(occupancy <= self.capacity);
        state.stats.puts += 1;
        state.stats.high_water = state.stats.high_water.max(occupancy);
        state.stats.not_empty_signals += 1;
        self.not_empty.notify_one();

        Some(Handoff {
            item,
            occupancy,
            waits,
        })
    }

    pub fn take_traced(&self) -> Option<Handoff> {
        let mut state = self.lock();

        let mut waits = 0;
        while state.ring.is_empty() && !self.exhausted(&state) {
            waits += 1;
            state.stats.consumer_waits += 1;
            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        // Still holding the lock: an empty ring here means the run is over.
        let item = state.ring.pop_front()?;
        state.consumed_total += 1;

        let occupancy = state.ring.len();
        debug_assert!(occupancy < self.capacity);
        state.stats.takes += 1;
        state.stats.not_full_signals += 1;
        self.not_full.notify_one();

        Some(Handoff {
            item,
            occupancy,
            waits,
        })
    }

    /// Called once after every producer has been joined. Wakes all consumers
    /// so the ones parked on an empty ring re-check and exit.
    pub fn mark_producers_done(&self) {
        let mut state = self.lock();
        state.producers_done = true;
        state.stats.broadcasts += 1;
        self.not_empty.notify_all();
    }

    /// Called when a consumer dies mid-run. Wakes every producer parked on a
    /// full ring; from now on a put that finds no free slot gives up.
    pub fn mark_consumer_lost(&self) {
        let mut state = self.lock();
        state.consumer_lost = true;
        state.stats.broadcasts += 1;
        self.not_full.notify_all();
    }

    fn exhausted(&self, state: &State) -> bool {
        state.consumed_total >= self.produced_total || state.producers_done
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Nothing panics while the lock is held, so a poisoned state is
        // still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_fifo_single_thread() {
        let queue = BoundedQueue::new(3, 3);
        queue.put(10);
        queue.put(20);
        queue.put(30);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.take(), Some(10));
        assert_eq!(queue.take(), Some(20));
        assert_eq!(queue.take(), Some(30));
        assert_eq!(queue.consumed_total(), 3);
        // Every announced item consumed: no blocking, end of stream.
        assert_eq!(queue.take(), None);
    }

    #[test]
    fn test_traced_handoffs() {
        let queue = BoundedQueue::new(2, 2);
        let put = queue.put_traced(5);
        assert_eq!(
            put,
            Some(Handoff {
                item: 5,
                occupancy: 1,
                waits: 0
            })
        );
        queue.put(6);
        let taken = queue.take_traced().unwrap();
        assert_eq!((taken.item, taken.occupancy, taken.waits), (5, 1, 0));
    }

    #[test]
    fn test_no_producers_exits_immediately() {
        let queue = BoundedQueue::new(1, 0);
        assert_eq!(queue.take(), None);
        assert_eq!(queue.stats().consumer_waits, 0);
    }

    #[test]
    fn test_producer_blocks_when_full() {
        let queue = Arc::new(BoundedQueue::new(1, 2));
        queue.put(1);

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.put_traced(2))
        };

        wait_until(|| queue.stats().producer_waits >= 1);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.take(), Some(1));
        let handoff = producer.join().unwrap().unwrap();
        assert!(handoff.waits >= 1);
        assert_eq!(queue.take(), Some(2));
        assert!(queue.stats().high_water <= 1);
    }

    #[test]
    fn test_consumer_blocks_until_put() {
        let queue = Arc::new(BoundedQueue::new(4, 1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take_traced())
        };

        wait_until(|| queue.stats().consumer_waits >= 1);
        queue.put(42);

        let handoff = consumer.join().unwrap().unwrap();
        assert_eq!(handoff.item, 42);
        assert!(handoff.waits >= 1);
    }

    #[test]
    fn test_blocked_consumer_does_not_spin() {
        let queue = Arc::new(BoundedQueue::new(2, 1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take())
        };

        wait_until(|| queue.stats().consumer_waits >= 1);
        thread::sleep(Duration::from_millis(100));
        // A spinning consumer would have re-entered the wait thousands of
        // times by now; a parked one only on the odd spurious wakeup.
        assert!(queue.stats().consumer_waits < 10);

        queue.put(1);
        assert_eq!(consumer.join().unwrap(), Some(1));
    }

    #[test]
    fn test_blocked_producer_does_not_spin() {
        let queue = Arc::new(BoundedQueue::new(1, 2));
        queue.put(1);
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.put(2))
        };

        wait_until(|| queue.stats().producer_waits >= 1);
        thread::sleep(Duration::from_millis(100));
        assert!(queue.stats().producer_waits < 10);

        assert_eq!(queue.take(), Some(1));
        producer.join().unwrap();
        assert_eq!(queue.take(), Some(2));
    }

    #[test]
    fn test_mark_done_wakes_waiting_consumers() {
        // Five items announced, none ever produced.
        let queue = Arc::new(BoundedQueue::new(3, 5));
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.take())
            })
            .collect();

        wait_until(|| queue.stats().consumer_waits >= 3);
        assert_eq!(queue.phase(), Phase::Running);

        queue.mark_producers_done();
        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), None);
        }
        assert_eq!(queue.phase(), Phase::Done);
        assert_eq!(queue.stats().broadcasts, 1);
    }

    #[test]
    fn test_lost_consumer_releases_parked_producer() {
        let queue = Arc::new(BoundedQueue::new(1, 3));
        queue.put(1);

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.put_traced(2))
        };
        wait_until(|| queue.stats().producer_waits >= 1);

        queue.mark_consumer_lost();
        assert_eq!(producer.join().unwrap(), None);

        // The dropped item never reached the ring.
        let stats = queue.stats();
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(queue.len(), 1);

        // A later put gives up at once instead of parking.
        assert_eq!(queue.put_traced(3), None);
        assert_eq!(queue.stats().producer_waits, stats.producer_waits);

        // Whatever is buffered still drains.
        assert_eq!(queue.take(), Some(1));
    }

    #[test]
    fn test_lost_consumer_does_not_block_free_slots() {
        let queue = BoundedQueue::new(2, 2);
        queue.mark_consumer_lost();
        assert_eq!(queue.put_traced(1).map(|handoff| handoff.item), Some(1));
        assert_eq!(queue.put_traced(2).map(|handoff| handoff.occupancy), Some(2));
        assert_eq!(queue.put_traced(3), None);
    }

    #[test]
    fn test_drains_buffered_items_after_done() {
        let queue = BoundedQueue::new(4, 3);
        queue.put(1);
        queue.put(2);
        queue.put(3);
        queue.mark_producers_done();
        assert_eq!(queue.phase(), Phase::Draining);

        assert_eq!(queue.take(), Some(1));
        assert_eq!(queue.take(), Some(2));
        assert_eq!(queue.phase(), Phase::Draining);
        assert_eq!(queue.take(), Some(3));
        assert_eq!(queue.phase(), Phase::Done);
        assert_eq!(queue.take(), None);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_short_production_does_not_hang() {
        // Ten announced, two delivered: done-marking still ends the stream.
        let queue = BoundedQueue::new(4, 10);
        queue.put(1);
        queue.put(2);
        queue.mark_producers_done();
        assert_eq!(queue.take(), Some(1));
        assert_eq!(queue.take(), Some(2));
        assert_eq!(queue.take(), None);
        assert_eq!(queue.consumed_total(), 2);
    }

    #[test]
    fn test_single_slot_preserves_order() {
        let queue = Arc::new(BoundedQueue::new(1, 5));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || (1..=5).for_each(|item| queue.put(item)))
        };

        let mut seen = Vec::new();
        while let Some(item) = queue.take() {
            seen.push(item);
        }
        producer.join().unwrap();

        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(queue.stats().high_water, 1);
    }

    #[test]
    fn test_concurrent_accounting_and_capacity() {
        let capacity = 3;
        let producers = 4;
        let per_producer = 250u64;
        let total = producers * per_producer;
        let queue = Arc::new(BoundedQueue::new(capacity, total));

        let producer_handles: Vec<_> = (0..producers)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        queue.put(p * per_producer + i + 1);
                    }
                })
            })
            .collect();
        let consumer_handles: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(item) = queue.take() {
                        taken.push(item);
                    }
                    taken
                })
            })
            .collect();

        for handle in producer_handles {
            handle.join().unwrap();
        }
        queue.mark_producers_done();

        let mut seen = HashSet::new();
        for handle in consumer_handles {
            let taken = handle.join().unwrap();
            // Items from one producer leave the ring in the order they went in.
            for p in 0..producers {
                let mine: Vec<_> = taken
                    .iter()
                    .filter(|item| (*item - 1) / per_producer == p)
                    .collect();
                assert!(mine.windows(2).all(|pair| pair[0] < pair[1]));
            }
            for item in taken {
                assert!(seen.insert(item), "item {item} taken twice");
            }
        }

        assert_eq!(seen.len() as u64, total);
        assert_eq!(queue.consumed_total(), total);
        let stats = queue.stats();
        assert_eq!(stats.puts, total);
        assert_eq!(stats.takes, total);
        // One wakeup per handoff, plus the single done broadcast.
        assert_eq!(stats.not_empty_signals, stats.puts);
        assert_eq!(stats.not_full_signals, stats.takes);
        assert_eq!(stats.broadcasts, 1);
        assert!(stats.high_water <= capacity);
    }

    #[test]
    fn test_independent_queues_on_the_stack() {
        let first = BoundedQueue::new(2, 10);
        let second = BoundedQueue::new(5, 10);

        crossbeam::scope(|s| {
            s.spawn(|_| (0..10).for_each(|item| first.put(item)));
            s.spawn(|_| (100..110).for_each(|item| second.put(item)));

            let a: Vec<_> = std::iter::from_fn(|| first.take()).collect();
            let b: Vec<_> = std::iter::from_fn(|| second.take()).collect();
            assert_eq!(a, (0..10).collect::<Vec<_>>());
            assert_eq!(b, (100..110).collect::<Vec<_>>());
        })
        .unwrap();

        assert!(first.stats().high_water <= 2);
        assert!(second.stats().high_water <= 5);
    }
}
