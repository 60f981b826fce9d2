//! Simulated work around each handoff.
//!
//! Producers call [`WorkSimulator::produce`] before every `put`, consumers
//! call [`WorkSimulator::consume`] after every successful `take`. Neither
//! runs while the queue lock is held.

use rand::Rng;
use std::thread;
use std::time::Duration;

use crate::config::WorkConfig;
use crate::Item;

pub trait WorkSimulator: Send + Sync {
    fn produce(&self, _producer: usize, _item: Item) {}

    fn consume(&self, _consumer: usize, _item: Item) {}
}

/// No delay at all; handoffs run back to back.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWork;

impl WorkSimulator for NoWork {}

/// Sleeps a uniformly random duration in `0..max` on each side.
#[derive(Debug, Clone, Copy)]
pub struct RandomDelay {
    pub producer_max: Duration,
    pub consumer_max: Duration,
}

impl RandomDelay {
    pub fn new(producer_max: Duration, consumer_max: Duration) -> Self {
        Self {
            producer_max,
            consumer_max,
        }
    }

    fn pause(max: Duration) {
        let max_micros = max.as_micros() as u64;
        if max_micros == 0 {
            return;
        }
        let micros = rand::thread_rng().gen_range(0..max_micros);
        thread::sleep(Duration::from_micros(micros));
    }
}

impl From<&WorkConfig> for RandomDelay {
    fn from(work: &WorkConfig) -> Self {
        Self::new(work.producer_delay(), work.consumer_delay())
    }
}

impl WorkSimulator for RandomDelay {
    fn produce(&self, _producer: usize, _item: Item) {
        Self::pause(self.producer_max);
    }

    fn consume(&self, _consumer: usize, _item: Item) {
        Self::pause(self.consumer_max);
    }
}

/// Picks the simulator a config asks for.
pub fn from_config(work: &WorkConfig) -> Box<dyn WorkSimulator> {
    if work.is_none() {
        Box::new(NoWork)
    } else {
        Box::new(RandomDelay::from(work))
    }
}
