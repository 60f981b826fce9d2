//! Orchestrator and task bodies.
//!
//! One `Arc<BoundedQueue>` is shared by P producer threads and M consumer
//! threads. The orchestrator joins every producer, marks the queue's
//! producers done (waking idle consumers), joins every consumer and builds
//! a [`RunReport`].

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::Config;
use crate::error::{Error, Result, Role};
use crate::log::EventLog;
use crate::queue::BoundedQueue;
use crate::report::RunReport;
use crate::work::{self, NoWork, WorkSimulator};
use crate::Item;

// =============================================================================
// Task bodies
// =============================================================================

/// Everything one producer thread needs.
#[derive(Debug, Clone)]
pub struct ProducerTask {
    pub id: usize,
    pub queue: Arc<BoundedQueue>,
    pub first_item: Item,
    pub count: u64,
}

impl ProducerTask {
    /// Producer `id` owns tags `id*I + 1 ..= id*I + I`.
    pub fn new(id: usize, queue: Arc<BoundedQueue>, items_per_producer: u64) -> Self {
        Self {
            id,
            queue,
            first_item: id as u64 * items_per_producer + 1,
            count: items_per_producer,
        }
    }

    pub fn items(&self) -> std::ops::Range<Item> {
        self.first_item..self.first_item + self.count
    }

    /// Enqueues every item and returns how many went in. Stops early if the
    /// ring is full and a consumer has been lost.
    pub fn run(self, work: &dyn WorkSimulator, log: &EventLog) -> u64 {
        let mut enqueued = 0;
        for item in self.items() {
            work.produce(self.id, item);
            let Some(handoff) = self.queue.put_traced(item) else {
                log.warn(format!(
                    "Producer {} stopped at item {}: a consumer was lost",
                    self.id, item
                ));
                return enqueued;
            };
            enqueued += 1;
            if handoff.waits > 0 {
                log.event(
                    Role::Producer,
                    self.id,
                    format!("buffer was full, waited {} time(s)", handoff.waits),
                );
            }
            log.event(
                Role::Producer,
                self.id,
                format!("produced item {} (count {})", item, handoff.occupancy),
            );
        }
        log.event(
            Role::Producer,
            self.id,
            format!("finished producing {} items", self.count),
        );
        enqueued
    }
}

/// Everything one consumer thread needs.
#[derive(Debug, Clone)]
pub struct ConsumerTask {
    pub id: usize,
    pub queue: Arc<BoundedQueue>,
}

impl ConsumerTask {
    pub fn new(id: usize, queue: Arc<BoundedQueue>) -> Self {
        Self { id, queue }
    }

    /// Takes items until the queue reports end of stream; returns them in
    /// the order they were taken.
    pub fn run(self, work: &dyn WorkSimulator, log: &EventLog) -> Vec<Item> {
        let _lost = LostConsumerGuard(&self.queue);
        let mut taken = Vec::new();
        while let Some(handoff) = self.queue.take_traced() {
            if handoff.waits > 0 {
                log.event(
                    Role::Consumer,
                    self.id,
                    format!("buffer was empty, waited {} time(s)", handoff.waits),
                );
            }
            log.event(
                Role::Consumer,
                self.id,
                format!("consumed item {} (count {})", handoff.item, handoff.occupancy),
            );
            taken.push(handoff.item);
            work.consume(self.id, handoff.item);
        }
        log.event(
            Role::Consumer,
            self.id,
            format!("finished consuming {} items", taken.len()),
        );
        taken
    }
}

/// Tells the queue a consumer is gone when its task unwinds, so producers
/// parked on a full ring are released.
struct LostConsumerGuard<'a>(&'a BoundedQueue);

impl Drop for LostConsumerGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.mark_consumer_lost();
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct Orchestrator {
    config: Config,
    work: Arc<dyn WorkSimulator>,
    log: EventLog,
}

impl Orchestrator {
    /// Work simulation and log level come from `config`.
    pub fn new(config: Config) -> Self {
        let work: Arc<dyn WorkSimulator> = Arc::from(work::from_config(&config.work));
        let log = EventLog::new(config.verbosity);
        Self { config, work, log }
    }

    pub fn with_work(mut self, work: impl WorkSimulator + 'static) -> Self {
        self.work = Arc::new(work);
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self) -> Result<RunReport> {
        self.config.validate()?;
        let total = self.config.checked_total()?;
        let per_producer_items = self.config.items_per_producer as u64;
        let log = self.log;

        log.info("Starting Producer-Consumer run...");
        log.info(format!("Buffer capacity: {}", self.config.capacity));
        log.info(format!(
            "Producers: {} ({} items each)",
            self.config.producers, self.config.items_per_producer
        ));
        log.info(format!("Consumers: {}", self.config.consumers));
        log.info(format!("Total items: {total}\n"));

        let queue = Arc::new(BoundedQueue::new(self.config.capacity, total));
        let start = Instant::now();

        let mut producers = Vec::with_capacity(self.config.producers);
        for id in 0..self.config.producers {
            let task = ProducerTask::new(id, Arc::clone(&queue), per_producer_items);
            let work = Arc::clone(&self.work);
            match spawn(Role::Producer, id, move || task.run(&*work, &log)) {
                Ok(handle) => producers.push(handle),
                Err(err) => {
                    unwind_started(&queue, producers, Vec::new());
                    return Err(err);
                }
            }
        }

        let mut consumers = Vec::with_capacity(self.config.consumers);
        for id in 0..self.config.consumers {
            let task = ConsumerTask::new(id, Arc::clone(&queue));
            let work = Arc::clone(&self.work);
            match spawn(Role::Consumer, id, move || task.run(&*work, &log)) {
                Ok(handle) => consumers.push(handle),
                Err(err) => {
                    unwind_started(&queue, producers, consumers);
                    return Err(err);
                }
            }
        }

        let mut failure = None;

        let mut per_producer = Vec::with_capacity(producers.len());
        for (id, handle) in producers.into_iter().enumerate() {
            match handle.join() {
                Ok(count) => per_producer.push(count),
                Err(_) => {
                    log.warn(format!("Producer {id} panicked"));
                    per_producer.push(0);
                    if failure.is_none() {
                        failure = Some(Error::WorkerPanicked {
                            role: Role::Producer,
                            id,
                        });
                    }
                }
            }
        }

        // No put can happen from here on; wake consumers parked on an empty ring.
        log.milestone("All producers finished");
        queue.mark_producers_done();

        let mut seen = HashSet::with_capacity(total.min(1 << 16) as usize);
        let mut duplicates = Vec::new();
        let mut per_consumer = Vec::with_capacity(consumers.len());
        for (id, handle) in consumers.into_iter().enumerate() {
            match handle.join() {
                Ok(taken) => {
                    per_consumer.push(taken.len() as u64);
                    for item in taken {
                        if !seen.insert(item) {
                            duplicates.push(item);
                        }
                    }
                }
                Err(_) => {
                    log.warn(format!("Consumer {id} panicked"));
                    per_consumer.push(0);
                    if failure.is_none() {
                        failure = Some(Error::WorkerPanicked {
                            role: Role::Consumer,
                            id,
                        });
                    }
                }
            }
        }
        log.milestone("All consumers finished");

        if let Some(err) = failure {
            return Err(err);
        }

        let stats = queue.stats();
        Ok(RunReport {
            capacity: queue.capacity(),
            produced_total: total,
            enqueued: stats.puts,
            consumed_total: queue.consumed_total(),
            per_producer,
            per_consumer,
            duplicates,
            stats,
            elapsed: start.elapsed(),
        })
    }
}

fn spawn<T, F>(role: Role, id: usize, body: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let name = match role {
        Role::Producer => format!("producer-{id}"),
        Role::Consumer => format!("consumer-{id}"),
    };
    thread::Builder::new()
        .name(name)
        .spawn(body)
        .map_err(|source| Error::Spawn { role, id, source })
}

/// Brings down the threads of a run that could not be fully started. No
/// thread outlives the call: producers are released from a full ring and
/// joined first, then consumers drain what is buffered and are joined.
fn unwind_started(
    queue: &BoundedQueue,
    producers: Vec<JoinHandle<u64>>,
    consumers: Vec<JoinHandle<Vec<Item>>>,
) {
    queue.mark_consumer_lost();
    for handle in producers {
        let _ = handle.join();
    }
    queue.mark_producers_done();
    for handle in consumers {
        let _ = handle.join();
    }
}

/// Runs `config` with no simulated work and no console output.
pub fn run(config: Config) -> Result<RunReport> {
    Orchestrator::new(config)
        .with_work(NoWork)
        .with_log(EventLog::quiet())
        .run()
}

// =============================================================================
// Tests
// =============================================================================
