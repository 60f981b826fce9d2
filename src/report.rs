//! End-of-run summary: the totals the orchestrator checks for conservation.

use colored::Colorize;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::queue::QueueStats;
use crate::Item;

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub capacity: usize,
    /// Announced up front: producers x items per producer.
    pub produced_total: u64,
    /// Items that actually went through `put`.
    pub enqueued: u64,
    pub consumed_total: u64,
    /// Items each producer finished enqueueing, indexed by producer id.
    pub per_producer: Vec<u64>,
    /// Items each consumer took, indexed by consumer id.
    pub per_consumer: Vec<u64>,
    /// Items seen by more than one `take`, in the order detected.
    pub duplicates: Vec<Item>,
    pub stats: QueueStats,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.produced_total == self.consumed_total
            && self.enqueued == self.produced_total
            && self.duplicates.is_empty()
    }

    /// Turns a failed report into the matching error.
    pub fn check(self) -> Result<Self> {
        if let Some(&item) = self.duplicates.first() {
            return Err(Error::DuplicateItem(item));
        }
        if !self.is_success() {
            return Err(Error::Conservation {
                produced: self.produced_total,
                consumed: self.consumed_total,
            });
        }
        Ok(self)
    }

    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        out.push_str("===== RESULTS =====\n");
        out.push_str(&format!("Total items produced: {}\n", self.produced_total));
        out.push_str(&format!("Total items enqueued: {}\n", self.enqueued));
        out.push_str(&format!("Total items consumed: {}\n", self.consumed_total));
        out.push_str(&format!("Per producer: {:?}\n", self.per_producer));
        out.push_str(&format!("Per consumer: {:?}\n", self.per_consumer));
        out.push_str(&format!(
            "Waits: {} producer, {} consumer; peak occupancy {}/{}\n",
            self.stats.producer_waits,
            self.stats.consumer_waits,
            self.stats.high_water,
            self.capacity
        ));
        out.push_str(&format!("Elapsed: {:.2?}\n", self.elapsed));

        let verdict = match (self.is_success(), color) {
            (true, true) => "SUCCESS: All items accounted for!".green().bold().to_string(),
            (true, false) => "SUCCESS: All items accounted for!".to_string(),
            (false, true) => "ERROR: Item count mismatch!".red().bold().to_string(),
            (false, false) => "ERROR: Item count mismatch!".to_string(),
        };
        out.push_str(&verdict);
        if !self.duplicates.is_empty() {
            out.push_str(&format!("\nDuplicated items: {:?}", self.duplicates));
        }
        out
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}
