//! Run parameters: buffer capacity, producer/consumer counts and simulated
//! work delays. Loaded from TOML; every field falls back to the classic
//! exercise values (10 slots, 3 producers x 20 items, 2 consumers).

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, Error, Result};
use crate::log::Verbosity;

pub const DEFAULT_CAPACITY: usize = 10;
pub const DEFAULT_PRODUCERS: usize = 3;
pub const DEFAULT_ITEMS_PER_PRODUCER: usize = 20;
pub const DEFAULT_CONSUMERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkConfig {
    /// Upper bound of the random pause before each `put`, in milliseconds.
    pub producer_delay_ms: u64,
    /// Upper bound of the random pause after each `take`, in milliseconds.
    pub consumer_delay_ms: u64,
}

impl WorkConfig {
    pub fn none() -> Self {
        Self {
            producer_delay_ms: 0,
            consumer_delay_ms: 0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.producer_delay_ms == 0 && self.consumer_delay_ms == 0
    }

    pub fn producer_delay(&self) -> Duration {
        Duration::from_millis(self.producer_delay_ms)
    }

    pub fn consumer_delay(&self) -> Duration {
        Duration::from_millis(self.consumer_delay_ms)
    }
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            producer_delay_ms: 10,
            consumer_delay_ms: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub capacity: usize,
    pub producers: usize,
    pub items_per_producer: usize,
    pub consumers: usize,
    pub work: WorkConfig,
    pub verbosity: Verbosity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            producers: DEFAULT_PRODUCERS,
            items_per_producer: DEFAULT_ITEMS_PER_PRODUCER,
            consumers: DEFAULT_CONSUMERS,
            work: WorkConfig::default(),
            verbosity: Verbosity::default(),
        }
    }
}

impl Config {
    /// Config with the given shape, no simulated work and a quiet log.
    pub fn new(
        capacity: usize,
        producers: usize,
        items_per_producer: usize,
        consumers: usize,
    ) -> Self {
        Self {
            capacity,
            producers,
            items_per_producer,
            consumers,
            work: WorkConfig::none(),
            verbosity: Verbosity::Quiet,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_producers(mut self, producers: usize) -> Self {
        self.producers = producers;
        self
    }

    pub fn with_items_per_producer(mut self, items: usize) -> Self {
        self.items_per_producer = items;
        self
    }

    pub fn with_consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers;
        self
    }

    pub fn with_work(mut self, work: WorkConfig) -> Self {
        self.work = work;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// P x I, or `None` if it does not fit the item counter.
    pub fn total_items(&self) -> Option<u64> {
        (self.producers as u64).checked_mul(self.items_per_producer as u64)
    }

    pub fn checked_total(&self) -> std::result::Result<u64, ConfigError> {
        self.total_items().ok_or(ConfigError::TooManyItems {
            producers: self.producers,
            items_per_producer: self.items_per_producer,
        })
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        let total = self.checked_total()?;
        if self.consumers == 0 {
            return Err(ConfigError::NoConsumers { total });
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
