//! Bounded-buffer producer/consumer.
//!
//! A fixed-capacity ring of integer items shared by any number of producer
//! and consumer threads, coordinated with one mutex and two condition
//! variables (`not_full`, `not_empty`). Consumers stop when every announced
//! item has been consumed or when the orchestrator marks producers done and
//! the ring is empty; no sentinel items are used.
//!
//! ```no_run
//! use bounded_buffer::{run, Config};
//!
//! let report = run(Config::new(10, 3, 20, 2)).unwrap();
//! assert_eq!(report.consumed_total, 60);
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod log;
pub mod queue;
pub mod report;
pub mod ring;
pub mod work;

/// Items are plain integer tags, unique within a run.
pub type Item = u64;

pub use config::{Config, WorkConfig};
pub use driver::{run, ConsumerTask, Orchestrator, ProducerTask};
pub use error::{ConfigError, Error, Result, Role};
pub use log::{EventLog, Verbosity};
pub use queue::{BoundedQueue, Handoff, Phase, QueueStats};
pub use report::RunReport;
pub use work::{NoWork, RandomDelay, WorkSimulator};
