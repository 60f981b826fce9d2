use std::fmt;
use std::io;
use thiserror::Error;

use crate::Item;

/// Which side of the buffer a task sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => write!(f, "Producer"),
            Role::Consumer => write!(f, "Consumer"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse config: {message}")]
    Parse { message: String },

    #[error("Buffer capacity must be at least 1")]
    ZeroCapacity,

    #[error("At least one consumer is required to drain {total} item(s)")]
    NoConsumers { total: u64 },

    #[error("{producers} producers x {items_per_producer} items overflows the item counter")]
    TooManyItems {
        producers: usize,
        items_per_producer: usize,
    },
}

impl ConfigError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::parse(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn {role} {id}: {source}")]
    Spawn {
        role: Role,
        id: usize,
        #[source]
        source: io::Error,
    },

    #[error("{role} {id} panicked")]
    WorkerPanicked { role: Role, id: usize },

    #[error("Item count mismatch: produced {produced}, consumed {consumed}")]
    Conservation { produced: u64, consumed: u64 },

    #[error("Item {0} was consumed more than once")]
    DuplicateItem(Item),
}

pub type Result<T> = std::result::Result<T, Error>;
