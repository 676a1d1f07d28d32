//! Worker and distributor configuration.

use crate::error::{ClusterError, ClusterResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default worker capacity weight
pub const DEFAULT_CAPACITY: u32 = 1;

/// Worker unit configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Listen address
    pub bind: String,
    /// Capacity weight reported by `powerfullity`
    pub capacity: u32,
}

impl WorkerConfig {
    /// Create a worker config
    #[must_use]
    pub fn new(bind: impl Into<String>) -> Self {
        Self {
            bind: bind.into(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Set capacity weight
    #[must_use]
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1:8888")
    }
}

/// A worker known to a distributor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerEntry {
    /// Worker address
    pub address: String,
    /// Capacity weight
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

fn default_capacity() -> u32 {
    DEFAULT_CAPACITY
}

impl WorkerEntry {
    /// Create an entry
    #[must_use]
    pub fn new(address: impl Into<String>, capacity: u32) -> Self {
        Self {
            address: address.into(),
            capacity,
        }
    }

    /// Parse `address=capacity`, or a bare address with the default weight
    ///
    /// # Errors
    ///
    /// Returns `Config` if the capacity is not an integer
    pub fn parse(text: &str) -> ClusterResult<Self> {
        match text.rsplit_once('=') {
            Some((address, capacity)) => {
                let capacity = capacity.trim().parse().map_err(|_| {
                    ClusterError::Config(format!("bad capacity in worker '{text}'"))
                })?;
                Ok(Self::new(address.trim(), capacity))
            }
            None => Ok(Self::new(text.trim(), DEFAULT_CAPACITY)),
        }
    }
}

/// Distributor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributorConfig {
    /// Listen address
    pub bind: String,
    /// Workers to dispatch to
    pub workers: Vec<WorkerEntry>,
}

impl DistributorConfig {
    /// Create a distributor config with no workers
    #[must_use]
    pub fn new(bind: impl Into<String>) -> Self {
        Self {
            bind: bind.into(),
            workers: Vec::new(),
        }
    }

    /// Add a worker
    #[must_use]
    pub fn with_worker(mut self, worker: WorkerEntry) -> Self {
        self.workers.push(worker);
        self
    }
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self::new("127.0.0.1:8800")
    }
}

/// Configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Worker unit section
    pub worker: WorkerConfig,
    /// Distributor section
    pub distributor: DistributorConfig,
}

impl ClusterConfig {
    /// Load a JSON config file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: impl AsRef<Path>) -> ClusterResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
