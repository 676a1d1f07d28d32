//! Engine selection.

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::process::{ProcessPoolConfig, ProcessPoolEngine};
use crate::sequential::SequentialEngine;
use crate::task_group::TaskGroupEngine;
use crate::thread_pool::ThreadPoolEngine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Available scheduling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// One call stack
    #[default]
    Sequential,
    /// Fixed-size thread pool
    ThreadPool,
    /// Pool of child processes
    ProcessPool,
    /// Cooperative task group on one thread
    TaskGroup,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sequential => "sequential",
            Self::ThreadPool => "thread-pool",
            Self::ProcessPool => "process-pool",
            Self::TaskGroup => "task-group",
        };
        f.write_str(s)
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "thread-pool" => Ok(Self::ThreadPool),
            "process-pool" => Ok(Self::ProcessPool),
            "task-group" => Ok(Self::TaskGroup),
            other => Err(format!("unknown engine '{other}'")),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Strategy to use
    pub kind: EngineKind,
    /// Thread count for the thread-pool engine
    pub threads: usize,
    /// Host processes for the process-pool engine
    pub process: ProcessPoolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            threads: std::thread::available_parallelism().map_or(4, |n| n.get()),
            process: ProcessPoolConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a config for `kind` with default sizes
    #[must_use]
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Set thread count
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set host process settings
    #[must_use]
    pub fn with_process(mut self, process: ProcessPoolConfig) -> Self {
        self.process = process;
        self
    }

    /// Build the configured engine
    ///
    /// # Errors
    ///
    /// Returns error if the thread pool cannot be created
    pub fn build(&self) -> EngineResult<Arc<dyn Engine>> {
        Ok(match self.kind {
            EngineKind::Sequential => Arc::new(SequentialEngine::new()),
            EngineKind::ThreadPool => Arc::new(ThreadPoolEngine::new(self.threads)?),
            EngineKind::ProcessPool => Arc::new(ProcessPoolEngine::new(self.process.clone())),
            EngineKind::TaskGroup => Arc::new(TaskGroupEngine::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        for kind in [
            EngineKind::Sequential,
            EngineKind::ThreadPool,
            EngineKind::ProcessPool,
            EngineKind::TaskGroup,
        ] {
            assert_eq!(kind.to_string().parse::<EngineKind>().unwrap(), kind);
        }
        assert!("fibers".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_build_matches_kind() {
        let engine = EngineConfig::new(EngineKind::ThreadPool)
            .with_threads(2)
            .build()
            .unwrap();
        assert_eq!(engine.name(), "thread-pool");
        assert_eq!(EngineConfig::default().build().unwrap().name(), "sequential");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"kind": "task-group"}"#).unwrap();
        assert_eq!(config.kind, EngineKind::TaskGroup);
        assert!(config.threads >= 1);
    }
}
