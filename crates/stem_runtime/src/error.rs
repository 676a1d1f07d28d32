//! Engine errors.

use stem_core::CoreError;
use stem_envelope::EnvelopeError;
use stem_plan::TaskError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Error raised while running a task tree
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A task's transform failed
    #[error("Task '{task}' failed: {source}")]
    Task {
        /// Failing task
        task: String,
        /// Transform error
        #[source]
        source: TaskError,
    },

    /// The tree still has unresolved dependencies
    #[error("Unresolved dependencies: {}", .names.join(", "))]
    Unresolved {
        /// Every unresolved name in the tree
        names: Vec<String>,
    },

    /// A task panicked on a worker thread
    #[error("Task '{task}' panicked")]
    Panicked {
        /// Task that was running
        task: String,
    },

    /// A task host process misbehaved
    #[error("Task host error: {0}")]
    Host(String),

    /// A node has no lookup path, so a task host cannot find its task
    #[error("Task '{task}' was not resolved by path and cannot run in a task host")]
    Unaddressable {
        /// Task without a path
        task: String,
    },

    /// Every task host process has died
    #[error("No live task hosts left")]
    NoHosts,

    /// Envelope I/O with a task host failed
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Value could not be materialized
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Thread pool could not be created
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// OS-level failure (spawning processes, threads, runtimes)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Wrap a transform error with the task it came from
    pub fn task(task: impl Into<String>, source: TaskError) -> Self {
        Self::Task {
            task: task.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_display() {
        let err = EngineError::task("int_scale", TaskError::failed("bad input"));
        assert_eq!(err.to_string(), "Task 'int_scale' failed: bad input");
    }

    #[test]
    fn test_unresolved_display() {
        let err = EngineError::Unresolved {
            names: vec!["a".into(), "Sub.b".into()],
        };
        assert_eq!(err.to_string(), "Unresolved dependencies: a, Sub.b");
    }
}
