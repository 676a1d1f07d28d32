//! Task and graph errors.

use stem_core::CoreError;

/// Result of a task transform
pub type TransformResult<T> = Result<T, TaskError>;

/// Error raised by a task transform
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// A declared dependency value was not passed in
    #[error("Missing input '{name}'")]
    MissingInput {
        /// Dependency name
        name: String,
    },

    /// A single-input task received a different number of inputs
    #[error("Task '{task}' expects exactly one input, got {count}")]
    InputCount {
        /// Task name
        task: String,
        /// Number of inputs received
        count: usize,
    },

    /// Reduce over an empty sequence with no initial value
    #[error("Task '{task}' reduced an empty sequence with no initial value")]
    EmptyReduce {
        /// Task name
        task: String,
    },

    /// Value or stream item error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Free-form failure from user code or a remote peer
    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    /// Build a free-form failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error raised while resolving a task graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A task is reachable from itself
    Cycle {
        /// Task names along the cycle, first and last equal
        path: Vec<String>,
    },
    /// Resolution went deeper than the configured bound
    TooDeep {
        /// Depth limit that was exceeded
        limit: usize,
    },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle { path } => write!(f, "Cycle detected: {}", path.join(" -> ")),
            Self::TooDeep { limit } => {
                write!(f, "Task graph deeper than {limit} levels")
            }
        }
    }
}

impl std::error::Error for GraphError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = GraphError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Cycle detected: a -> b -> a");
    }

    #[test]
    fn test_core_error_is_transparent() {
        let core = CoreError::UnexpectedValue {
            expected: "sequence".into(),
            found: "number".into(),
        };
        let expected = core.to_string();
        assert_eq!(TaskError::from(core).to_string(), expected);
    }
}
