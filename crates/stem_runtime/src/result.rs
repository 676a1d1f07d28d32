//! Tagged outcome of an orchestrated execution.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use stem_core::{CoreError, CoreResult, Data, DataStream, FieldError};

/// Outcome category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// The engine produced data
    ContainsData,
    /// A transform or the engine failed
    Failed,
    /// Some dependencies could not be resolved; nothing ran
    DependencyError,
    /// The graph contains a cycle; nothing ran
    CycleDetected,
    /// The root task rejected its meta; nothing ran
    InvalidMeta,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ContainsData => "CONTAINS_DATA",
            Self::Failed => "FAILED",
            Self::DependencyError => "DEPENDENCY_ERROR",
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::InvalidMeta => "INVALID_META",
        };
        f.write_str(s)
    }
}

/// Result of [`Orchestrator::execute`](crate::Orchestrator::execute)
///
/// For [`TaskStatus::ContainsData`] the value is forced on first access to
/// [`TaskResult::data`] and cached.
#[derive(Debug)]
pub struct TaskResult {
    status: TaskStatus,
    error: Option<String>,
    unresolved: Vec<String>,
    field_errors: Vec<FieldError>,
    data: Option<Data>,
    forced: OnceCell<CoreResult<Value>>,
}

impl TaskResult {
    fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            error: None,
            unresolved: Vec::new(),
            field_errors: Vec::new(),
            data: None,
            forced: OnceCell::new(),
        }
    }

    /// Successful result
    #[must_use]
    pub fn contains_data(data: Data) -> Self {
        let mut result = Self::with_status(TaskStatus::ContainsData);
        result.data = Some(data);
        result
    }

    /// Failed result with a description
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        let mut result = Self::with_status(TaskStatus::Failed);
        result.error = Some(error.into());
        result
    }

    /// Unresolved dependencies
    #[must_use]
    pub fn dependency_error(unresolved: Vec<String>) -> Self {
        let mut result = Self::with_status(TaskStatus::DependencyError);
        result.error = Some(format!("Unresolved dependencies: {}", unresolved.join(", ")));
        result.unresolved = unresolved;
        result
    }

    /// Cyclic or runaway graph
    #[must_use]
    pub fn cycle_detected(error: impl Into<String>) -> Self {
        let mut result = Self::with_status(TaskStatus::CycleDetected);
        result.error = Some(error.into());
        result
    }

    /// Meta rejected by the verifier
    #[must_use]
    pub fn invalid_meta(field_errors: Vec<FieldError>) -> Self {
        let mut result = Self::with_status(TaskStatus::InvalidMeta);
        let described: Vec<String> = field_errors.iter().map(ToString::to_string).collect();
        result.error = Some(format!("Invalid meta: {}", described.join("; ")));
        result.field_errors = field_errors;
        result
    }

    /// Outcome category
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Check for [`TaskStatus::ContainsData`]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == TaskStatus::ContainsData
    }

    /// Failure description, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Unresolved dependency names, for [`TaskStatus::DependencyError`]
    #[must_use]
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Field errors, for [`TaskStatus::InvalidMeta`]
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Force and return the value.
    ///
    /// Streams are collected on the first call only.
    ///
    /// # Errors
    ///
    /// Returns error if there is no data or a stream item fails
    pub fn data(&self) -> CoreResult<&Value> {
        let Some(data) = &self.data else {
            return Err(CoreError::UnexpectedValue {
                expected: TaskStatus::ContainsData.to_string(),
                found: self.status.to_string(),
            });
        };
        self.forced
            .get_or_init(|| data.to_value())
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Lazy view of the data as a stream, without forcing it
    #[must_use]
    pub fn stream(&self) -> Option<DataStream> {
        self.data.as_ref().and_then(|d| d.as_stream().ok())
    }

    /// Take the raw data out
    #[must_use]
    pub fn into_data(self) -> Option<Data> {
        self.data
    }
}
