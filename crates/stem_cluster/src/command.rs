//! Request commands and response envelopes.
//!
//! Every request names its command in the `command` metadata field:
//!
//! | command        | fields                    | response                         |
//! |----------------|---------------------------|----------------------------------|
//! | `run`          | `task_path`, `task_meta`  | JSON value as payload            |
//! | `structure`    |                           | `{name, tasks, workspaces}`      |
//! | `powerfullity` |                           | `powerfullity` metadata integer  |
//! | `stop`         |                           | none (distributor only)          |
//!
//! Responses carry `status` set to `fulfilled` or `failed`, plus `error` on
//! failure.

use crate::error::{ClusterError, ClusterResult};
use serde_json::{Value, json};
use stem_envelope::Envelope;

/// Status of a successful response
pub const FULFILLED: &str = "fulfilled";
/// Status of a failed response
pub const FAILED: &str = "failed";

/// A parsed request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Execute the task at `task_path`
    Run {
        /// Dot-qualified path in the hosted namespace
        task_path: String,
        /// Meta for the root task
        task_meta: Value,
    },
    /// Describe the hosted namespace
    Structure,
    /// Report capacity weight
    Powerfullity,
    /// Shut the server down
    Stop,
    /// Anything else, including a missing command
    Unknown(String),
}

impl Command {
    /// Parse the command out of a request's metadata
    #[must_use]
    pub fn parse(request: &Envelope) -> Self {
        let name = request.get("command").and_then(Value::as_str).unwrap_or("");
        match name {
            "run" => Self::Run {
                task_path: request
                    .get("task_path")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                task_meta: request.get("task_meta").cloned().unwrap_or(Value::Null),
            },
            "structure" => Self::Structure,
            "powerfullity" => Self::Powerfullity,
            "stop" => Self::Stop,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Command name as it appears on the wire
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Run { .. } => "run",
            Self::Structure => "structure",
            Self::Powerfullity => "powerfullity",
            Self::Stop => "stop",
            Self::Unknown(name) => name,
        }
    }

    /// Build the request envelope for this command
    #[must_use]
    pub fn to_envelope(&self) -> Envelope {
        match self {
            Self::Run {
                task_path,
                task_meta,
            } => Envelope::new(json!({
                "command": "run",
                "task_path": task_path,
                "task_meta": task_meta,
            })),
            other => Envelope::new(json!({ "command": other.name() })),
        }
    }
}

/// Response envelope builders and checks
#[derive(Debug, Clone, Copy)]
pub struct Response;

impl Response {
    /// `{"status": "fulfilled"}` with extra metadata fields
    #[must_use]
    pub fn fulfilled(extra: Value) -> Envelope {
        let mut meta = json!({ "status": FULFILLED });
        if let (Some(target), Value::Object(fields)) = (meta.as_object_mut(), extra) {
            target.extend(fields);
        }
        Envelope::new(meta)
    }

    /// `{"status": "fulfilled"}` with `value` encoded as the JSON payload
    #[must_use]
    pub fn fulfilled_json(value: &Value) -> Envelope {
        match serde_json::to_vec(value) {
            Ok(bytes) => Self::fulfilled(Value::Null).with_payload(bytes),
            Err(e) => Self::failed(e.to_string()),
        }
    }

    /// `{"status": "failed", "error": error}`
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Envelope {
        Envelope::new(json!({ "status": FAILED, "error": error.into() }))
    }

    /// Check the response status
    #[must_use]
    pub fn is_fulfilled(response: &Envelope) -> bool {
        response.get("status").and_then(Value::as_str) == Some(FULFILLED)
    }

    /// Pass a fulfilled response through, turn anything else into an error
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with the peer's error text
    pub fn check(response: Envelope) -> ClusterResult<Envelope> {
        if Self::is_fulfilled(&response) {
            return Ok(response);
        }
        let error = response
            .get("error")
            .and_then(Value::as_str)
            .map_or_else(|| response.meta_str(), ToString::to_string);
        Err(ClusterError::Rejected(error))
    }
}
