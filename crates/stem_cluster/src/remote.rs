//! Tasks and namespaces that live on another server.

use crate::client::RemoteClient;
use crate::command::{Command, Response};
use crate::error::{ClusterError, ClusterResult};
use serde_json::Value;
use std::sync::Arc;
use stem_core::{Data, Meta};
use stem_envelope::Envelope;
use stem_plan::{Inputs, Structure, Task, TaskError, TaskLookup, TaskPath, TransformResult};

/// Runs a task on a worker or distributor with a blocking `run` request
///
/// The task's own meta is sent as `task_meta`; its inputs are ignored,
/// since the server resolves the task's dependencies itself.
#[derive(Debug, Clone)]
pub struct RemoteTask {
    path: String,
    client: RemoteClient,
}

impl RemoteTask {
    /// Create a remote task for the dot-qualified `path` on the server
    #[must_use]
    pub fn new(path: impl Into<String>, client: RemoteClient) -> Self {
        Self {
            path: path.into(),
            client,
        }
    }

    /// Path on the server
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Task for RemoteTask {
    fn name(&self) -> &str {
        &self.path
    }

    fn transform(&self, meta: &Meta, _inputs: Inputs) -> TransformResult<Data> {
        let request = Command::Run {
            task_path: self.path.clone(),
            task_meta: meta.to_value(),
        }
        .to_envelope();
        let response = self
            .client
            .request_blocking(&request)
            .and_then(Response::check)
            .map_err(|e| TaskError::failed(format!("{} at {}: {e}", self.path, self.client.address())))?;
        let value = response
            .payload_json()
            .map_err(|e| TaskError::failed(e.to_string()))?;
        Ok(Data::Value(value))
    }
}

/// Lookup over a server's namespace outline
///
/// The outline is fetched once. A namespace narrowed with
/// [`sub`](Self::sub) finds tasks relative to itself but sends full paths
/// to the server.
#[derive(Debug, Clone)]
pub struct RemoteNamespace {
    client: RemoteClient,
    prefix: String,
    structure: Structure,
}

impl RemoteNamespace {
    /// Fetch the server's root outline
    ///
    /// # Errors
    ///
    /// Returns error if the server is unreachable or answers `failed`
    pub fn connect(client: RemoteClient) -> ClusterResult<Self> {
        let response = client.request_blocking(&Command::Structure.to_envelope())?;
        Self::from_response(client, response)
    }

    /// Async variant of [`connect`](Self::connect)
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect)
    pub async fn connect_async(client: RemoteClient) -> ClusterResult<Self> {
        let response = client.send(&Command::Structure).await?;
        Self::from_response(client, response)
    }

    fn from_response(client: RemoteClient, response: Envelope) -> ClusterResult<Self> {
        let payload: Value = Response::check(response)?.payload_json()?;
        Ok(Self {
            client,
            prefix: String::new(),
            structure: serde_json::from_value(payload)?,
        })
    }

    /// Narrow to the nested namespace at a dot-qualified `path`
    ///
    /// # Errors
    ///
    /// Returns `Rejected` if the outline has no such namespace
    pub fn sub(&self, path: &str) -> ClusterResult<Self> {
        let structure = self
            .structure
            .sub(&TaskPath::parse(path))
            .ok_or_else(|| ClusterError::Rejected(format!("no namespace '{}{path}'", self.prefix)))?;
        Ok(Self {
            client: self.client.clone(),
            prefix: format!("{}{path}.", self.prefix),
            structure: structure.clone(),
        })
    }

    /// Namespace name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.structure.name
    }

    /// Outline of this namespace
    #[must_use]
    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Full server paths of every task in this namespace and below
    #[must_use]
    pub fn task_paths(&self) -> Vec<String> {
        self.structure
            .task_paths()
            .into_iter()
            .map(|p| format!("{}{p}", self.prefix))
            .collect()
    }

    /// Direct sub-namespaces
    #[must_use]
    pub fn namespaces(&self) -> Vec<RemoteNamespace> {
        self.structure
            .workspaces
            .iter()
            .map(|w| Self {
                client: self.client.clone(),
                prefix: format!("{}{}.", self.prefix, w.name),
                structure: w.clone(),
            })
            .collect()
    }
}

impl TaskLookup for RemoteNamespace {
    fn find_task(&self, path: &TaskPath) -> Option<Arc<dyn Task>> {
        if !self.structure.contains(path) {
            return None;
        }
        Some(Arc::new(RemoteTask::new(
            format!("{}{path}", self.prefix),
            self.client.clone(),
        )))
    }
}
