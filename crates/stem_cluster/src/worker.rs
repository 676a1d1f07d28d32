//! Worker unit: runs tasks from a hosted namespace for remote callers.

use crate::command::{Command, Response};
use crate::error::ClusterResult;
use serde_json::{Value, json};
use std::sync::Arc;
use stem_core::Meta;
use stem_envelope::Envelope;
use stem_plan::Namespace;
use stem_runtime::{Orchestrator, TaskStatus};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Serves `run`, `structure` and `powerfullity` for one namespace
pub struct WorkerUnit {
    namespace: Arc<Namespace>,
    orchestrator: Orchestrator,
    capacity: u32,
}

impl WorkerUnit {
    /// Create a unit hosting `namespace` with the given capacity weight
    #[must_use]
    pub fn new(namespace: Arc<Namespace>, capacity: u32) -> Self {
        Self {
            namespace,
            orchestrator: Orchestrator::default(),
            capacity,
        }
    }

    /// Run tasks through `orchestrator` instead of the sequential default
    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Capacity weight
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Hosted namespace
    #[must_use]
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// Answer one request. Blocks while a task runs.
    #[must_use]
    pub fn handle(&self, request: &Envelope) -> Envelope {
        match Command::parse(request) {
            Command::Run {
                task_path,
                task_meta,
            } => self.run(&task_path, task_meta),
            Command::Structure => match serde_json::to_value(self.namespace.structure()) {
                Ok(structure) => Response::fulfilled_json(&structure),
                Err(e) => Response::failed(e.to_string()),
            },
            Command::Powerfullity => Response::fulfilled(json!({ "powerfullity": self.capacity })),
            other => Response::failed(format!("unknown command '{}'", other.name())),
        }
    }

    fn run(&self, task_path: &str, task_meta: Value) -> Envelope {
        let meta = match Meta::from_value(task_meta) {
            Ok(meta) => meta,
            Err(e) => return Response::failed(format!("invalid task_meta: {e}")),
        };

        let result = self
            .orchestrator
            .execute_path(&meta, task_path, self.namespace.as_ref());
        let status = result.status();
        if status == TaskStatus::ContainsData {
            match result.data() {
                Ok(value) => return Response::fulfilled_json(value),
                Err(e) => return failed_status(TaskStatus::Failed, &e.to_string()),
            }
        }
        failed_status(status, result.error().unwrap_or_default())
    }

    /// Accept connections until `shutdown` is cancelled
    ///
    /// Each connection carries one request and gets one response.
    ///
    /// # Errors
    ///
    /// Returns error if the listener address cannot be read
    pub async fn serve(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) -> ClusterResult<()> {
        info!(address = %listener.local_addr()?, capacity = self.capacity, "worker unit listening");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("worker unit stopped");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let span = info_span!("request", id = %Uuid::new_v4(), %peer);
                    let unit = Arc::clone(&self);
                    tokio::spawn(
                        async move {
                            if let Err(e) = unit.handle_connection(stream).await {
                                warn!(error = %e, "connection dropped");
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }
    }

    /// Read one request from `stream`, answer it with a single write
    ///
    /// A request that breaks the framing markers drops the connection. Any
    /// other unreadable request is answered with a `failed` envelope.
    ///
    /// # Errors
    ///
    /// Returns error on a framing violation or if the response cannot be sent
    pub async fn handle_connection(self: Arc<Self>, mut stream: TcpStream) -> ClusterResult<()> {
        let response = match Envelope::read_async(&mut stream).await {
            Ok(request) => {
                debug!(command = %Command::parse(&request).name(), "request received");
                let unit = Arc::clone(&self);
                match tokio::task::spawn_blocking(move || unit.handle(&request)).await {
                    Ok(response) => response,
                    Err(e) => Response::failed(format!("request handler crashed: {e}")),
                }
            }
            Err(e) if e.is_framing() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "malformed request");
                Response::failed(format!("malformed request: {e}"))
            }
        };
        info!(response = %response, "sending response");

        stream.write_all(&response.to_bytes()?).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

fn failed_status(status: TaskStatus, error: &str) -> Envelope {
    let mut response = Response::failed(format!("{status}: {error}"));
    if let Some(meta) = response.meta.as_object_mut() {
        meta.insert("task_status".to_string(), json!(status));
    }
    response
}

impl std::fmt::Debug for WorkerUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerUnit")
            .field("namespace", &self.namespace.name())
            .field("capacity", &self.capacity)
            .finish()
    }
}
