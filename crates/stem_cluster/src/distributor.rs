//! Distributor: forwards requests to idle workers picked by capacity.

use crate::client::RemoteClient;
use crate::command::{Command, Response};
use crate::config::DistributorConfig;
use crate::error::ClusterResult;
use crate::pool::WorkerPool;
use serde_json::json;
use std::sync::Arc;
use stem_envelope::Envelope;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Error text when every worker is busy
pub const NO_FREE_SERVERS: &str = "no free servers";

/// Front end for a fixed set of worker units
///
/// `run` and `structure` go to one idle worker chosen with probability
/// proportional to its capacity. The worker is busy until its response
/// arrives. `powerfullity` answers with the total capacity and `stop`
/// ends [`serve`](Self::serve).
#[derive(Debug)]
pub struct Distributor {
    pool: WorkerPool,
    shutdown: CancellationToken,
}

impl Distributor {
    /// Create a distributor over `pool`
    #[must_use]
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            pool,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a distributor for the configured workers
    ///
    /// # Errors
    ///
    /// Returns error if a worker has zero capacity
    pub fn from_config(config: &DistributorConfig) -> ClusterResult<Self> {
        Ok(Self::new(WorkerPool::new(config.workers.clone())?))
    }

    /// Worker pool
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Token cancelled by a `stop` request
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept connections until a `stop` request arrives or the shutdown
    /// token is cancelled
    ///
    /// # Errors
    ///
    /// Returns error if the listener address cannot be read
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> ClusterResult<()> {
        info!(
            address = %listener.local_addr()?,
            workers = self.pool.workers().len(),
            capacity = self.pool.total_capacity(),
            "distributor listening"
        );
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("distributor stopped");
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
                    let distributor = Arc::clone(&self);
                    tokio::spawn(
                        async move {
                            if let Err(e) = distributor.handle_connection(stream).await {
                                warn!(error = %e, "connection dropped");
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }
    }

    /// Read one request from `stream` and answer it
    ///
    /// A `stop` request gets no answer; the connection is closed instead.
    /// Unreadable requests are answered with a `failed` envelope unless
    /// they break the framing markers.
    ///
    /// # Errors
    ///
    /// Returns error on a framing violation or if the response cannot be sent
    pub async fn handle_connection(&self, mut stream: TcpStream) -> ClusterResult<()> {
        let request = match Envelope::read_async(&mut stream).await {
            Ok(request) => request,
            Err(e) if e.is_framing() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "malformed request");
                let response = Response::failed(format!("malformed request: {e}"));
                return reply(&mut stream, &response).await;
            }
        };
        let command = Command::parse(&request);
        debug!(command = command.name(), "request received");

        let response = match command {
            Command::Run { .. } | Command::Structure => self.forward(&request).await,
            Command::Powerfullity => {
                Response::fulfilled(json!({ "powerfullity": self.pool.total_capacity() }))
            }
            Command::Stop => {
                info!("stop requested");
                self.shutdown.cancel();
                return Ok(());
            }
            Command::Unknown(name) => Response::failed(format!("unknown command '{name}'")),
        };
        reply(&mut stream, &response).await
    }

    /// Send `request` to an idle worker and relay its response
    pub async fn forward(&self, request: &Envelope) -> Envelope {
        let Some(worker) = self.pool.checkout() else {
            warn!("every worker is busy");
            return Response::failed(NO_FREE_SERVERS);
        };
        debug!(worker = worker.address(), capacity = worker.capacity(), "worker selected");

        let response = match RemoteClient::new(worker.address()).request(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(worker = worker.address(), error = %e, "worker request failed");
                Response::failed(e.to_string())
            }
        };

        debug!(worker = worker.address(), "worker returned");
        self.pool.checkin(worker);
        response
    }
}

/// Stream `response` back without buffering its payload, then close
async fn reply(stream: &mut TcpStream, response: &Envelope) -> ClusterResult<()> {
    response.write_async(stream).await?;
    stream.shutdown().await?;
    Ok(())
}
