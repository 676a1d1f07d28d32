//! One-shot request/response client.

use crate::command::Command;
use crate::error::{ClusterError, ClusterResult};
use std::net::TcpStream;
use stem_envelope::Envelope;
use tracing::debug;

/// Sends one envelope per connection to a worker or distributor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteClient {
    address: String,
}

impl RemoteClient {
    /// Create a client for `address`
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// Peer address
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send `request` and wait for the response
    ///
    /// # Errors
    ///
    /// Returns error if the peer is unreachable or the response is malformed
    pub async fn request(&self, request: &Envelope) -> ClusterResult<Envelope> {
        let mut stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|source| self.connect_error(source))?;
        debug!(address = %self.address, request = %request, "sending request");

        request.write_async(&mut stream).await?;
        Ok(Envelope::read_async(&mut stream).await?)
    }

    /// Blocking variant of [`request`](Self::request)
    ///
    /// # Errors
    ///
    /// Returns error if the peer is unreachable or the response is malformed
    pub fn request_blocking(&self, request: &Envelope) -> ClusterResult<Envelope> {
        let mut stream =
            TcpStream::connect(&self.address).map_err(|source| self.connect_error(source))?;
        debug!(address = %self.address, request = %request, "sending request");

        request.write_to(&mut stream)?;
        Ok(Envelope::read(&mut stream)?)
    }

    /// Send a command
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request)
    pub async fn send(&self, command: &Command) -> ClusterResult<Envelope> {
        self.request(&command.to_envelope()).await
    }

    fn connect_error(&self, source: std::io::Error) -> ClusterError {
        ClusterError::Connect {
            address: self.address.clone(),
            source,
        }
    }
}
