//! Cluster errors.

use std::io;
use stem_envelope::EnvelopeError;

/// Cluster errors
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// Could not reach a peer
    #[error("Connection to {address} failed: {source}")]
    Connect {
        /// Peer address
        address: String,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Peer answered with a failed status
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Framing or payload error
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// JSON error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;
