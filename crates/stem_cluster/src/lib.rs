//! STEM Cluster
//!
//! Distributed dispatch over the envelope protocol: worker units that run
//! tasks from a hosted namespace, a distributor that spreads requests over
//! idle workers by capacity, and remote tasks and namespaces for callers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod command;
pub mod config;
pub mod distributor;
pub mod error;
pub mod pool;
pub mod remote;
pub mod worker;

#[cfg(test)]
mod testing;

// Re-exports
pub use client::RemoteClient;
pub use command::{Command, FAILED, FULFILLED, Response};
pub use config::{ClusterConfig, DEFAULT_CAPACITY, DistributorConfig, WorkerConfig, WorkerEntry};
pub use distributor::{Distributor, NO_FREE_SERVERS};
pub use error::{ClusterError, ClusterResult};
pub use pool::{WorkerHandle, WorkerPool};
pub use remote::{RemoteNamespace, RemoteTask};
pub use worker::WorkerUnit;
