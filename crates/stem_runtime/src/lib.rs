//! STEM Runtime
//!
//! Interchangeable engines that run a resolved [`TaskNode`](stem_plan::TaskNode)
//! tree, and the [`Orchestrator`] that resolves, validates and runs a task,
//! reporting the outcome as a tagged [`TaskResult`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod process;
pub mod result;
pub mod sequential;
pub mod task_group;
pub mod thread_pool;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{EngineConfig, EngineKind};
pub use engine::{Engine, ensure_resolved};
pub use error::{EngineError, EngineResult};
pub use orchestrator::Orchestrator;
pub use process::{ProcessPoolConfig, ProcessPoolEngine, ensure_addressable, serve, serve_stdio};
pub use result::{TaskResult, TaskStatus};
pub use sequential::SequentialEngine;
pub use task_group::TaskGroupEngine;
pub use thread_pool::ThreadPoolEngine;
