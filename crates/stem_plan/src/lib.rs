//! STEM Planner
//!
//! Task definitions, namespaces and the resolver that turns a root task
//! into an immutable [`TaskNode`] tree ready for an engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod namespace;
pub mod node;
pub mod sequence;
pub mod task;

// Re-exports
pub use error::{GraphError, TaskError, TransformResult};
pub use namespace::{Namespace, NamespaceBuilder, Structure, TaskLookup, TaskPath};
pub use node::{DEFAULT_MAX_DEPTH, TaskNode};
pub use sequence::{FilterTask, MapTask, ReduceTask};
pub use task::{
    DataTask, Dependency, FunctionDataTask, FunctionTask, Inputs, ProxyTask, Task,
};
