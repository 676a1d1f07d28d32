//! Structured-concurrency engine.

use crate::engine::{Engine, collect_inputs, ensure_resolved, transform};
use crate::error::{EngineError, EngineResult};
use futures::FutureExt;
use futures::future::{LocalBoxFuture, try_join_all};
use std::thread;
use stem_core::{Data, Meta};
use stem_plan::TaskNode;

/// Runs one cooperative task per child inside a single group on one thread.
///
/// Each node's children are joined as a group: the first failure drops
/// the rest of the group, so siblings that have not reached their
/// transform yet never run it. The runtime lives on its own carrier
/// thread, which lets `run` be called from inside another tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskGroupEngine;

impl TaskGroupEngine {
    /// Create a task-group engine
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn run_node<'a>(meta: Meta, node: &'a TaskNode) -> LocalBoxFuture<'a, EngineResult<Data>> {
    async move {
        let children = node
            .dependencies()
            .iter()
            .map(|child| run_node(meta.child(child.name()), child));
        let results = try_join_all(children).await?;

        // Give siblings a chance to fail before this transform starts.
        tokio::task::yield_now().await;

        let inputs = collect_inputs(node, results.into_iter().map(Ok))?;
        transform(node, &meta, inputs)
    }
    .boxed_local()
}

impl Engine for TaskGroupEngine {
    fn name(&self) -> &'static str {
        "task-group"
    }

    fn run(&self, meta: &Meta, node: &TaskNode) -> EngineResult<Data> {
        ensure_resolved(node)?;
        thread::scope(|s| {
            let carrier = thread::Builder::new()
                .name("stem-task-group".to_string())
                .spawn_scoped(s, || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_time()
                        .build()?;
                    runtime.block_on(run_node(meta.clone(), node))
                })?;
            carrier.join().unwrap_or_else(|_| {
                Err(EngineError::Panicked {
                    task: node.name().to_string(),
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stem_plan::{FunctionDataTask, FunctionTask, Namespace, TaskError};

    #[test]
    fn test_int_scale() {
        let engine = TaskGroupEngine::new();
        assert_eq!(testing::run_int_scale(&engine), testing::int_scale_expected());
    }

    #[test]
    fn test_failure_cancels_pending_siblings() {
        let deep_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&deep_calls);
        let ns = Namespace::builder("ns")
            .task(FunctionDataTask::new("fails", |_| {
                Err(TaskError::failed("first"))
            }))
            .task(FunctionDataTask::new("deep_leaf", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Data::from(json!(1)))
            }))
            .task(FunctionTask::new("deep", ["deep_leaf"], |_, _| {
                Ok(Data::from(json!(2)))
            }))
            .task(FunctionTask::new("root", ["fails", "deep"], |_, _| {
                Ok(Data::from(json!(3)))
            }))
            .build();

        let tree = testing::resolve(&ns, "root");
        let err = TaskGroupEngine::new().run(&Meta::new(), &tree).unwrap_err();

        assert!(matches!(err, EngineError::Task { ref task, .. } if task == "fails"));
        assert_eq!(deep_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callable_from_inside_a_runtime() {
        let ns = testing::namespace();
        let tree = testing::resolve(&ns, "Sub.reduce");
        let out = TaskGroupEngine::new().run(&Meta::new(), &tree).unwrap();
        assert_eq!(out.as_value(), Some(&json!(450)));
    }
}
