//! Rayon-backed engine.

use crate::engine::{Engine, collect_inputs, ensure_resolved, transform};
use crate::error::EngineResult;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use stem_core::{Data, Meta};
use stem_plan::TaskNode;
use tracing::debug;

/// Runs sibling subtrees in parallel on a fixed-size thread pool.
///
/// A node waits for every child to finish before its own transform runs.
/// A failing child does not cancel its siblings; the first error in
/// dependency order is reported once all of them are done.
pub struct ThreadPoolEngine {
    pool: ThreadPool,
    threads: usize,
}

impl ThreadPoolEngine {
    /// Create an engine with `threads` workers (minimum 1)
    ///
    /// # Errors
    ///
    /// Returns error if the OS refuses to spawn the threads
    pub fn new(threads: usize) -> EngineResult<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("stem-worker-{i}"))
            .build()?;
        Ok(Self { pool, threads })
    }

    /// Number of pool threads
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    fn run_node(&self, meta: &Meta, node: &TaskNode) -> EngineResult<Data> {
        let results: Vec<EngineResult<Data>> = node
            .dependencies()
            .par_iter()
            .map(|child| self.run_node(&meta.child(child.name()), child))
            .collect();
        let inputs = collect_inputs(node, results)?;
        transform(node, meta, inputs)
    }
}

impl Engine for ThreadPoolEngine {
    fn name(&self) -> &'static str {
        "thread-pool"
    }

    fn run(&self, meta: &Meta, node: &TaskNode) -> EngineResult<Data> {
        ensure_resolved(node)?;
        debug!(threads = self.threads, task = node.name(), "running on thread pool");
        self.pool.install(|| self.run_node(meta, node))
    }
}

impl std::fmt::Debug for ThreadPoolEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolEngine")
            .field("threads", &self.threads)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing;
    use serde_json::json;
    use std::sync::{Arc, Barrier};
    use stem_plan::{FunctionDataTask, FunctionTask, Namespace, TaskLookup};

    #[test]
    fn test_int_scale() {
        let engine = ThreadPoolEngine::new(5).unwrap();
        assert_eq!(testing::run_int_scale(&engine), testing::int_scale_expected());
    }

    #[test]
    fn test_siblings_run_concurrently() {
        // Both leaves block until the other arrives; a serial run would hang.
        let barrier = Arc::new(Barrier::new(2));
        let (b1, b2) = (Arc::clone(&barrier), Arc::clone(&barrier));
        let ns = Namespace::builder("ns")
            .task(FunctionDataTask::new("left", move |_| {
                b1.wait();
                Ok(Data::from(json!(1)))
            }))
            .task(FunctionDataTask::new("right", move |_| {
                b2.wait();
                Ok(Data::from(json!(2)))
            }))
            .task(FunctionTask::new("sum", ["left", "right"], |_, inputs| {
                let l = inputs.value("left")?.as_i64().unwrap_or(0);
                let r = inputs.value("right")?.as_i64().unwrap_or(0);
                Ok(Data::from(json!(l + r)))
            }))
            .build();

        let tree = testing::resolve(&ns, "sum");
        let engine = ThreadPoolEngine::new(2).unwrap();
        let out = engine.run(&Meta::new(), &tree).unwrap();
        assert_eq!(out.as_value(), Some(&json!(3)));
        assert!(ns.has_task("left"));
    }

    #[test]
    fn test_child_error_propagates() {
        let (ns, calls) = testing::failing_namespace();
        let tree = testing::resolve(&ns, "top");
        let err = ThreadPoolEngine::new(3)
            .unwrap()
            .run(&Meta::new(), &tree)
            .unwrap_err();
        assert!(matches!(err, EngineError::Task { ref task, .. } if task == "broken"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_threads_clamped() {
        assert_eq!(ThreadPoolEngine::new(0).unwrap().threads(), 1);
    }
}
