//! Single-threaded recursive engine.

use crate::engine::{Engine, collect_inputs, ensure_resolved, transform};
use crate::error::EngineResult;
use stem_core::{Data, Meta};
use stem_plan::TaskNode;

/// Runs the tree depth-first on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialEngine;

impl SequentialEngine {
    /// Create a sequential engine
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn run_node(&self, meta: &Meta, node: &TaskNode) -> EngineResult<Data> {
        let results = node
            .dependencies()
            .iter()
            .map(|child| self.run_node(&meta.child(child.name()), child));
        let inputs = collect_inputs(node, results)?;
        transform(node, meta, inputs)
    }
}

impl Engine for SequentialEngine {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn run(&self, meta: &Meta, node: &TaskNode) -> EngineResult<Data> {
        ensure_resolved(node)?;
        self.run_node(meta, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing;
    use serde_json::json;

    #[test]
    fn test_int_scale() {
        let out = testing::run_int_scale(&SequentialEngine::new());
        assert_eq!(out, testing::int_scale_expected());
    }

    #[test]
    fn test_child_meta_is_narrowed_by_name() {
        let ns = testing::namespace();
        let tree = testing::resolve(&ns, "int_scale");
        let meta = Meta::from_value(json!({"int_range": {"start": 2, "stop": 5}})).unwrap();

        let out = SequentialEngine::new().run(&meta, &tree).unwrap();
        assert_eq!(out.into_value().unwrap(), json!([20, 30, 40]));
    }

    #[test]
    fn test_first_error_aborts() {
        let (ns, calls) = testing::failing_namespace();
        let tree = testing::resolve(&ns, "top");
        let err = SequentialEngine::new().run(&Meta::new(), &tree).unwrap_err();
        assert!(matches!(err, EngineError::Task { ref task, .. } if task == "broken"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unresolved_tree_is_rejected() {
        let ns = testing::namespace();
        let tree = testing::resolve(&ns, "needs_ghost");
        let err = SequentialEngine::new().run(&Meta::new(), &tree).unwrap_err();
        assert!(matches!(err, EngineError::Unresolved { names } if names == ["ghost"]));
    }
}
