//! Engine contract and shared helpers.

use crate::error::{EngineError, EngineResult};
use stem_core::{Data, Meta};
use stem_plan::{Inputs, TaskNode};

/// Runs a resolved task tree
///
/// Every engine computes a node's children before the node itself, passes
/// each child the sub-meta found under the child's name, and aborts the
/// whole run on the first error it observes.
pub trait Engine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Run the tree rooted at `node`
    ///
    /// # Errors
    ///
    /// Returns `Unresolved` if the tree has dependency errors, or the first
    /// task failure
    fn run(&self, meta: &Meta, node: &TaskNode) -> EngineResult<Data>;
}

/// Reject trees with unresolved names
///
/// # Errors
///
/// Returns `Unresolved` listing every missing name
pub fn ensure_resolved(node: &TaskNode) -> EngineResult<()> {
    if node.has_dependency_errors() {
        return Err(EngineError::Unresolved {
            names: node.all_unresolved(),
        });
    }
    Ok(())
}

/// Call a node's transform, tagging errors with the task name
pub(crate) fn transform(node: &TaskNode, meta: &Meta, inputs: Inputs) -> EngineResult<Data> {
    node.task()
        .transform(meta, inputs)
        .map_err(|e| EngineError::task(node.name(), e))
}

/// Zip child results back into named inputs, failing on the first error
pub(crate) fn collect_inputs<I>(node: &TaskNode, results: I) -> EngineResult<Inputs>
where
    I: IntoIterator<Item = EngineResult<Data>>,
{
    let mut inputs = Inputs::new();
    for (child, result) in node.dependencies().iter().zip(results) {
        inputs.insert(child.name(), result?);
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequential::SequentialEngine;
    use crate::task_group::TaskGroupEngine;
    use crate::thread_pool::ThreadPoolEngine;
    use proptest::prelude::*;
    use serde_json::json;
    use stem_plan::{FunctionTask, Namespace, TaskLookup};

    /// Node `i` depends on every earlier node whose bit is set in `edges[i]`
    fn layered(edges: &[Vec<bool>]) -> Namespace {
        let mut builder = Namespace::builder("ns");
        for (i, bits) in edges.iter().enumerate() {
            let deps: Vec<String> = bits
                .iter()
                .take(i)
                .enumerate()
                .filter(|(_, on)| **on)
                .map(|(j, _)| format!("n{j}"))
                .collect();
            let own = i as i64;
            builder = builder.task(FunctionTask::new(format!("n{i}"), deps, move |meta, inputs| {
                let mut total = own + meta.get_or("bias", json!(0)).as_i64().unwrap_or(0);
                for (_, data) in inputs.iter() {
                    total += data.to_value()?.as_i64().unwrap_or(0);
                }
                Ok(Data::from(json!(total)))
            }));
        }
        builder.build()
    }

    #[test]
    fn test_unresolved_lists_every_name() {
        let ns = Namespace::builder("ns")
            .task(FunctionTask::new("root", ["x", "y"], |_, _| Ok(Data::from(json!(0)))))
            .build();
        let tree = TaskNode::resolve(ns.find("root").unwrap(), &ns).unwrap();
        let err = ensure_resolved(&tree).unwrap_err();
        assert!(matches!(err, EngineError::Unresolved { names } if names == ["x", "y"]));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_engines_agree(edges in prop::collection::vec(prop::collection::vec(any::<bool>(), 8), 1..8)) {
            let ns = layered(&edges);
            let root = ns.find(&format!("n{}", edges.len() - 1)).unwrap();
            let tree = TaskNode::resolve(root, &ns).unwrap();
            let meta = Meta::from_value(json!({"bias": 1})).unwrap();

            let expected = SequentialEngine::new().run(&meta, &tree).unwrap().into_value().unwrap();
            let pooled = ThreadPoolEngine::new(3).unwrap().run(&meta, &tree).unwrap().into_value().unwrap();
            let grouped = TaskGroupEngine::new().run(&meta, &tree).unwrap().into_value().unwrap();

            prop_assert_eq!(&pooled, &expected);
            prop_assert_eq!(&grouped, &expected);
        }
    }
}
