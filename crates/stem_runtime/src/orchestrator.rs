//! Resolve, validate and run a task, wrapping the outcome in a [`TaskResult`].

use crate::engine::Engine;
use crate::result::TaskResult;
use crate::sequential::SequentialEngine;
use std::sync::Arc;
use stem_core::{Meta, MetaVerifier};
use stem_plan::{GraphError, Task, TaskLookup, TaskNode};
use tracing::{debug, info, warn};

/// Front door for running tasks
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn Engine>,
    verifier: Option<Arc<dyn MetaVerifier>>,
}

impl Orchestrator {
    /// Create an orchestrator using `engine`
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            verifier: None,
        }
    }

    /// Check the root task's meta before running it
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn MetaVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// The engine in use
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Execute `task`, resolving named dependencies through `lookup`
    pub fn execute(&self, meta: &Meta, task: Arc<dyn Task>, lookup: &dyn TaskLookup) -> TaskResult {
        let name = task.name().to_string();
        self.run_resolved(meta, &name, TaskNode::resolve(task, lookup))
    }

    /// Execute the task at a dot-qualified `path` in `lookup`.
    ///
    /// A missing root is reported as a dependency error on the path itself.
    pub fn execute_path(&self, meta: &Meta, path: &str, lookup: &dyn TaskLookup) -> TaskResult {
        match TaskNode::resolve_path(path, lookup) {
            Ok(Some(tree)) => self.run_resolved(meta, path, Ok(tree)),
            Ok(None) => TaskResult::dependency_error(vec![path.to_string()]),
            Err(e) => self.run_resolved(meta, path, Err(e)),
        }
    }

    fn run_resolved(
        &self,
        meta: &Meta,
        name: &str,
        resolved: Result<TaskNode, GraphError>,
    ) -> TaskResult {
        let tree = match resolved {
            Ok(tree) => tree,
            Err(e) => {
                warn!(task = %name, error = %e, "task graph rejected");
                return TaskResult::cycle_detected(e.to_string());
            }
        };

        if tree.has_dependency_errors() {
            let unresolved = tree.all_unresolved();
            warn!(task = %name, ?unresolved, "unresolved dependencies");
            return TaskResult::dependency_error(unresolved);
        }

        if let Some(verifier) = &self.verifier {
            let field_errors = tree.task().check_by_meta(meta, verifier.as_ref());
            if !field_errors.is_empty() {
                warn!(task = %name, errors = field_errors.len(), "meta rejected");
                return TaskResult::invalid_meta(field_errors);
            }
        }

        debug!(task = %name, nodes = tree.size(), engine = self.engine.name(), "executing");
        match self.engine.run(meta, &tree) {
            Ok(data) => {
                info!(task = %name, engine = self.engine.name(), "task finished");
                TaskResult::contains_data(data)
            }
            Err(e) => {
                warn!(task = %name, error = %e, "task failed");
                TaskResult::failed(e.to_string())
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Arc::new(SequentialEngine::new()))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("engine", &self.engine.name())
            .field("verifier", &self.verifier.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::TaskStatus;
    use crate::testing;
    use crate::thread_pool::ThreadPoolEngine;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stem_core::{Data, FieldError, FieldSpec, Specification, ValueKind};
    use stem_plan::{FunctionDataTask, FunctionTask, Namespace};

    #[test]
    fn test_contains_data() {
        let ns = testing::namespace();
        let result = Orchestrator::default().execute_path(&Meta::new(), "int_scale", &ns);
        assert_eq!(result.status(), TaskStatus::ContainsData);
        assert_eq!(result.data().unwrap(), &testing::int_scale_expected());
    }

    #[test]
    fn test_dependency_error_runs_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (c1, c2) = (Arc::clone(&calls), Arc::clone(&calls));
        let ns = Namespace::builder("ns")
            .task(FunctionDataTask::new("present", move |_| {
                c1.fetch_add(1, Ordering::SeqCst);
                Ok(Data::from(json!(1)))
            }))
            .task(FunctionTask::new("root", ["present", "missing"], move |_, _| {
                c2.fetch_add(1, Ordering::SeqCst);
                Ok(Data::from(json!(2)))
            }))
            .build();

        let result = Orchestrator::default().execute_path(&Meta::new(), "root", &ns);
        assert_eq!(result.status(), TaskStatus::DependencyError);
        assert_eq!(result.unresolved(), ["missing"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_root_is_dependency_error() {
        let ns = testing::namespace();
        let result = Orchestrator::default().execute_path(&Meta::new(), "Sub.nothing", &ns);
        assert_eq!(result.status(), TaskStatus::DependencyError);
        assert_eq!(result.unresolved(), ["Sub.nothing"]);
    }

    #[test]
    fn test_failure_is_described() {
        let (ns, _) = testing::failing_namespace();
        let engine = Arc::new(ThreadPoolEngine::new(2).unwrap());
        let result = Orchestrator::new(engine).execute_path(&Meta::new(), "top", &ns);
        assert_eq!(result.status(), TaskStatus::Failed);
        assert!(result.error().unwrap().contains("broken on purpose"));
    }

    #[test]
    fn test_cycle_detected() {
        let ns = Namespace::builder("ns")
            .task(FunctionTask::new("a", ["b"], |_, _| Ok(Data::from(json!(0)))))
            .task(FunctionTask::new("b", ["a"], |_, _| Ok(Data::from(json!(0)))))
            .build();
        let result = Orchestrator::default().execute_path(&Meta::new(), "a", &ns);
        assert_eq!(result.status(), TaskStatus::CycleDetected);
        assert!(result.error().unwrap().contains("a -> b -> a"));
    }

    #[test]
    fn test_verifier_rejects_meta() {
        let spec = Specification::Fields(vec![(
            "scale".to_string(),
            FieldSpec::Types(vec![ValueKind::Integer]),
        )]);
        let ns = Namespace::builder("ns")
            .task(
                FunctionDataTask::new("scaled", |meta| Ok(Data::from(meta.get_or("scale", json!(1)))))
                    .with_specification(spec),
            )
            .build();

        let verifier = |value: &Value, _: &Specification| -> Vec<FieldError> {
            match value.get("scale") {
                Some(v) if v.is_i64() => Vec::new(),
                other => vec![FieldError {
                    required_key: "scale".to_string(),
                    required_types: vec![ValueKind::Integer],
                    presented_type: other.map(ValueKind::of),
                    presented_value: other.cloned(),
                }],
            }
        };
        let orchestrator = Orchestrator::default().with_verifier(Arc::new(verifier));

        let bad = Meta::from_value(json!({"scale": "big"})).unwrap();
        let result = orchestrator.execute_path(&bad, "scaled", &ns);
        assert_eq!(result.status(), TaskStatus::InvalidMeta);
        assert_eq!(result.field_errors().len(), 1);

        let good = Meta::from_value(json!({"scale": 4})).unwrap();
        let result = orchestrator.execute_path(&good, "scaled", &ns);
        assert_eq!(result.data().unwrap(), &json!(4));
    }
}
