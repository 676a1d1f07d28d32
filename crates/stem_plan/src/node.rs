//! Resolved task tree.
//!
//! A [`TaskNode`] mirrors the dependency structure of a root task. Names are
//! looked up once, at resolution time; names that cannot be found are kept
//! on the node instead of failing the build, so a caller can report all of
//! them at once. Shared subtasks are resolved once per occurrence.
//!
//! Each node also keeps the dot-qualified path it was found under, so the
//! same task can be looked up again in another process. Direct handles and
//! roots resolved from a bare task have no path.

use crate::error::GraphError;
use crate::namespace::{TaskLookup, TaskPath};
use crate::task::{Dependency, Task};
use std::sync::Arc;

/// Default bound on resolution depth
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// A task with its resolved dependencies
#[derive(Debug, Clone)]
pub struct TaskNode {
    task: Arc<dyn Task>,
    path: Option<String>,
    dependencies: Vec<TaskNode>,
    unresolved: Vec<String>,
    has_dependency_errors: bool,
}

impl TaskNode {
    /// Resolve the tree under `task`
    ///
    /// # Errors
    ///
    /// Returns `Cycle` if a task depends on itself, `TooDeep` past
    /// [`DEFAULT_MAX_DEPTH`]
    pub fn resolve(task: Arc<dyn Task>, lookup: &dyn TaskLookup) -> Result<Self, GraphError> {
        Self::resolve_with_limit(task, lookup, DEFAULT_MAX_DEPTH)
    }

    /// Resolve with an explicit depth bound
    ///
    /// # Errors
    ///
    /// See [`TaskNode::resolve`]
    pub fn resolve_with_limit(
        task: Arc<dyn Task>,
        lookup: &dyn TaskLookup,
        limit: usize,
    ) -> Result<Self, GraphError> {
        let mut ancestors = Vec::new();
        Self::build(task, None, lookup, &mut ancestors, limit)
    }

    /// Look up `path` in `lookup` and resolve the tree under it.
    ///
    /// Returns `Ok(None)` when nothing is registered at `path`.
    ///
    /// # Errors
    ///
    /// See [`TaskNode::resolve`]
    pub fn resolve_path(path: &str, lookup: &dyn TaskLookup) -> Result<Option<Self>, GraphError> {
        let Some(task) = lookup.find(path) else {
            return Ok(None);
        };
        let mut ancestors = Vec::new();
        Self::build(task, Some(path.to_string()), lookup, &mut ancestors, DEFAULT_MAX_DEPTH)
            .map(Some)
    }

    fn build(
        task: Arc<dyn Task>,
        path: Option<String>,
        lookup: &dyn TaskLookup,
        ancestors: &mut Vec<Arc<dyn Task>>,
        limit: usize,
    ) -> Result<Self, GraphError> {
        if let Some(pos) = ancestors.iter().position(|a| same_task(a, &task)) {
            let mut path: Vec<String> =
                ancestors[pos..].iter().map(|a| a.name().to_string()).collect();
            path.push(task.name().to_string());
            return Err(GraphError::Cycle { path });
        }
        if ancestors.len() >= limit {
            return Err(GraphError::TooDeep { limit });
        }

        ancestors.push(Arc::clone(&task));
        let mut dependencies = Vec::new();
        let mut unresolved = Vec::new();

        for dependency in task.dependencies() {
            let resolved = match dependency {
                Dependency::Task(t) => Some((Arc::clone(t), None)),
                Dependency::Name(name) => lookup
                    .find_task(&TaskPath::parse(name))
                    .map(|t| (t, Some(name.clone()))),
            };
            match resolved {
                Some((child, child_path)) => {
                    dependencies.push(Self::build(child, child_path, lookup, ancestors, limit)?);
                }
                None => unresolved.push(dependency.name().to_string()),
            }
        }
        ancestors.pop();

        let has_dependency_errors =
            !unresolved.is_empty() || dependencies.iter().any(|d| d.has_dependency_errors);

        Ok(Self {
            task,
            path,
            dependencies,
            unresolved,
            has_dependency_errors,
        })
    }

    /// The node's task
    #[must_use]
    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }

    /// Task name
    #[must_use]
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Path this node was looked up under, if it came from a lookup
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Resolved children, in dependency order
    #[must_use]
    pub fn dependencies(&self) -> &[TaskNode] {
        &self.dependencies
    }

    /// Names this node could not resolve
    #[must_use]
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Check if this node or any descendant has unresolved names
    #[must_use]
    pub fn has_dependency_errors(&self) -> bool {
        self.has_dependency_errors
    }

    /// Check if the node has no resolved children
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Every unresolved name in the subtree, in depth-first order
    #[must_use]
    pub fn all_unresolved(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_unresolved(&mut out);
        out
    }

    fn collect_unresolved(&self, out: &mut Vec<String>) {
        for child in &self.dependencies {
            child.collect_unresolved(out);
        }
        out.extend(self.unresolved.iter().cloned());
    }

    /// First node, depth-first from this one, whose task has `name`
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&TaskNode> {
        if self.name() == name {
            return Some(self);
        }
        self.dependencies.iter().find_map(|d| d.find(name))
    }

    /// Number of nodes in the subtree
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.dependencies.iter().map(TaskNode::size).sum::<usize>()
    }
}

// Compare data pointers only; vtable pointers may differ across codegen units.
fn same_task(a: &Arc<dyn Task>, b: &Arc<dyn Task>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
