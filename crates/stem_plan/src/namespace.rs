//! Namespaces: named groups of tasks and nested namespaces.

use crate::task::{ProxyTask, Task};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Dot-qualified task path such as `Sub.reduce`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskPath {
    segments: Vec<String>,
}

impl TaskPath {
    /// Parse a dot-qualified path
    #[must_use]
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    /// First segment
    #[must_use]
    pub fn head(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// Last segment: the task name itself
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Check if the path has a single segment
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.segments.len() <= 1
    }

    /// Path without its head
    #[must_use]
    pub fn sub_path(&self) -> Self {
        Self {
            segments: self.segments.iter().skip(1).cloned().collect(),
        }
    }

    /// All segments
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for TaskPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for TaskPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Anything that can find tasks by path
pub trait TaskLookup: Send + Sync {
    /// Find the task at `path`
    fn find_task(&self, path: &TaskPath) -> Option<Arc<dyn Task>>;

    /// Find a task by its dot-qualified path string
    fn find(&self, path: &str) -> Option<Arc<dyn Task>> {
        self.find_task(&TaskPath::parse(path))
    }

    /// Check if a task exists at `path`
    fn has_task(&self, path: &str) -> bool {
        self.find(path).is_some()
    }
}

/// Serializable outline of a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    /// Namespace name
    pub name: String,
    /// Task names registered directly in the namespace
    pub tasks: Vec<String>,
    /// Nested namespaces
    pub workspaces: Vec<Structure>,
}

impl Structure {
    /// Every task path, own tasks first, then nested ones prefixed
    /// with their namespace name
    #[must_use]
    pub fn task_paths(&self) -> Vec<String> {
        let mut paths = self.tasks.clone();
        for child in &self.workspaces {
            paths.extend(
                child
                    .task_paths()
                    .into_iter()
                    .map(|p| format!("{}.{p}", child.name)),
            );
        }
        paths
    }

    /// Nested namespace at a dot-qualified path
    #[must_use]
    pub fn sub(&self, path: &TaskPath) -> Option<&Structure> {
        let mut current = self;
        for segment in path.segments() {
            current = current.workspaces.iter().find(|w| &w.name == segment)?;
        }
        Some(current)
    }

    /// Check if `path` names a task in this outline
    #[must_use]
    pub fn contains(&self, path: &TaskPath) -> bool {
        if path.is_leaf() {
            self.tasks.iter().any(|t| t == path.name())
                || self.workspaces.iter().any(|w| w.contains(path))
        } else {
            self.workspaces
                .iter()
                .find(|w| w.name == path.head())
                .is_some_and(|w| w.contains(&path.sub_path()))
        }
    }
}

/// Named group of tasks and nested namespaces
pub struct Namespace {
    name: String,
    tasks: IndexMap<String, Arc<dyn Task>>,
    namespaces: Vec<Arc<Namespace>>,
}

impl Namespace {
    /// Start building a namespace
    #[must_use]
    pub fn builder(name: impl Into<String>) -> NamespaceBuilder {
        NamespaceBuilder {
            name: name.into(),
            tasks: IndexMap::new(),
            namespaces: Vec::new(),
        }
    }

    /// Namespace name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks registered directly in this namespace
    #[must_use]
    pub fn tasks(&self) -> &IndexMap<String, Arc<dyn Task>> {
        &self.tasks
    }

    /// Nested namespaces
    #[must_use]
    pub fn namespaces(&self) -> &[Arc<Namespace>] {
        &self.namespaces
    }

    /// Direct child namespace by name
    #[must_use]
    pub fn get_namespace(&self, name: &str) -> Option<&Arc<Namespace>> {
        self.namespaces.iter().find(|n| n.name == name)
    }

    /// Outline of this namespace and its children
    #[must_use]
    pub fn structure(&self) -> Structure {
        Structure {
            name: self.name.clone(),
            tasks: self.tasks.keys().cloned().collect(),
            workspaces: self.namespaces.iter().map(|n| n.structure()).collect(),
        }
    }
}

impl TaskLookup for Namespace {
    fn find_task(&self, path: &TaskPath) -> Option<Arc<dyn Task>> {
        if !path.is_leaf() {
            return self
                .get_namespace(path.head())?
                .find_task(&path.sub_path());
        }

        if let Some(task) = self.tasks.get(path.name()) {
            return Some(Arc::clone(task));
        }
        self.namespaces.iter().find_map(|n| n.find_task(path))
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .field("namespaces", &self.namespaces)
            .finish()
    }
}

/// Builder for [`Namespace`]
pub struct NamespaceBuilder {
    name: String,
    tasks: IndexMap<String, Arc<dyn Task>>,
    namespaces: Vec<Arc<Namespace>>,
}

impl NamespaceBuilder {
    /// Register a task under its own name
    #[must_use]
    pub fn task<T: Task + 'static>(self, task: T) -> Self {
        self.shared(Arc::new(task))
    }

    /// Register an already shared task under its own name
    #[must_use]
    pub fn shared(mut self, task: Arc<dyn Task>) -> Self {
        self.tasks.insert(task.name().to_string(), task);
        self
    }

    /// Register a task under an alias.
    ///
    /// The task is wrapped in a [`ProxyTask`] unless the alias equals its name.
    #[must_use]
    pub fn task_as(mut self, alias: impl Into<String>, task: Arc<dyn Task>) -> Self {
        let alias = alias.into();
        let task: Arc<dyn Task> = if task.name() == alias {
            task
        } else {
            Arc::new(ProxyTask::new(alias.clone(), task))
        };
        self.tasks.insert(alias, task);
        self
    }

    /// Nest a namespace
    #[must_use]
    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.push(Arc::new(namespace));
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> Namespace {
        Namespace {
            name: self.name,
            tasks: self.tasks,
            namespaces: self.namespaces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::ReduceTask;
    use crate::task::FunctionDataTask;
    use serde_json::json;
    use stem_core::Data;

    fn constant(name: &str, value: i64) -> FunctionDataTask {
        FunctionDataTask::new(name, move |_| Ok(Data::from(json!(value))))
    }

    fn sample() -> Namespace {
        let sub = Namespace::builder("Sub")
            .task_as(
                "reduce",
                Arc::new(ReduceTask::new("int_scale", |a, b| {
                    Ok(json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0)))
                })),
            )
            .task(constant("deep", 7))
            .build();

        Namespace::builder("root")
            .task(constant("data_scale", 10))
            .namespace(sub)
            .build()
    }

    #[test]
    fn test_path_parts() {
        let path = TaskPath::parse("A.B.task");
        assert_eq!(path.head(), "A");
        assert_eq!(path.name(), "task");
        assert!(!path.is_leaf());
        assert_eq!(path.sub_path().to_string(), "B.task");
        assert!(TaskPath::parse("task").is_leaf());
    }

    #[test]
    fn test_find_own_task() {
        let ns = sample();
        assert_eq!(ns.find("data_scale").unwrap().name(), "data_scale");
    }

    #[test]
    fn test_find_qualified_task() {
        let ns = sample();
        assert_eq!(ns.find("Sub.reduce").unwrap().name(), "reduce");
        assert!(ns.find("Other.reduce").is_none());
        assert!(ns.find("Sub.data_scale").is_none());
    }

    #[test]
    fn test_leaf_searches_nested_namespaces() {
        let ns = sample();
        assert_eq!(ns.find("deep").unwrap().name(), "deep");
        assert!(!ns.has_task("missing"));
    }

    #[test]
    fn test_alias_wraps_in_proxy() {
        let ns = sample();
        let reduce = ns.find("Sub.reduce").unwrap();
        assert_eq!(reduce.dependencies()[0].name(), "int_scale");
    }

    #[test]
    fn test_structure_lists_nested_tasks() {
        let structure = sample().structure();
        assert_eq!(
            serde_json::to_value(&structure).unwrap(),
            json!({
                "name": "root",
                "tasks": ["data_scale"],
                "workspaces": [{"name": "Sub", "tasks": ["reduce", "deep"], "workspaces": []}]
            })
        );
        assert_eq!(structure.workspaces[0].tasks[0], "reduce");
    }

    #[test]
    fn test_structure_paths_and_lookup() {
        let structure = sample().structure();
        assert_eq!(
            structure.task_paths(),
            vec!["data_scale", "Sub.reduce", "Sub.deep"]
        );
        assert!(structure.contains(&TaskPath::parse("Sub.reduce")));
        assert!(structure.contains(&TaskPath::parse("deep")));
        assert!(!structure.contains(&TaskPath::parse("Sub.data_scale")));
        assert_eq!(
            structure.sub(&TaskPath::parse("Sub")).unwrap().tasks.len(),
            2
        );
    }
}
