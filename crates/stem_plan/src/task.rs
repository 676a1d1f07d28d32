//! Task definitions.
//!
//! A task has a name, an ordered list of dependencies and a transform that
//! turns the resolved dependency values plus a context [`Meta`] into
//! [`Data`]. Dependencies are either names, looked up in a namespace at
//! resolution time, or direct handles to other tasks.

use crate::error::{TaskError, TransformResult};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use stem_core::{Data, DataStream, FieldError, Meta, MetaVerifier, Specification};

/// A named unit of computation
pub trait Task: Send + Sync {
    /// Task name, also the key its value is passed under
    fn name(&self) -> &str;

    /// Ordered dependencies
    fn dependencies(&self) -> &[Dependency] {
        &[]
    }

    /// Expected shape of the task's meta
    fn specification(&self) -> Option<&Specification> {
        None
    }

    /// Static settings attached at definition time
    fn settings(&self) -> Option<&Meta> {
        None
    }

    /// Check `meta` against the task's specification.
    ///
    /// Tasks without a specification accept any meta.
    fn check_by_meta(&self, meta: &Meta, verifier: &dyn MetaVerifier) -> Vec<FieldError> {
        match self.specification() {
            Some(spec) => verifier.verify(&meta.to_value(), spec),
            None => Vec::new(),
        }
    }

    /// Compute the task's value.
    ///
    /// # Errors
    ///
    /// Returns error if the computation fails
    fn transform(&self, meta: &Meta, inputs: Inputs) -> TransformResult<Data>;
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name())
            .field("dependencies", &self.dependencies())
            .finish()
    }
}

/// Reference from a task to one of its dependencies
#[derive(Clone)]
pub enum Dependency {
    /// Dot-qualified path resolved through a namespace
    Name(String),
    /// Direct handle
    Task(Arc<dyn Task>),
}

impl Dependency {
    /// Name as written, or the handle's task name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Task(task) => task.name(),
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "Name({name})"),
            Self::Task(task) => write!(f, "Task({})", task.name()),
        }
    }
}

impl From<&str> for Dependency {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Dependency {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Arc<dyn Task>> for Dependency {
    fn from(task: Arc<dyn Task>) -> Self {
        Self::Task(task)
    }
}

/// Resolved dependency values, keyed by the producing task's name
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    values: IndexMap<String, Data>,
}

impl Inputs {
    /// Create an empty input set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value
    pub fn insert(&mut self, name: impl Into<String>, data: Data) {
        self.values.insert(name.into(), data);
    }

    /// Borrow an input
    ///
    /// # Errors
    ///
    /// Returns `MissingInput` if no such input was passed
    pub fn get(&self, name: &str) -> TransformResult<&Data> {
        self.values.get(name).ok_or_else(|| TaskError::MissingInput {
            name: name.to_string(),
        })
    }

    /// Input forced to a JSON value
    ///
    /// # Errors
    ///
    /// Returns error if the input is missing or a stream item fails
    pub fn value(&self, name: &str) -> TransformResult<Value> {
        Ok(self.get(name)?.to_value()?)
    }

    /// Input viewed as a sequence
    ///
    /// # Errors
    ///
    /// Returns error if the input is missing or not a sequence
    pub fn stream(&self, name: &str) -> TransformResult<DataStream> {
        Ok(self.get(name)?.as_stream()?)
    }

    /// The only input of a single-dependency task
    ///
    /// # Errors
    ///
    /// Returns `InputCount` unless exactly one input is present
    pub fn single(&self, task: &str) -> TransformResult<&Data> {
        match self.values.len() {
            1 => Ok(&self.values[0]),
            count => Err(TaskError::InputCount {
                task: task.to_string(),
                count,
            }),
        }
    }

    /// Number of inputs
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no inputs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over inputs in dependency order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Data)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Data)> for Inputs {
    fn from_iter<I: IntoIterator<Item = (String, Data)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Inputs {
    type Item = (String, Data);
    type IntoIter = indexmap::map::IntoIter<String, Data>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

type TransformFn = dyn Fn(&Meta, Inputs) -> TransformResult<Data> + Send + Sync;

/// Task backed by a closure
pub struct FunctionTask {
    name: String,
    dependencies: Vec<Dependency>,
    specification: Option<Specification>,
    settings: Option<Meta>,
    func: Box<TransformFn>,
}

impl FunctionTask {
    /// Create a function task
    pub fn new<D, F>(name: impl Into<String>, dependencies: D, func: F) -> Self
    where
        D: IntoIterator,
        D::Item: Into<Dependency>,
        F: Fn(&Meta, Inputs) -> TransformResult<Data> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            specification: None,
            settings: None,
            func: Box::new(func),
        }
    }

    /// Attach a specification
    #[must_use]
    pub fn with_specification(mut self, specification: Specification) -> Self {
        self.specification = Some(specification);
        self
    }

    /// Attach static settings
    #[must_use]
    pub fn with_settings(mut self, settings: Meta) -> Self {
        self.settings = Some(settings);
        self
    }
}

impl Task for FunctionTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn specification(&self) -> Option<&Specification> {
        self.specification.as_ref()
    }

    fn settings(&self) -> Option<&Meta> {
        self.settings.as_ref()
    }

    fn transform(&self, meta: &Meta, inputs: Inputs) -> TransformResult<Data> {
        (self.func)(meta, inputs)
    }
}

/// Task with no dependencies that produces data from meta alone
pub trait DataTask: Send + Sync {
    /// Task name
    fn name(&self) -> &str;

    /// Expected shape of the task's meta
    fn specification(&self) -> Option<&Specification> {
        None
    }

    /// Static settings
    fn settings(&self) -> Option<&Meta> {
        None
    }

    /// Produce the data.
    ///
    /// # Errors
    ///
    /// Returns error if the data cannot be produced
    fn data(&self, meta: &Meta) -> TransformResult<Data>;
}

impl<T: DataTask> Task for T {
    fn name(&self) -> &str {
        DataTask::name(self)
    }

    fn specification(&self) -> Option<&Specification> {
        DataTask::specification(self)
    }

    fn settings(&self) -> Option<&Meta> {
        DataTask::settings(self)
    }

    fn transform(&self, meta: &Meta, _inputs: Inputs) -> TransformResult<Data> {
        self.data(meta)
    }
}

type DataFn = dyn Fn(&Meta) -> TransformResult<Data> + Send + Sync;

/// Data task backed by a closure
pub struct FunctionDataTask {
    name: String,
    specification: Option<Specification>,
    settings: Option<Meta>,
    func: Box<DataFn>,
}

impl FunctionDataTask {
    /// Create a data task
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Meta) -> TransformResult<Data> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            specification: None,
            settings: None,
            func: Box::new(func),
        }
    }

    /// Attach a specification
    #[must_use]
    pub fn with_specification(mut self, specification: Specification) -> Self {
        self.specification = Some(specification);
        self
    }

    /// Attach static settings
    #[must_use]
    pub fn with_settings(mut self, settings: Meta) -> Self {
        self.settings = Some(settings);
        self
    }
}

impl DataTask for FunctionDataTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn specification(&self) -> Option<&Specification> {
        self.specification.as_ref()
    }

    fn settings(&self) -> Option<&Meta> {
        self.settings.as_ref()
    }

    fn data(&self, meta: &Meta) -> TransformResult<Data> {
        (self.func)(meta)
    }
}

/// Task re-exposed under another name
pub struct ProxyTask {
    name: String,
    inner: Arc<dyn Task>,
}

impl ProxyTask {
    /// Wrap `inner` under `name`
    pub fn new(name: impl Into<String>, inner: Arc<dyn Task>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }

    /// The wrapped task
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn Task> {
        &self.inner
    }
}

impl Task for ProxyTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[Dependency] {
        self.inner.dependencies()
    }

    fn specification(&self) -> Option<&Specification> {
        self.inner.specification()
    }

    fn settings(&self) -> Option<&Meta> {
        self.inner.settings()
    }

    fn check_by_meta(&self, meta: &Meta, verifier: &dyn MetaVerifier) -> Vec<FieldError> {
        self.inner.check_by_meta(meta, verifier)
    }

    fn transform(&self, meta: &Meta, inputs: Inputs) -> TransformResult<Data> {
        self.inner.transform(meta, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stem_core::{FieldSpec, ValueKind};

    fn sum_task() -> FunctionTask {
        FunctionTask::new("sum", ["a", "b"], |_meta, inputs| {
            let a = inputs.value("a")?.as_i64().unwrap_or(0);
            let b = inputs.value("b")?.as_i64().unwrap_or(0);
            Ok(Data::from(json!(a + b)))
        })
    }

    #[test]
    fn test_function_task_transform() {
        let task = sum_task();
        let inputs: Inputs = [
            ("a".to_string(), Data::from(json!(2))),
            ("b".to_string(), Data::from(json!(3))),
        ]
        .into_iter()
        .collect();

        let out = task.transform(&Meta::new(), inputs).unwrap();
        assert_eq!(out.as_value(), Some(&json!(5)));
        assert_eq!(task.dependencies().len(), 2);
        assert_eq!(task.dependencies()[1].name(), "b");
    }

    #[test]
    fn test_missing_input() {
        let err = sum_task().transform(&Meta::new(), Inputs::new()).unwrap_err();
        assert!(matches!(err, TaskError::MissingInput { name } if name == "a"));
    }

    #[test]
    fn test_data_task_reads_meta() {
        let task = FunctionDataTask::new("scale", |meta| {
            Ok(Data::from(meta.get_or("scale", json!(10))))
        });

        assert!(Task::dependencies(&task).is_empty());
        let mut meta = Meta::new();
        assert_eq!(
            task.transform(&meta, Inputs::new()).unwrap().as_value(),
            Some(&json!(10))
        );
        meta.set("scale", json!(3));
        assert_eq!(
            task.transform(&meta, Inputs::new()).unwrap().as_value(),
            Some(&json!(3))
        );
    }

    #[test]
    fn test_proxy_forwards_everything_but_name() {
        let inner: Arc<dyn Task> = Arc::new(sum_task());
        let proxy = ProxyTask::new("total", Arc::clone(&inner));

        assert_eq!(proxy.name(), "total");
        assert_eq!(proxy.dependencies().len(), 2);
        assert!(Arc::ptr_eq(proxy.inner(), &inner));
    }

    #[test]
    fn test_check_by_meta_uses_specification() {
        let spec = Specification::Fields(vec![(
            "scale".to_string(),
            FieldSpec::Types(vec![ValueKind::Integer]),
        )]);
        let task = FunctionDataTask::new("scale", |_| Ok(Data::from(json!(0))))
            .with_specification(spec);

        let verifier = |value: &Value, _spec: &Specification| -> Vec<FieldError> {
            if value.get("scale").is_some() {
                Vec::new()
            } else {
                vec![FieldError {
                    required_key: "scale".to_string(),
                    required_types: vec![ValueKind::Integer],
                    presented_type: None,
                    presented_value: None,
                }]
            }
        };

        assert_eq!(task.check_by_meta(&Meta::new(), &verifier).len(), 1);

        let mut meta = Meta::new();
        meta.set("scale", json!(2));
        assert!(task.check_by_meta(&meta, &verifier).is_empty());
    }

    #[test]
    fn test_task_without_specification_accepts_anything() {
        let verifier = |_: &Value, _: &Specification| -> Vec<FieldError> { panic!("not called") };
        assert!(sum_task().check_by_meta(&Meta::new(), &verifier).is_empty());
    }

    #[test]
    fn test_single_input() {
        let mut inputs = Inputs::new();
        assert!(matches!(
            inputs.single("t"),
            Err(TaskError::InputCount { count: 0, .. })
        ));
        inputs.insert("x", Data::from(json!(1)));
        assert_eq!(inputs.single("t").unwrap().as_value(), Some(&json!(1)));
    }
}
