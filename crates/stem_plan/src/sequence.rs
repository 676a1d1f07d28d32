//! Tasks over a single upstream sequence.
//!
//! Map and filter stay lazy: they wrap the upstream stream and pull nothing
//! until the result is consumed. Reduce is eager.

use crate::error::{TaskError, TransformResult};
use crate::task::{Dependency, Inputs, Task};
use serde_json::Value;
use std::sync::Arc;
use stem_core::{CoreResult, Data, Meta};

type MapFn = dyn Fn(Value) -> CoreResult<Value> + Send + Sync;
type PredicateFn = dyn Fn(&Value) -> CoreResult<bool> + Send + Sync;
type FoldFn = dyn Fn(Value, Value) -> CoreResult<Value> + Send + Sync;

fn single_dependency(prefix: &str, dependency: impl Into<Dependency>) -> (String, Vec<Dependency>) {
    let dependency = dependency.into();
    (format!("{prefix}_{}", dependency.name()), vec![dependency])
}

/// Lazily maps every item of the upstream sequence
pub struct MapTask {
    name: String,
    dependencies: Vec<Dependency>,
    func: Arc<MapFn>,
}

impl MapTask {
    /// Create a map task named `map_<dependency>`
    pub fn new<F>(dependency: impl Into<Dependency>, func: F) -> Self
    where
        F: Fn(Value) -> CoreResult<Value> + Send + Sync + 'static,
    {
        let (name, dependencies) = single_dependency("map", dependency);
        Self {
            name,
            dependencies,
            func: Arc::new(func),
        }
    }
}

impl Task for MapTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn transform(&self, _meta: &Meta, inputs: Inputs) -> TransformResult<Data> {
        let upstream = inputs.single(&self.name)?.as_stream()?;
        let func = Arc::clone(&self.func);
        Ok(Data::Stream(upstream.map(move |v| func(v))))
    }
}

/// Lazily keeps the upstream items matching a predicate
pub struct FilterTask {
    name: String,
    dependencies: Vec<Dependency>,
    predicate: Arc<PredicateFn>,
}

impl FilterTask {
    /// Create a filter task named `filter_<dependency>`
    pub fn new<F>(dependency: impl Into<Dependency>, predicate: F) -> Self
    where
        F: Fn(&Value) -> CoreResult<bool> + Send + Sync + 'static,
    {
        let (name, dependencies) = single_dependency("filter", dependency);
        Self {
            name,
            dependencies,
            predicate: Arc::new(predicate),
        }
    }
}

impl Task for FilterTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn transform(&self, _meta: &Meta, inputs: Inputs) -> TransformResult<Data> {
        let upstream = inputs.single(&self.name)?.as_stream()?;
        let predicate = Arc::clone(&self.predicate);
        Ok(Data::Stream(upstream.filter(move |v| predicate(v))))
    }
}

/// Folds the whole upstream sequence into one value
pub struct ReduceTask {
    name: String,
    dependencies: Vec<Dependency>,
    func: Box<FoldFn>,
    initial: Option<Value>,
}

impl ReduceTask {
    /// Create a reduce task named `reduce_<dependency>`.
    ///
    /// Without an initial value the first item seeds the fold.
    pub fn new<F>(dependency: impl Into<Dependency>, func: F) -> Self
    where
        F: Fn(Value, Value) -> CoreResult<Value> + Send + Sync + 'static,
    {
        let (name, dependencies) = single_dependency("reduce", dependency);
        Self {
            name,
            dependencies,
            func: Box::new(func),
            initial: None,
        }
    }

    /// Seed the fold with `initial`
    #[must_use]
    pub fn with_initial(mut self, initial: Value) -> Self {
        self.initial = Some(initial);
        self
    }
}

impl Task for ReduceTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    fn transform(&self, _meta: &Meta, inputs: Inputs) -> TransformResult<Data> {
        let mut items = inputs.single(&self.name)?.as_stream()?.iter();

        let mut acc = match &self.initial {
            Some(initial) => initial.clone(),
            None => match items.next() {
                Some(first) => first?,
                None => {
                    return Err(TaskError::EmptyReduce {
                        task: self.name.clone(),
                    });
                }
            },
        };

        for item in items {
            acc = (self.func)(acc, item?)?;
        }
        Ok(Data::Value(acc))
    }
}
