//! Shared fixtures for engine tests.

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use stem_core::{CoreResult, Data, DataStream, Meta};
use stem_plan::{
    FunctionDataTask, FunctionTask, Namespace, ReduceTask, TaskError, TaskNode,
};

use crate::engine::Engine;

fn add(a: Value, b: Value) -> CoreResult<Value> {
    Ok(json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0)))
}

pub(crate) fn int_range() -> FunctionDataTask {
    FunctionDataTask::new("int_range", |meta: &Meta| {
        let start = meta.get_or("start", json!(0)).as_i64().unwrap_or(0);
        let stop = meta.get_or("stop", json!(10)).as_i64().unwrap_or(10);
        let step = meta.get_or("step", json!(1)).as_u64().unwrap_or(1).max(1) as usize;
        Ok(Data::from(DataStream::from_fn(move || {
            (start..stop).step_by(step).map(|i| json!(i))
        })))
    })
}

pub(crate) fn int_scale() -> FunctionTask {
    FunctionTask::new("int_scale", ["int_range", "data_scale"], |_, inputs| {
        let scale = inputs
            .value("data_scale")?
            .as_i64()
            .ok_or_else(|| TaskError::failed("data_scale is not an integer"))?;
        let range = inputs.stream("int_range")?;
        Ok(Data::from(
            range.map(move |v| Ok(json!(v.as_i64().unwrap_or(0) * scale))),
        ))
    })
}

/// `int_range`, `data_scale`, `int_scale`, `needs_ghost` and `Sub.reduce`
pub(crate) fn namespace() -> Namespace {
    let sub = Namespace::builder("Sub")
        .task_as("reduce", Arc::new(ReduceTask::new("int_scale", add)))
        .build();

    Namespace::builder("IntNamespace")
        .task(int_range())
        .task(FunctionDataTask::new("data_scale", |_| {
            Ok(Data::from(json!(10)))
        }))
        .task(int_scale())
        .task(FunctionTask::new("needs_ghost", ["ghost"], |_, _| {
            Ok(Data::from(json!(null)))
        }))
        .namespace(sub)
        .build()
}

/// `top` depends on `ok` and `broken`; the counter tracks `top` calls
pub(crate) fn failing_namespace() -> (Namespace, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let ns = Namespace::builder("Failing")
        .task(FunctionDataTask::new("ok", |_| Ok(Data::from(json!(1)))))
        .task(FunctionDataTask::new("broken", |_| {
            Err(TaskError::failed("broken on purpose"))
        }))
        .task(FunctionTask::new("top", ["ok", "broken"], move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Data::from(json!(0)))
        }))
        .build();
    (ns, calls)
}

pub(crate) fn resolve(ns: &Namespace, path: &str) -> TaskNode {
    TaskNode::resolve_path(path, ns)
        .unwrap()
        .unwrap_or_else(|| panic!("no task {path}"))
}

pub(crate) fn run_int_scale(engine: &dyn Engine) -> Value {
    let ns = namespace();
    let tree = resolve(&ns, "int_scale");
    engine.run(&Meta::new(), &tree).unwrap().into_value().unwrap()
}

pub(crate) fn int_scale_expected() -> Value {
    json!([0, 10, 20, 30, 40, 50, 60, 70, 80, 90])
}
