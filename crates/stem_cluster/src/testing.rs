//! Namespace served by the network tests.

use serde_json::{Value, json};
use std::sync::Arc;
use stem_core::{CoreResult, Data, DataStream, Meta};
use stem_plan::{FunctionDataTask, FunctionTask, Namespace, ReduceTask, TaskError};

fn add(a: Value, b: Value) -> CoreResult<Value> {
    Ok(json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0)))
}

/// `int_range`, `data_scale`, `int_scale`, `broken` and `Sub.reduce`
pub(crate) fn namespace() -> Namespace {
    let sub = Namespace::builder("Sub")
        .task_as("reduce", Arc::new(ReduceTask::new("int_scale", add)))
        .build();

    Namespace::builder("IntNamespace")
        .task(FunctionDataTask::new("int_range", |meta: &Meta| {
            let stop = meta.get_or("stop", json!(10)).as_i64().unwrap_or(10);
            Ok(Data::from(DataStream::from_fn(move || (0..stop).map(|i| json!(i)))))
        }))
        .task(FunctionDataTask::new("data_scale", |_| Ok(Data::from(json!(10)))))
        .task(FunctionTask::new("int_scale", ["int_range", "data_scale"], |_, inputs| {
            let scale = inputs.value("data_scale")?.as_i64().unwrap_or(1);
            let range = inputs.stream("int_range")?;
            Ok(Data::from(range.map(move |v| Ok(json!(v.as_i64().unwrap_or(0) * scale)))))
        }))
        .task(FunctionDataTask::new("broken", |_| Err(TaskError::failed("broken on purpose"))))
        .namespace(sub)
        .build()
}

pub(crate) fn int_scale_expected() -> Value {
    json!([0, 10, 20, 30, 40, 50, 60, 70, 80, 90])
}
