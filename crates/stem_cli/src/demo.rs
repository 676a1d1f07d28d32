//! Built-in namespace served by `unit`, `run` and `task-host`.

use serde_json::{Value, json};
use std::sync::Arc;
use stem_core::{CoreResult, Data, DataStream, Meta};
use stem_plan::{FunctionDataTask, FunctionTask, Namespace, ReduceTask, TaskError};

fn add(a: Value, b: Value) -> CoreResult<Value> {
    Ok(json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0)))
}

fn int_range(meta: &Meta) -> Data {
    let start = meta.get_or("start", json!(0)).as_i64().unwrap_or(0);
    let stop = meta.get_or("stop", json!(10)).as_i64().unwrap_or(10);
    let step = usize::try_from(meta.get_or("step", json!(1)).as_u64().unwrap_or(1))
        .unwrap_or(1)
        .max(1);
    Data::from(DataStream::from_fn(move || {
        (start..stop).step_by(step).map(|i| json!(i))
    }))
}

/// `IntNamespace` with `int_range`, `data_scale`, `int_scale` and
/// `Sub.reduce`
pub fn namespace() -> Namespace {
    let sub = Namespace::builder("Sub")
        .task_as("reduce", Arc::new(ReduceTask::new("int_scale", add)))
        .build();

    Namespace::builder("IntNamespace")
        .task(FunctionDataTask::new("int_range", |meta: &Meta| Ok(int_range(meta))))
        .task(FunctionDataTask::new("data_scale", |meta: &Meta| {
            Ok(Data::from(meta.get_or("scale", json!(10))))
        }))
        .task(FunctionTask::new(
            "int_scale",
            ["int_range", "data_scale"],
            |_, inputs| {
                let scale = inputs
                    .value("data_scale")?
                    .as_i64()
                    .ok_or_else(|| TaskError::failed("data_scale is not an integer"))?;
                let range = inputs.stream("int_range")?;
                Ok(Data::from(
                    range.map(move |v| Ok(json!(v.as_i64().unwrap_or(0) * scale))),
                ))
            },
        ))
        .namespace(sub)
        .build()
}
