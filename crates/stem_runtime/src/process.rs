//! Process-pool engine and the task host loop it drives.
//!
//! The parent walks the tree on a rayon pool with one thread per process and
//! sends every transform to a free child process as an `invoke` envelope:
//!
//! ```text
//! meta:    {"command": "invoke", "task": <path>, "task_meta": <meta>}
//! payload: {"<dependency name>": <value>, ...}
//! ```
//!
//! `<path>` is the dot-qualified path the node was resolved under. The child
//! looks it up in its own copy of the namespace, runs the task and
//! answers with `{"status": "fulfilled"}` plus the JSON value, or
//! `{"status": "failed", "error": ...}`. Values cross the boundary as JSON,
//! so streams are materialized on both sides.

use crate::engine::{Engine, collect_inputs, ensure_resolved};
use crate::error::{EngineError, EngineResult};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use stem_core::{CoreError, Data, Meta};
use stem_envelope::{Envelope, EnvelopeError, EnvelopeInput};
use stem_plan::{Inputs, TaskError, TaskLookup, TaskNode};
use tracing::{debug, info, warn};

/// Command name understood by task hosts
pub const INVOKE: &str = "invoke";

/// How to start task host processes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessPoolConfig {
    /// Executable to launch
    pub program: PathBuf,
    /// Arguments that put it into host mode
    pub args: Vec<String>,
    /// Number of processes
    pub processes: usize,
}

impl Default for ProcessPoolConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("stem"),
            args: vec!["task-host".to_string()],
            processes: thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

impl ProcessPoolConfig {
    /// Create a config for `program` with default arguments
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Set host-mode arguments
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set process count (minimum 1)
    #[must_use]
    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes.max(1);
        self
    }
}

struct Host {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Host {
    fn spawn(config: &ProcessPoolConfig) -> EngineResult<Self> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Host("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Host("stdout not captured".to_string()))?;

        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn invoke(&mut self, request: &Envelope) -> EngineResult<Envelope> {
        request.write_to(&mut self.stdin)?;
        Ok(Envelope::read(&mut self.stdout)?)
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        // The child may already be gone; nothing useful to do on failure.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

struct PoolState {
    idle: Vec<Host>,
    live: usize,
}

struct HostPool {
    state: Mutex<PoolState>,
    available: Condvar,
}

impl HostPool {
    fn spawn(config: &ProcessPoolConfig) -> EngineResult<Self> {
        let idle = (0..config.processes.max(1))
            .map(|_| Host::spawn(config))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self {
            state: Mutex::new(PoolState {
                live: idle.len(),
                idle,
            }),
            available: Condvar::new(),
        })
    }

    fn checkout(&self) -> EngineResult<Host> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(host) = state.idle.pop() {
                return Ok(host);
            }
            if state.live == 0 {
                return Err(EngineError::NoHosts);
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Return a host, or `None` to retire a broken one
    fn checkin(&self, host: Option<Host>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match host {
            Some(host) => state.idle.push(host),
            None => state.live -= 1,
        }
        self.available.notify_all();
    }
}

/// Runs every transform in a pool of child processes.
///
/// Processes are started for each run and stopped when it ends. Every node
/// in the tree must carry the path it was resolved under (see
/// [`TaskNode::resolve_path`]) and the host must serve the same namespace.
#[derive(Debug, Clone)]
pub struct ProcessPoolEngine {
    config: ProcessPoolConfig,
}

impl ProcessPoolEngine {
    /// Create an engine
    #[must_use]
    pub fn new(config: ProcessPoolConfig) -> Self {
        Self { config }
    }

    /// Host process settings
    #[must_use]
    pub fn config(&self) -> &ProcessPoolConfig {
        &self.config
    }

    fn run_node(&self, hosts: &HostPool, meta: &Meta, node: &TaskNode) -> EngineResult<Data> {
        let results: Vec<EngineResult<Data>> = node
            .dependencies()
            .par_iter()
            .map(|child| self.run_node(hosts, &meta.child(child.name()), child))
            .collect();
        let inputs = collect_inputs(node, results)?;
        invoke_remote(hosts, node, meta, inputs)
    }
}

impl Engine for ProcessPoolEngine {
    fn name(&self) -> &'static str {
        "process-pool"
    }

    fn run(&self, meta: &Meta, node: &TaskNode) -> EngineResult<Data> {
        ensure_resolved(node)?;
        ensure_addressable(node)?;
        let processes = self.config.processes.max(1);
        let callers = ThreadPoolBuilder::new()
            .num_threads(processes)
            .thread_name(|i| format!("stem-host-caller-{i}"))
            .build()?;
        let hosts = HostPool::spawn(&self.config)?;
        info!(
            processes,
            program = %self.config.program.display(),
            "task hosts started"
        );
        callers.install(|| self.run_node(&hosts, meta, node))
    }
}

/// Reject trees with nodes a task host could not look up
///
/// # Errors
///
/// Returns `Unaddressable` for the first node without a lookup path
pub fn ensure_addressable(node: &TaskNode) -> EngineResult<()> {
    if node.path().is_none() {
        return Err(EngineError::Unaddressable {
            task: node.name().to_string(),
        });
    }
    node.dependencies().iter().try_for_each(ensure_addressable)
}

fn invoke_request(node: &TaskNode, meta: &Meta, inputs: Inputs) -> EngineResult<Envelope> {
    let path = node.path().ok_or_else(|| EngineError::Unaddressable {
        task: node.name().to_string(),
    })?;
    let mut payload = Map::new();
    for (name, data) in inputs {
        payload.insert(name, data.into_value()?);
    }
    let payload = serde_json::to_vec(&Value::Object(payload)).map_err(CoreError::from)?;
    Ok(Envelope::new(json!({
        "command": INVOKE,
        "task": path,
        "task_meta": meta.to_value(),
    }))
    .with_payload(payload))
}

fn invoke_remote(pool: &HostPool, node: &TaskNode, meta: &Meta, inputs: Inputs) -> EngineResult<Data> {
    let request = invoke_request(node, meta, inputs)?;

    let mut host = pool.checkout()?;
    let response = match host.invoke(&request) {
        Ok(response) => {
            pool.checkin(Some(host));
            response
        }
        Err(e) => {
            warn!(task = node.name(), error = %e, "task host failed, retiring it");
            pool.checkin(None);
            return Err(e);
        }
    };

    if response.get("status").and_then(Value::as_str) == Some("fulfilled") {
        Ok(Data::Value(response.payload_json()?))
    } else {
        let error = response
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("task host reported failure");
        Err(EngineError::task(node.name(), TaskError::failed(error)))
    }
}

/// Serve `invoke` requests until `input` is exhausted
///
/// # Errors
///
/// Returns error on a framing violation or broken output
pub fn serve<R, W>(lookup: &dyn TaskLookup, input: &mut R, output: &mut W) -> EngineResult<()>
where
    R: EnvelopeInput,
    W: Write,
{
    loop {
        let request = match Envelope::read(input) {
            Ok(request) => request,
            Err(EnvelopeError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("task host input closed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let response = match invoke_local(lookup, &request) {
            Ok(value) => match serde_json::to_vec(&value) {
                Ok(bytes) => Envelope::new(json!({"status": "fulfilled"})).with_payload(bytes),
                Err(e) => failed(&e.to_string()),
            },
            Err(e) => failed(&e.to_string()),
        };
        response.write_to(output)?;
    }
}

/// Serve `invoke` requests over this process's stdin and stdout
///
/// # Errors
///
/// See [`serve`]
pub fn serve_stdio(lookup: &dyn TaskLookup) -> EngineResult<()> {
    let mut input = BufReader::new(io::stdin().lock());
    let mut output = io::stdout().lock();
    serve(lookup, &mut input, &mut output)
}

fn failed(error: &str) -> Envelope {
    Envelope::new(json!({"status": "failed", "error": error}))
}

fn invoke_local(lookup: &dyn TaskLookup, request: &Envelope) -> EngineResult<Value> {
    let command = request.get("command").and_then(Value::as_str).unwrap_or("");
    if command != INVOKE {
        return Err(EngineError::Host(format!("unknown command '{command}'")));
    }
    let path = request
        .get("task")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Host("request has no task path".to_string()))?;
    let task = lookup.find(path).ok_or_else(|| {
        EngineError::task(path, TaskError::failed("task not found in task host"))
    })?;

    let meta = Meta::from_value(request.get("task_meta").cloned().unwrap_or(Value::Null))?;
    let inputs: Inputs = match request.payload_json()? {
        Value::Object(map) => map.into_iter().map(|(k, v)| (k, Data::Value(v))).collect(),
        Value::Null => Inputs::new(),
        other => {
            return Err(EngineError::Host(format!(
                "inputs must be an object, got {other}"
            )));
        }
    };

    debug!(task = path, inputs = inputs.len(), "invoking task");
    let data = task
        .transform(&meta, inputs)
        .map_err(|e| EngineError::task(path, e))?;
    Ok(data.into_value()?)
}
