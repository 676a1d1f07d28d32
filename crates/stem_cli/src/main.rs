//! STEM CLI
//!
//! Runs tasks from the built-in namespace locally, serves them as a worker
//! unit, fronts several units with a distributor, and sends single requests
//! to either.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod demo;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use stem_cluster::{
    ClusterConfig, Command, DistributorConfig, Distributor, RemoteClient, Response, WorkerConfig,
    WorkerEntry, WorkerUnit,
};
use stem_core::Meta;
use stem_runtime::{EngineConfig, EngineKind, Orchestrator, ProcessPoolConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stem")]
#[command(about = "STEM - task graphs, envelope protocol and distributed dispatch", long_about = None)]
struct Cli {
    /// Log level for stem crates, overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task locally and print its value as JSON
    Run {
        /// Dot-qualified task path
        task: String,
        /// Meta as a JSON object
        #[arg(short, long)]
        meta: Option<String>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Serve the built-in namespace as a worker unit
    Unit {
        /// Listen address
        #[arg(short, long)]
        bind: Option<String>,
        /// Capacity weight
        #[arg(short, long)]
        capacity: Option<u32>,
        /// JSON config file
        #[arg(long)]
        config: Option<String>,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Spread requests over worker units by capacity
    Distributor {
        /// Listen address
        #[arg(short, long)]
        bind: Option<String>,
        /// JSON config file
        #[arg(long)]
        config: Option<String>,
        /// Worker as `address=capacity`, repeatable
        #[arg(short, long = "worker")]
        workers: Vec<String>,
    },
    /// Send one command and print the response
    Send {
        /// Unit or distributor address
        #[arg(long)]
        to: String,
        /// run, structure, powerfullity or stop
        command: String,
        /// Task path for `run`
        #[arg(long)]
        task: Option<String>,
        /// Task meta for `run`, as a JSON object
        #[arg(long)]
        meta: Option<String>,
    },
    /// Serve process-pool invocations over stdin and stdout
    TaskHost,
}

#[derive(Args)]
struct EngineArgs {
    /// sequential, thread-pool, process-pool or task-group
    #[arg(short, long, default_value_t = EngineKind::Sequential)]
    engine: EngineKind,
    /// Threads for the thread-pool engine
    #[arg(long)]
    threads: Option<usize>,
    /// Host processes for the process-pool engine
    #[arg(long)]
    processes: Option<usize>,
}

impl EngineArgs {
    fn orchestrator(&self) -> Result<Orchestrator> {
        let mut process = ProcessPoolConfig::new(std::env::current_exe()?).with_args(["task-host"]);
        if let Some(processes) = self.processes {
            process = process.with_processes(processes);
        }
        let mut config = EngineConfig::new(self.engine).with_process(process);
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        Ok(Orchestrator::new(config.build()?))
    }
}

fn init_tracing(level: Option<&str>, json: bool) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(format!("stem={level}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stem=info")),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn parse_meta(meta: Option<&str>) -> Result<Value> {
    match meta {
        Some(text) => serde_json::from_str(text).context("meta is not valid JSON"),
        None => Ok(Value::Null),
    }
}

/// Print the bound address so callers that asked for port 0 can find it
fn announce(listener: &TcpListener) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", listener.local_addr()?)?;
    stdout.flush()?;
    Ok(())
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted");
            token.cancel();
        }
    });
}

fn run(task: &str, meta: Option<&str>, engine: &EngineArgs) -> Result<()> {
    let meta = Meta::from_value(parse_meta(meta)?)?;
    let namespace = demo::namespace();
    let result = engine.orchestrator()?.execute_path(&meta, task, &namespace);
    if !result.is_ok() {
        bail!("{}: {}", result.status(), result.error().unwrap_or_default());
    }
    println!("{}", result.data()?);
    Ok(())
}

async fn unit(
    bind: Option<String>,
    capacity: Option<u32>,
    config: Option<String>,
    engine: &EngineArgs,
) -> Result<()> {
    let mut worker = match config {
        Some(path) => ClusterConfig::from_file(path)?.worker,
        None => WorkerConfig::default(),
    };
    if let Some(bind) = bind {
        worker.bind = bind;
    }
    if let Some(capacity) = capacity {
        worker = worker.with_capacity(capacity);
    }

    let listener = TcpListener::bind(&worker.bind)
        .await
        .with_context(|| format!("cannot listen on {}", worker.bind))?;
    announce(&listener)?;

    let unit = WorkerUnit::new(Arc::new(demo::namespace()), worker.capacity)
        .with_orchestrator(engine.orchestrator()?);
    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());
    Arc::new(unit).serve(listener, shutdown).await?;
    Ok(())
}

async fn distributor(bind: Option<String>, config: Option<String>, workers: &[String]) -> Result<()> {
    let mut settings = match config {
        Some(path) => ClusterConfig::from_file(path)?.distributor,
        None => DistributorConfig::default(),
    };
    if let Some(bind) = bind {
        settings.bind = bind;
    }
    for entry in workers {
        settings = settings.with_worker(WorkerEntry::parse(entry)?);
    }
    if settings.workers.is_empty() {
        bail!("no workers configured");
    }

    let listener = TcpListener::bind(&settings.bind)
        .await
        .with_context(|| format!("cannot listen on {}", settings.bind))?;
    announce(&listener)?;

    let distributor = Arc::new(Distributor::from_config(&settings)?);
    cancel_on_ctrl_c(distributor.shutdown_token());
    distributor.serve(listener).await?;
    Ok(())
}

async fn send(to: String, command: &str, task: Option<String>, meta: Option<&str>) -> Result<()> {
    let command = match command {
        "run" => Command::Run {
            task_path: task.context("run needs --task")?,
            task_meta: parse_meta(meta)?,
        },
        "structure" => Command::Structure,
        "powerfullity" => Command::Powerfullity,
        "stop" => Command::Stop,
        other => Command::Unknown(other.to_string()),
    };
    let client = RemoteClient::new(to);

    if command == Command::Stop {
        // The distributor closes the connection without answering.
        let _ = client.send(&command).await;
        println!("stop sent to {}", client.address());
        return Ok(());
    }

    let response = client.send(&command).await?;
    println!("{}", response.meta);
    if !Response::is_fulfilled(&response) {
        bail!("request failed");
    }
    if !response.payload.is_empty() {
        println!("{}", response.payload_json()?);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_json)?;

    match cli.command {
        Commands::Run { task, meta, engine } => run(&task, meta.as_deref(), &engine),
        Commands::TaskHost => {
            stem_runtime::serve_stdio(&demo::namespace())?;
            Ok(())
        }
        Commands::Unit {
            bind,
            capacity,
            config,
            engine,
        } => tokio::runtime::Runtime::new()?.block_on(unit(bind, capacity, config, &engine)),
        Commands::Distributor {
            bind,
            config,
            workers,
        } => tokio::runtime::Runtime::new()?.block_on(distributor(bind, config, &workers)),
        Commands::Send {
            to,
            command,
            task,
            meta,
        } => tokio::runtime::Runtime::new()?.block_on(send(to, &command, task, meta.as_deref())),
    }
}
