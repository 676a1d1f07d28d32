//! End-to-end tests driving the `stem` binary.

use serde_json::{Value, json};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Output, Stdio};

const STEM: &str = env!("CARGO_BIN_EXE_stem");

fn stem(args: &[&str]) -> Output {
    Command::new(STEM)
        .args(args)
        .output()
        .expect("failed to launch stem")
}

fn stdout_json(output: &Output) -> Value {
    let text = String::from_utf8_lossy(&output.stdout);
    let last = text.lines().last().unwrap_or_default();
    serde_json::from_str(last).unwrap_or_else(|e| panic!("bad JSON {last:?}: {e}"))
}

/// A long-running `stem` server, killed on drop
struct Server {
    child: Child,
    address: String,
}

impl Server {
    fn start(args: &[&str]) -> Self {
        let mut child = Command::new(STEM)
            .args(args)
            .args(["--bind", "127.0.0.1:0"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to launch stem");
        let stdout = child.stdout.take().expect("no stdout");
        let mut address = String::new();
        BufReader::new(stdout)
            .read_line(&mut address)
            .expect("server did not announce its address");
        Self {
            child,
            address: address.trim().to_string(),
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn test_int_scale_under_every_engine() {
    for engine in ["sequential", "thread-pool", "task-group", "process-pool"] {
        let output = stem(&["run", "int_scale", "--engine", engine, "--processes", "2"]);
        assert!(output.status.success(), "{engine}: {}", String::from_utf8_lossy(&output.stderr));
        assert_eq!(
            stdout_json(&output),
            json!([0, 10, 20, 30, 40, 50, 60, 70, 80, 90]),
            "engine {engine}"
        );
    }
}

#[test]
fn test_process_pool_nested_reduce_with_meta() {
    let output = stem(&[
        "run",
        "Sub.reduce",
        "--engine",
        "process-pool",
        "--meta",
        r#"{"int_scale": {"int_range": {"stop": 4}}}"#,
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output), json!(60));
}

#[test]
fn test_process_pool_with_one_host_runs_wide_levels() {
    let output = stem(&["run", "Sub.reduce", "--engine", "process-pool", "--processes", "1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output), json!(450));
}

#[test]
fn test_missing_task_reports_dependency_error() {
    let output = stem(&["run", "ghost"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DEPENDENCY_ERROR"));
}

#[test]
fn test_cluster_end_to_end() {
    let light = Server::start(&["unit", "--capacity", "1"]);
    let heavy = Server::start(&["unit", "--capacity", "2", "--engine", "thread-pool"]);
    let mut distributor = Server::start(&[
        "distributor",
        "--worker",
        &format!("{}=1", light.address),
        "--worker",
        &format!("{}=2", heavy.address),
    ]);

    let output = stem(&["send", "--to", &light.address, "powerfullity"]);
    assert_eq!(stdout_json(&output)["powerfullity"], json!(1));

    let output = stem(&["send", "--to", &distributor.address, "powerfullity"]);
    assert_eq!(stdout_json(&output)["powerfullity"], json!(3));

    for _ in 0..4 {
        let output = stem(&["send", "--to", &distributor.address, "run", "--task", "Sub.reduce"]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        assert_eq!(stdout_json(&output), json!(450));
    }

    let output = stem(&["send", "--to", &distributor.address, "structure"]);
    assert_eq!(stdout_json(&output)["workspaces"][0]["tasks"], json!(["reduce"]));

    let output = stem(&["send", "--to", &distributor.address, "dance"]);
    assert!(!output.status.success());

    let output = stem(&["send", "--to", &distributor.address, "stop"]);
    assert!(output.status.success());
    assert!(distributor.child.wait().expect("distributor vanished").success());
}
