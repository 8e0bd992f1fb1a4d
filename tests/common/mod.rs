//! Shared integration-test harness for spawning `akashic` as a child
//! process and reading its JSONL event stream.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Default timeout for reading a single event.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pace that squeezes the stock narrative into roughly a tenth of a second.
pub const FAST_PACE: &str = "0.01";

/// A running `akashic run --format json` process.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
pub struct AkashicProcess {
    child: Child,
    stdin: Option<tokio::process::ChildStdin>,
    reader: BufReader<tokio::process::ChildStdout>,
}

impl AkashicProcess {
    /// Spawns `akashic run --format json --pace 0.01` plus `extra` args.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_run(extra: &[&str]) -> Self {
        let bin = env!("CARGO_BIN_EXE_akashic");
        let mut child = Command::new(bin)
            .args(["--quiet", "run", "--format", "json", "--pace", FAST_PACE])
            .args(extra)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn akashic");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");

        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        }
    }

    /// Reads one JSONL event, or `None` at EOF.
    #[allow(clippy::missing_panics_doc)]
    pub async fn next_event(&mut self, timeout: Duration) -> Option<Value> {
        let mut line = String::new();
        tokio::time::timeout(timeout, async {
            loop {
                line.clear();
                let n = self.reader.read_line(&mut line).await.expect("read_line I/O error");
                if n == 0 {
                    return None;
                }
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    return Some(
                        serde_json::from_str::<Value>(trimmed)
                            .unwrap_or_else(|e| panic!("invalid JSON from akashic: {e}\nline: {line}")),
                    );
                }
            }
        })
        .await
        .expect("timed out waiting for an event")
    }

    /// Reads events until one of type `kind` arrives and returns it.
    #[allow(clippy::missing_panics_doc)]
    pub async fn wait_for(&mut self, kind: &str) -> Value {
        loop {
            let event = self
                .next_event(DEFAULT_TIMEOUT)
                .await
                .unwrap_or_else(|| panic!("EOF before a {kind} event"));
            if event["type"] == kind {
                return event;
            }
        }
    }

    /// Reads every remaining event until EOF.
    pub async fn drain(&mut self) -> Vec<Value> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event(DEFAULT_TIMEOUT).await {
            events.push(event);
        }
        events
    }

    /// Writes one line to the child's stdin.
    #[allow(clippy::missing_panics_doc)]
    pub async fn write_line(&mut self, text: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin.write_all(format!("{text}\n").as_bytes()).await.expect("write to stdin");
        stdin.flush().await.expect("flush stdin");
    }

    /// Closes the child's stdin.
    pub fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Waits for the process to exit and returns its exit code.
    #[allow(clippy::missing_panics_doc)]
    pub async fn wait(mut self) -> i32 {
        let status = tokio::time::timeout(DEFAULT_TIMEOUT, self.child.wait())
            .await
            .expect("timed out waiting for exit")
            .expect("wait failed");
        status.code().unwrap_or(-1)
    }

    /// Runs `akashic` with `args` to completion and returns its output.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> std::process::Output {
        std::process::Command::new(env!("CARGO_BIN_EXE_akashic"))
            .args(args)
            .stdin(std::process::Stdio::null())
            .output()
            .expect("failed to run akashic")
    }
}
