//! Runner: builds the CLI invocation and executes it under a timeout.
//!
//! The subprocess itself sits behind [`CommandExecutor`] so the
//! runner/normalizer pair can be driven without the real tool installed.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, error, info};

use crate::error::{MeasurementError, Result};
use crate::measurement::{MeasurementRequest, MeasurementResult};
use crate::normalize::normalize;

/// Executable looked up on `PATH` when no binary is configured.
pub const DEFAULT_PROGRAM: &str = "speedtest";

/// Flags required for a non-interactive run with machine-readable output.
const FIXED_ARGS: [&str; 4] = [
    "--format=json-pretty",
    "--progress=no",
    "--accept-license",
    "--accept-gdpr",
];

/// Stderr lines kept for the failure message.
const STDERR_TAIL_LINES: usize = 5;

/// Runs a program and returns its stdout.
///
/// Implementations must enforce `timeout` and must not leave the process
/// running once they return.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, program: &str, args: &[String], timeout: Duration) -> Result<Bytes>;
}

/// Production executor backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

#[async_trait]
impl CommandExecutor for TokioExecutor {
    async fn execute(&self, program: &str, args: &[String], timeout: Duration) -> Result<Bytes> {
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MeasurementError::ProcessFailed(format!("failed to start {program}: {e}"))
            })?;

        let stdout = child.stdout.take();
        let mut stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout {
                out.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        });

        let stderr = child.stderr.take();
        let mut stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(err) = stderr {
                let mut lines = BufReader::new(err).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("stderr: {}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail.into_iter().collect::<Vec<_>>().join(" | ")
        });

        // One deadline covers the exit and draining both pipes: a background
        // process can keep stdout open after the direct child has exited.
        let drained = tokio::time::timeout(timeout, async {
            let status = child.wait().await;
            let stdout = (&mut stdout_task).await;
            let stderr_tail = (&mut stderr_task).await.unwrap_or_default();
            (status, stdout, stderr_tail)
        })
        .await;

        let (status, stdout, stderr_tail) = match drained {
            Ok(parts) => parts,
            Err(_) => {
                // Only kill a child that has not exited yet; kill() also reaps it.
                if let Ok(None) = child.try_wait() {
                    if let Err(e) = child.kill().await {
                        error!("failed to kill timed out {}: {}", program, e);
                    }
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(MeasurementError::TimedOut(timeout));
            }
        };

        let status = status.map_err(|e| {
            MeasurementError::ProcessFailed(format!("failed to wait for {program}: {e}"))
        })?;
        let stdout = match stdout {
            Ok(Ok(buf)) => buf,
            Ok(Err(e)) => {
                return Err(MeasurementError::ProcessFailed(format!(
                    "reading stdout failed: {e}"
                )))
            }
            Err(e) => {
                return Err(MeasurementError::ProcessFailed(format!(
                    "stdout reader failed: {e}"
                )))
            }
        };

        if !status.success() {
            let code = status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let detail = if stderr_tail.is_empty() {
                format!("{program} exited with code {code}")
            } else {
                format!("{program} exited with code {code}: {stderr_tail}")
            };
            return Err(MeasurementError::ProcessFailed(detail));
        }

        Ok(Bytes::from(stdout))
    }
}

/// Builds and runs measurements. The exporter calls [`Runner::run`] once per
/// scrape.
#[derive(Clone)]
pub struct Runner {
    executor: Arc<dyn CommandExecutor>,
    program: String,
}

impl Runner {
    pub fn new(executor: Arc<dyn CommandExecutor>, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    /// Runner for the real CLI via `tokio::process`.
    pub fn tokio(program: impl Into<String>) -> Self {
        Self::new(Arc::new(TokioExecutor), program)
    }

    /// Argument list for one invocation.
    pub fn build_args(req: &MeasurementRequest) -> Vec<String> {
        let mut args: Vec<String> = FIXED_ARGS.iter().map(|a| a.to_string()).collect();
        if let Some(id) = req.pinned_server() {
            args.push(format!("--server-id={id}"));
        }
        args
    }

    /// Execute the CLI and return its raw stdout.
    pub async fn execute(&self, req: &MeasurementRequest) -> Result<Bytes> {
        info!("running a new measurement");

        let args = Self::build_args(req);
        let timeout = req.timeout();
        debug!(
            program = %self.program,
            ?args,
            timeout_secs = timeout.as_secs(),
            "invoking speedtest CLI"
        );

        match self.executor.execute(&self.program, &args, timeout).await {
            Ok(raw) => Ok(raw),
            Err(e) => {
                error!(kind = e.kind().as_str(), "{e}");
                Err(e)
            }
        }
    }

    /// Execute and normalize. Never fails; see [`MeasurementResult::failed`].
    pub async fn run(&self, req: &MeasurementRequest) -> MeasurementResult {
        match self.execute(req).await {
            Ok(raw) => normalize(&raw),
            Err(_) => MeasurementResult::failed(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use std::sync::Mutex;

    use super::*;
    use crate::error::ErrorKind;

    type Call = (String, Vec<String>, Duration);

    /// Records invocations and replays a fixed outcome.
    struct Scripted {
        calls: Mutex<Vec<Call>>,
        outcome: fn() -> Result<Bytes>,
    }

    impl Scripted {
        fn new(outcome: fn() -> Result<Bytes>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                outcome,
            })
        }
    }

    #[async_trait]
    impl CommandExecutor for Scripted {
        async fn execute(
            &self,
            program: &str,
            args: &[String],
            timeout: Duration,
        ) -> Result<Bytes> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.to_vec(), timeout));
            (self.outcome)()
        }
    }

    #[test]
    fn args_without_server_pin() {
        let args = Runner::build_args(&MeasurementRequest::default());
        assert_eq!(
            args,
            ["--format=json-pretty", "--progress=no", "--accept-license", "--accept-gdpr"]
        );
    }

    #[test]
    fn args_with_server_pin() {
        let req = MeasurementRequest::new(Some("1234".into()), 90);
        let args = Runner::build_args(&req);
        assert_eq!(args.last().map(String::as_str), Some("--server-id=1234"));
        assert_eq!(args.len(), 5);
    }

    #[tokio::test]
    async fn execute_passes_program_args_and_timeout() {
        let exec = Scripted::new(|| Ok(Bytes::from_static(b"{}")));
        let runner = Runner::new(exec.clone(), "/opt/speedtest");
        let req = MeasurementRequest::new(Some("42".into()), 15);

        let raw = runner.execute(&req).await.unwrap();
        assert_eq!(&raw[..], b"{}");

        let calls = exec.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (program, args, timeout) = &calls[0];
        assert_eq!(program, "/opt/speedtest");
        assert!(args.contains(&"--server-id=42".to_string()));
        assert_eq!(*timeout, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn execution_errors_are_returned_unchanged() {
        let exec = Scripted::new(|| Err(MeasurementError::TimedOut(Duration::from_secs(1))));
        let runner = Runner::new(exec, DEFAULT_PROGRAM);
        let err = runner.execute(&MeasurementRequest::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn run_maps_process_failure_to_sentinel() {
        let exec = Scripted::new(|| Err(MeasurementError::ProcessFailed("exit 2".into())));
        let runner = Runner::new(exec, DEFAULT_PROGRAM);
        assert_eq!(
            runner.run(&MeasurementRequest::default()).await,
            MeasurementResult::failed()
        );
    }
}
