//! Execution of tool invocations as child processes.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::error::RunnerError;
use super::invocation::Invocation;

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Runs invocations of the migration tool.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Runs one invocation to completion.
    ///
    /// Only failures to start the process and timeouts are errors; a nonzero
    /// exit status is returned as a normal [`ProcessOutput`].
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, RunnerError>;
}

/// Runner backed by `tokio::process`.
///
/// On unix every tool run gets its own process group. Timeouts and dropped
/// runs kill the whole group, so helpers the tool started (e.g. the binary
/// built by `go run`) do not outlive it.
pub struct TokioProcessRunner {
    timeout: Duration,
}

impl TokioProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Kills the process group of one tool run when dropped, unless disarmed.
struct ProcessGroup {
    pgid: Option<u32>,
    armed: bool,
}

impl ProcessGroup {
    fn new(pgid: Option<u32>) -> Self {
        Self { pgid, armed: true }
    }

    #[cfg(unix)]
    fn kill(&self) {
        let Some(pgid) = self.pgid.and_then(|id| libc::pid_t::try_from(id).ok()) else {
            return;
        };
        // SAFETY: killpg only sends a signal to the group created for this run
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                warn!(pgid, error = %err, "Failed to kill migration tool process group");
            }
        }
    }

    #[cfg(not(unix))]
    fn kill(&self) {}

    /// The group is gone; a later kill could hit a reused id.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.armed {
            self.kill();
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    fn name(&self) -> &str {
        "tokio"
    }

    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, RunnerError> {
        let start = Instant::now();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        if let Some(ref dir) = invocation.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|e| RunnerError::spawn(&invocation.program, e))?;
        let mut group = ProcessGroup::new(child.id());

        debug!(
            cpn = %invocation.company_id,
            pid = child.id(),
            "Spawned migration tool"
        );

        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

        let result = timeout(self.timeout, async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let exited = async {
                let status = child.wait().await;
                // Leftover background processes would hold the pipes open
                group.kill();
                status
            };
            let (stdout_read, stderr_read, status) = tokio::join!(
                stdout_pipe.read_to_end(&mut stdout),
                stderr_pipe.read_to_end(&mut stderr),
                exited,
            );
            stdout_read?;
            stderr_read?;
            Ok::<_, std::io::Error>((status?, stdout, stderr))
        })
        .await;

        match result {
            Ok(Ok((status, stdout, stderr))) => {
                group.disarm();
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    success: status.success(),
                    stdout: String::from_utf8_lossy(&stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    duration: start.elapsed(),
                })
            }
            Ok(Err(e)) => {
                group.kill();
                let _ = child.kill().await;
                group.disarm();
                Err(RunnerError::Io(e))
            }
            Err(_) => {
                group.kill();
                // kill() also waits, so the child is reaped here
                if let Err(e) = child.kill().await {
                    warn!(cpn = %invocation.company_id, error = %e, "Failed to kill timed out migration tool");
                }
                group.disarm();
                Err(RunnerError::Timeout {
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::migration::types::CompanyId;
    use std::path::PathBuf;

    fn shell(script: &str) -> Invocation {
        Invocation {
            company_id: CompanyId::new(1).unwrap(),
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: None,
            env: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let runner = TokioProcessRunner::new(Duration::from_secs(10));
        let output = runner.run(&shell("echo hello; echo oops >&2")).await.unwrap();
        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let runner = TokioProcessRunner::new(Duration::from_secs(10));
        let output = runner.run(&shell("echo denied >&2; exit 3")).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stderr, "denied\n");
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let runner = TokioProcessRunner::new(Duration::from_secs(10));
        let mut invocation = shell("true");
        invocation.program = PathBuf::from("/nonexistent/migration-tool");
        let err = runner.run(&invocation).await.unwrap_err();
        assert!(matches!(err, RunnerError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = TokioProcessRunner::new(Duration::from_millis(200));
        let start = Instant::now();
        let err = runner.run(&shell("sleep 30")).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_background_child_does_not_hold_output_open() {
        let runner = TokioProcessRunner::new(Duration::from_secs(5));
        let start = Instant::now();
        let output = runner
            .run(&shell("sleep 30 & echo done"))
            .await
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "done\n");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_passes_env_and_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TokioProcessRunner::new(Duration::from_secs(10));
        let mut invocation = shell("echo \"$MIGRATOR_TEST_VAR\"; pwd");
        invocation.env = vec![("MIGRATOR_TEST_VAR".to_string(), "value".to_string())];
        invocation.working_dir = Some(dir.path().to_path_buf());

        let output = runner.run(&invocation).await.unwrap();
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("value"));
        let pwd = PathBuf::from(lines.next().unwrap());
        assert_eq!(
            pwd.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }
}
