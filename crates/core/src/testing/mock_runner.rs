//! Mock process runner for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::migration::{CompanyId, Invocation, ProcessOutput, ProcessRunner, RunnerError};

#[derive(Debug, Clone)]
enum Behavior {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    Hang,
    SpawnFailure,
}

/// Scripted behavior of the mock tool for one company.
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    behavior: Behavior,
    delay: Duration,
}

impl ScriptedRun {
    /// Exits with status 0 printing `stdout`.
    pub fn succeed(stdout: impl Into<String>) -> Self {
        Self::exit(0, stdout, "")
    }

    /// Exits with `code` printing `stderr`.
    pub fn reject(code: i32, stderr: impl Into<String>) -> Self {
        Self::exit(code, "", stderr)
    }

    /// Exits with arbitrary status and output.
    pub fn exit(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            behavior: Behavior::Exit {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            },
            delay: Duration::ZERO,
        }
    }

    /// Never exits; the runner reports a timeout once its deadline passes.
    pub fn hang() -> Self {
        Self {
            behavior: Behavior::Hang,
            delay: Duration::ZERO,
        }
    }

    /// Fails as if the executable were missing.
    pub fn spawn_failure() -> Self {
        Self {
            behavior: Behavior::SpawnFailure,
            delay: Duration::ZERO,
        }
    }

    /// Delays completion by `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Mock implementation of the ProcessRunner trait.
///
/// Provides controllable behavior for testing:
/// - Script each company's run (success, rejection, hang, spawn failure)
/// - Record invocations for assertions
/// - Track completion order and peak concurrency
///
/// Unscripted companies succeed with `"OK\n"`.
#[derive(Debug)]
pub struct MockRunner {
    scripts: HashMap<u32, ScriptedRun>,
    default_run: ScriptedRun,
    timeout: Duration,
    recorded: Arc<RwLock<Vec<Invocation>>>,
    completed: Arc<RwLock<Vec<CompanyId>>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            default_run: ScriptedRun::succeed("OK\n"),
            timeout: Duration::from_secs(60),
            recorded: Arc::new(RwLock::new(Vec::new())),
            completed: Arc::new(RwLock::new(Vec::new())),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Scripts the run for one company.
    pub fn script(mut self, company_id: u32, run: ScriptedRun) -> Self {
        self.scripts.insert(company_id, run);
        self
    }

    /// Sets the run used for unscripted companies.
    pub fn with_default(mut self, run: ScriptedRun) -> Self {
        self.default_run = run;
        self
    }

    /// Sets the simulated per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get all recorded invocations, in start order.
    pub async fn recorded(&self) -> Vec<Invocation> {
        self.recorded.read().await.clone()
    }

    /// Get the number of invocations started.
    pub async fn call_count(&self) -> usize {
        self.recorded.read().await.len()
    }

    /// Companies in the order their runs finished.
    pub async fn completion_order(&self) -> Vec<CompanyId> {
        self.completed.read().await.clone()
    }

    /// Highest number of runs observed at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate(&self, invocation: &Invocation) -> Result<ProcessOutput, RunnerError> {
        let run = self
            .scripts
            .get(&invocation.company_id.get())
            .unwrap_or(&self.default_run);

        match &run.behavior {
            Behavior::SpawnFailure => {
                tokio::time::sleep(run.delay).await;
                Err(RunnerError::ToolNotFound {
                    program: invocation.program.clone(),
                })
            }
            Behavior::Hang => {
                tokio::time::sleep(self.timeout).await;
                Err(RunnerError::Timeout {
                    timeout: self.timeout,
                })
            }
            Behavior::Exit { .. } if run.delay > self.timeout => {
                tokio::time::sleep(self.timeout).await;
                Err(RunnerError::Timeout {
                    timeout: self.timeout,
                })
            }
            Behavior::Exit {
                code,
                stdout,
                stderr,
            } => {
                tokio::time::sleep(run.delay).await;
                Ok(ProcessOutput {
                    exit_code: Some(*code),
                    success: *code == 0,
                    stdout: stdout.clone(),
                    stderr: stderr.clone(),
                    duration: run.delay,
                })
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, RunnerError> {
        self.recorded.write().await.push(invocation.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.simulate(invocation).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.write().await.push(invocation.company_id);
        result
    }
}
