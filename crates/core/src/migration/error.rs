//! Error types for the migration module.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::types::{CompanyId, FailureKind, MAX_REASON_LEN};

/// Rejection of a whole batch before any invocation is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The identifier list was empty after parsing.
    #[error("At least one company ID must be provided")]
    NoCompanyIds,

    /// An identifier was not an integer.
    #[error("Invalid ID format: '{0}' is not a valid integer")]
    InvalidCompanyId(String),

    /// An identifier was an integer outside the accepted range.
    #[error("ID {value} is out of range ({min}-{max})", min = CompanyId::MIN, max = CompanyId::MAX)]
    CompanyIdOutOfRange { value: i64 },

    /// The acting user is blank or contains control characters.
    #[error("Invalid acting user: {0}")]
    InvalidActingUser(String),

    /// The reason is blank or contains control characters.
    #[error("Invalid reason: {0}")]
    InvalidReason(String),

    /// The reason exceeds the maximum length.
    #[error("Reason is {len} characters long, maximum is {max}", max = MAX_REASON_LEN)]
    ReasonTooLong { len: usize },
}

/// Execution-level failure of a single invocation.
///
/// A nonzero exit status is not an error here; it is reported through
/// [`ProcessOutput`](super::ProcessOutput) and classified by the interpreter.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Migration tool binary not found.
    #[error("Executable not found: {}", .program.display())]
    ToolNotFound { program: PathBuf },

    /// Migration tool exists but cannot be executed.
    #[error("Permission denied executing: {}", .program.display())]
    PermissionDenied { program: PathBuf },

    /// Any other failure to start the process.
    #[error("Failed to start {}: {source}", .program.display())]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O error while collecting output from a running process.
    #[error("I/O error while running migration tool: {0}")]
    Io(#[from] io::Error),

    /// The process did not exit before the deadline and was killed.
    #[error("Migration tool timed out after {:.1} seconds", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },
}

impl RunnerError {
    /// Maps a spawn error onto the matching variant.
    pub fn spawn(program: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::ToolNotFound {
                program: program.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                program: program.to_path_buf(),
            },
            _ => Self::SpawnFailed {
                program: program.to_path_buf(),
                source: err,
            },
        }
    }

    /// Whether the invocation was killed for exceeding its deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// How this failure is labeled on the company outcome.
    pub fn failure_kind(&self) -> FailureKind {
        if self.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::ExecutionFailed
        }
    }
}
