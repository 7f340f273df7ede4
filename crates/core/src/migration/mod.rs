//! Migration module for moving companies between environments.
//!
//! This module drives the external migration tool once per company and turns
//! the runs into a single [`BatchReport`].
//!
//! # Components
//!
//! - [`InvocationBuilder`] - builds the argv for one company
//! - [`ProcessRunner`] / [`TokioProcessRunner`] - runs the tool with a timeout
//! - [`OutputInterpreter`] - classifies a run and extracts the country code
//! - [`BatchCoordinator`] - bounded fan-out, ordering and aggregation
//!
//! # Example
//!
//! ```ignore
//! use migrator_core::migration::{
//!     parse_company_ids, BatchConfig, BatchCoordinator, MigrationDirection, ToolConfig,
//! };
//!
//! let coordinator = BatchCoordinator::with_process_runner(
//!     ToolConfig::new("/app/infinitools"),
//!     BatchConfig::default(),
//! );
//!
//! let ids = parse_company_ids("123,456,789")?;
//! let report = coordinator
//!     .run_batch(MigrationDirection::ToBeta, &ids, Some("octocat"), None)
//!     .await?;
//!
//! println!("{}: {} ok, {} failed", report.message(), report.successful(), report.failed());
//! ```

mod config;
mod coordinator;
mod error;
mod interpreter;
mod invocation;
mod runner;
mod types;

pub use config::{BatchConfig, ToolConfig};
pub use coordinator::BatchCoordinator;
pub use error::{RunnerError, ValidationError};
pub use interpreter::{extract_country_code, strip_ansi, truncate, OutputInterpreter};
pub use invocation::{Invocation, InvocationBuilder};
pub use runner::{ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use types::{
    parse_company_ids, BatchReport, CompanyId, CompanyOutcome, FailureKind, InvocationStatus,
    MigrationDirection, MigrationRequest, DEFAULT_ACTING_USER, DEFAULT_REASON, MAX_REASON_LEN,
};

pub(crate) use types::{validate_acting_user, validate_reason};
