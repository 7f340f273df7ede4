//! Testing utilities for code that drives the migration tool.
//!
//! [`MockRunner`] stands in for the external tool: each company id can be
//! scripted to succeed, be rejected, hang past the timeout, or fail to start.
//!
//! # Example
//!
//! ```rust,ignore
//! use migrator_core::testing::{MockRunner, ScriptedRun};
//!
//! let runner = MockRunner::new()
//!     .script(123, ScriptedRun::succeed("País: CL\n"))
//!     .script(789, ScriptedRun::reject(1, "company is locked"));
//!
//! let coordinator = BatchCoordinator::new(tool, BatchConfig::default(), runner);
//! ```

mod mock_runner;

pub use mock_runner::{MockRunner, ScriptedRun};
