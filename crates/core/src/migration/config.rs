//! Configuration for the migration module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use super::types::{DEFAULT_ACTING_USER, DEFAULT_REASON};

/// Where and how to start the external migration tool.
///
/// A compiled binary only needs `program`. A development checkout driven
/// through `go run` uses `program = "go"`, `args = ["run", "main.go"]` and
/// points `working_dir` at the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Executable to run.
    pub program: PathBuf,

    /// Arguments placed before the subcommand.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory of the child process.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables for the child process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ToolConfig {
    /// Creates a config for a standalone executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Sets the arguments placed before the subcommand.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Tunables of the batch coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of tool processes running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout for a single invocation in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum length of a stored error message, in characters.
    #[serde(default = "default_max_error_len")]
    pub max_error_len: usize,

    /// Acting user when the caller does not give one.
    #[serde(default = "default_acting_user")]
    pub default_acting_user: String,

    /// Reason when the caller does not give one.
    #[serde(default = "default_reason")]
    pub default_reason: String,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_timeout() -> u64 {
    60
}

fn default_max_error_len() -> usize {
    4000
}

fn default_acting_user() -> String {
    DEFAULT_ACTING_USER.to_string()
}

fn default_reason() -> String {
    DEFAULT_REASON.to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_timeout(),
            max_error_len: default_max_error_len(),
            default_acting_user: default_acting_user(),
            default_reason: default_reason(),
        }
    }
}

impl BatchConfig {
    /// Sets the maximum concurrency.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the maximum stored error length.
    pub fn with_max_error_len(mut self, max_error_len: usize) -> Self {
        self.max_error_len = max_error_len;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_batch_config() {
        let config = BatchConfig::default();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.max_error_len, 4000);
        assert_eq!(config.default_acting_user, "github-actions");
        assert_eq!(config.default_reason, "Automated deployment");
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::default()
            .with_max_concurrency(8)
            .with_timeout(120)
            .with_max_error_len(500);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_error_len, 500);
    }

    #[test]
    fn test_tool_config_builder() {
        let tool = ToolConfig::new("go")
            .with_args(["run", "main.go"])
            .with_working_dir("../infinitools")
            .with_env("ENV", "dev");
        assert_eq!(tool.program, PathBuf::from("go"));
        assert_eq!(tool.args, vec!["run".to_string(), "main.go".to_string()]);
        assert_eq!(tool.working_dir, Some(PathBuf::from("../infinitools")));
        assert_eq!(tool.env.get("ENV").map(String::as_str), Some("dev"));
    }

    #[test]
    fn test_tool_config_deserialize_minimal() {
        let tool: ToolConfig = toml::from_str(r#"program = "/app/infinitools""#).unwrap();
        assert_eq!(tool.program, PathBuf::from("/app/infinitools"));
        assert!(tool.args.is_empty());
        assert!(tool.working_dir.is_none());
        assert!(tool.env.is_empty());
    }
}
