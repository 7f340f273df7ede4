use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::migration::{BatchConfig, ToolConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub tool: ToolConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Config for a standalone tool binary with default batch settings.
    pub fn new(tool: ToolConfig) -> Self {
        Self {
            tool,
            batch: BatchConfig::default(),
        }
    }

    /// Returns a copy safe to log (environment values hidden).
    pub fn sanitized(&self) -> SanitizedConfig {
        SanitizedConfig {
            tool: SanitizedToolConfig {
                program: self.tool.program.clone(),
                args: self.tool.args.clone(),
                working_dir: self.tool.working_dir.clone(),
                env_keys: self.tool.env.keys().cloned().collect(),
            },
            batch: self.batch.clone(),
        }
    }
}

/// Sanitized config for logs (tool environment values redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub tool: SanitizedToolConfig,
    pub batch: BatchConfig,
}

/// Tool config with only the names of its environment variables
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedToolConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    pub env_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_hides_env_values() {
        let config = Config::new(
            ToolConfig::new("/app/infinitools").with_env("DB_PASSWORD", "hunter2"),
        );
        let sanitized = config.sanitized();
        assert_eq!(sanitized.tool.env_keys, vec!["DB_PASSWORD".to_string()]);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(json.contains("DB_PASSWORD"));
        assert!(!json.contains("hunter2"));
    }
}
