use super::{types::Config, ConfigError};
use crate::migration::{validate_acting_user, validate_reason};

/// Upper bound for `batch.max_concurrency`.
pub const MAX_CONCURRENCY_LIMIT: usize = 64;

/// Validate configuration
/// Currently validates:
/// - Tool section exists (enforced by serde)
/// - Tool program is not empty
/// - Batch limits are within range
/// - Default acting user and reason would pass request validation
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.tool.program.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "tool.program cannot be empty".to_string(),
        ));
    }

    let batch = &config.batch;
    if batch.max_concurrency == 0 || batch.max_concurrency > MAX_CONCURRENCY_LIMIT {
        return Err(ConfigError::ValidationError(format!(
            "batch.max_concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY_LIMIT, batch.max_concurrency
        )));
    }

    if batch.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "batch.timeout_secs cannot be 0".to_string(),
        ));
    }

    if batch.max_error_len == 0 {
        return Err(ConfigError::ValidationError(
            "batch.max_error_len cannot be 0".to_string(),
        ));
    }

    validate_acting_user(&batch.default_acting_user).map_err(|e| {
        ConfigError::ValidationError(format!("batch.default_acting_user: {}", e))
    })?;
    validate_reason(&batch.default_reason)
        .map_err(|e| ConfigError::ValidationError(format!("batch.default_reason: {}", e)))?;

    Ok(())
}
