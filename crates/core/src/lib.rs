pub mod config;
pub mod metrics;
pub mod migration;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use migration::{
    parse_company_ids, BatchConfig, BatchCoordinator, BatchReport, CompanyId, CompanyOutcome,
    FailureKind, MigrationDirection, MigrationRequest, ProcessRunner, RunnerError,
    TokioProcessRunner, ToolConfig, ValidationError,
};
