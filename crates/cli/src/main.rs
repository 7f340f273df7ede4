mod cli;
mod metrics;

use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use migrator_core::{
    load_config, parse_company_ids, validate_config, BatchCoordinator, BatchReport,
};

use cli::{LogFormat, Options};

/// Some companies failed and `--strict` was given.
const EXIT_FAILURES: u8 = 2;

/// Interrupted by Ctrl+C or SIGTERM (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

/// Report printed to stdout.
#[derive(Serialize)]
struct ReportEnvelope<'a> {
    message: String,
    #[serde(flatten)]
    report: &'a BatchReport,
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::new().get_matches();

    // No subscriber exists yet, so this error goes straight to stderr
    let options = match Options::from_matches(&matches) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Fatal error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(options.log_format);

    match run(options).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the report, logs go to stderr
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

async fn run(options: Options) -> Result<ExitCode> {
    // Load configuration
    info!("Loading configuration from {:?}", options.config);
    let config = load_config(&options.config)
        .with_context(|| format!("Failed to load config from {:?}", options.config))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;
    debug!(
        config = %serde_json::to_string(&config.sanitized()).unwrap_or_default(),
        "Configuration loaded"
    );

    let company_ids = parse_company_ids(&options.ids).context("Invalid company id list")?;

    let coordinator = BatchCoordinator::with_process_runner(config.tool, config.batch);

    // Dropping the batch future kills every tool process still running
    let result = tokio::select! {
        result = coordinator.run_batch(
            options.direction,
            &company_ids,
            options.acting_user.as_deref(),
            options.reason.as_deref(),
        ) => Some(result),
        _ = shutdown_signal() => None,
    };

    if let Some(ref path) = options.metrics_file {
        if let Err(e) = metrics::write_textfile(path) {
            warn!("{:#}", e);
        }
    }

    let Some(result) = result else {
        warn!("Interrupted, running migrations were stopped");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    };
    let report = result.context("Invalid migration request")?;
    info!(
        batch_id = %report.batch_id(),
        successful = report.successful(),
        failed = report.failed(),
        "{}",
        report.message()
    );

    let envelope = ReportEnvelope {
        message: report.message(),
        report: &report,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&envelope).context("Failed to serialize report")?
    );

    if options.strict && report.has_failures() {
        return Ok(ExitCode::from(EXIT_FAILURES));
    }
    Ok(ExitCode::SUCCESS)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
