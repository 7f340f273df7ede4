use anyhow::{anyhow, Result};
use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ArgAction, ArgMatches, ColorChoice, Command,
};
use std::path::PathBuf;
use std::str::FromStr;

use migrator_core::MigrationDirection;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("invalid log format: {}", other)),
        }
    }
}

/// Everything a single `migrator` run needs.
#[derive(Debug, Clone)]
pub struct Options {
    pub config: PathBuf,
    pub log_format: LogFormat,
    pub metrics_file: Option<PathBuf>,
    pub direction: MigrationDirection,
    pub ids: String,
    pub acting_user: Option<String>,
    pub reason: Option<String>,
    pub strict: bool,
}

impl Options {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| anyhow!("missing subcommand"))?;
        let direction = MigrationDirection::from_str(name).map_err(|e| anyhow!(e))?;

        let config = sub
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("config.toml"));
        let log_format = sub
            .get_one::<String>("log-format")
            .map(|s| s.parse::<LogFormat>())
            .transpose()
            .map_err(|e| anyhow!(e))?
            .unwrap_or(LogFormat::Pretty);

        Ok(Self {
            config,
            log_format,
            metrics_file: sub.get_one::<PathBuf>("metrics-file").cloned(),
            direction,
            ids: sub.get_one::<String>("ids").cloned().unwrap_or_default(),
            acting_user: sub.get_one::<String>("acting-user").cloned(),
            reason: sub.get_one::<String>("reason").cloned(),
            strict: sub.get_flag("strict"),
        })
    }
}

fn batch_command(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("ids")
                .short('i')
                .long("ids")
                .help("Comma-separated company ids, example: 123,456,789")
                .required(true),
        )
        .arg(
            Arg::new("acting-user")
                .short('u')
                .long("acting-user")
                .help("User recorded as the author of the migration")
                .env("MIGRATOR_ACTING_USER"),
        )
        .arg(
            Arg::new("reason")
                .short('r')
                .long("reason")
                .help("Why the companies are being moved (max 100 characters)")
                .env("MIGRATOR_REASON"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .help("Exit with status 2 when any company fails")
                .action(ArgAction::SetTrue),
        )
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("migrator")
        .about("Move companies between the master and beta environments")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to the configuration file")
                .env("MIGRATOR_CONFIG")
                .default_value("config.toml")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .help("Log output format")
                .env("MIGRATOR_LOG_FORMAT")
                .default_value("pretty")
                .global(true)
                .value_parser(["pretty", "json"]),
        )
        .arg(
            Arg::new("metrics-file")
                .long("metrics-file")
                .help("Write Prometheus metrics to this file after the batch")
                .env("MIGRATOR_METRICS_FILE")
                .global(true)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand(batch_command(
            "to-beta",
            "Move companies from master to beta",
        ))
        .subcommand(batch_command(
            "to-master",
            "Move companies from beta back to master",
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "migrator");
        assert_eq!(
            command.get_version().unwrap().to_string(),
            env!("CARGO_PKG_VERSION")
        );
        command.debug_assert();
    }

    #[test]
    fn test_to_beta_options() {
        let matches = new().get_matches_from(vec![
            "migrator",
            "to-beta",
            "--ids",
            "123,456",
            "--acting-user",
            "octocat",
            "--strict",
        ]);
        let options = Options::from_matches(&matches).unwrap();

        assert_eq!(options.direction, MigrationDirection::ToBeta);
        assert_eq!(options.ids, "123,456");
        assert_eq!(options.acting_user.as_deref(), Some("octocat"));
        assert!(options.strict);
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let matches = new().get_matches_from(vec![
            "migrator",
            "to-master",
            "-i",
            "7",
            "--config",
            "/etc/migrator.toml",
            "--log-format",
            "json",
            "--metrics-file",
            "/tmp/migrator.prom",
        ]);
        let options = Options::from_matches(&matches).unwrap();

        assert_eq!(options.direction, MigrationDirection::ToMaster);
        assert_eq!(options.config, PathBuf::from("/etc/migrator.toml"));
        assert_eq!(options.log_format, LogFormat::Json);
        assert_eq!(
            options.metrics_file,
            Some(PathBuf::from("/tmp/migrator.prom"))
        );
        assert!(!options.strict);
    }

    #[test]
    fn test_matches_without_subcommand_are_rejected() {
        let matches = Command::new("migrator").get_matches_from(vec!["migrator"]);
        let err = Options::from_matches(&matches).unwrap_err();
        assert!(err.to_string().contains("missing subcommand"));
    }

    #[test]
    fn test_ids_required() {
        let result = new().try_get_matches_from(vec!["migrator", "to-beta"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let result = new().try_get_matches_from(vec![
            "migrator",
            "--log-format",
            "xml",
            "to-beta",
            "--ids",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
