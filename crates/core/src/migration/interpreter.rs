//! Classification of tool runs into company outcomes.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::warn;

use super::error::RunnerError;
use super::runner::ProcessOutput;
use super::types::{CompanyId, CompanyOutcome, FailureKind};

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap());

static COUNTRY_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Pa[ií]s:\s*([A-Z]{2})").unwrap());

const COUNTRY_LABELS: [&str; 2] = ["País:", "Pais:"];

const TRUNCATION_MARKER: &str = " [truncated]";

/// Removes ANSI escape sequences (colors, cursor movement) from tool output.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Finds the country code in the tool's success text.
///
/// Only the first line carrying the country label is considered. The output
/// format is not versioned, so a miss is expected to happen occasionally.
pub fn extract_country_code(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|line| {
        COUNTRY_LABELS
            .iter()
            .any(|label| line.starts_with(label))
    })?;

    COUNTRY_CODE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Truncates to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Turns runner results into [`CompanyOutcome`]s.
#[derive(Debug, Clone)]
pub struct OutputInterpreter {
    max_error_len: usize,
}

impl OutputInterpreter {
    pub fn new(max_error_len: usize) -> Self {
        Self { max_error_len }
    }

    /// Classifies one runner result. Every input yields exactly one outcome.
    pub fn interpret(
        &self,
        company_id: CompanyId,
        result: Result<ProcessOutput, RunnerError>,
    ) -> CompanyOutcome {
        match result {
            Ok(output) if output.success => self.succeeded(company_id, output),
            Ok(output) => self.rejected(company_id, output),
            Err(e) => CompanyOutcome::failed(
                company_id,
                e.failure_kind(),
                truncate(&e.to_string(), self.max_error_len),
            ),
        }
    }

    fn succeeded(&self, company_id: CompanyId, output: ProcessOutput) -> CompanyOutcome {
        let text = strip_ansi(&output.stdout);
        let country_code = extract_country_code(&text);
        if country_code.is_none() {
            warn!(cpn = %company_id, "No country code found in migration tool output");
            crate::metrics::COUNTRY_CODE_MISSING.inc();
        }

        CompanyOutcome::succeeded(company_id, text, country_code)
            .with_exit_code(output.exit_code)
            .with_duration(output.duration)
    }

    fn rejected(&self, company_id: CompanyId, output: ProcessOutput) -> CompanyOutcome {
        let stderr = strip_ansi(&output.stderr);
        let stdout = strip_ansi(&output.stdout);
        let message = if !stderr.trim().is_empty() {
            stderr.trim().to_string()
        } else if !stdout.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            match output.exit_code {
                Some(code) => format!("Migration tool exited with status {}", code),
                None => "Migration tool was terminated by a signal".to_string(),
            }
        };

        CompanyOutcome::failed(
            company_id,
            FailureKind::ToolRejected,
            truncate(&message, self.max_error_len),
        )
        .with_exit_code(output.exit_code)
        .with_duration(output.duration)
    }
}
