//! Types for the migration module.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::error::ValidationError;

/// Acting user recorded by the tool when the caller does not name one.
pub const DEFAULT_ACTING_USER: &str = "github-actions";

/// Reason recorded by the tool when the caller does not give one.
pub const DEFAULT_REASON: &str = "Automated deployment";

/// Maximum length of the reason string, in characters.
pub const MAX_REASON_LEN: usize = 100;

/// Target environment of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationDirection {
    #[serde(rename = "beta")]
    ToBeta,
    #[serde(rename = "master")]
    ToMaster,
}

impl MigrationDirection {
    /// Subcommand understood by the migration tool.
    pub fn subcommand(&self) -> &'static str {
        match self {
            Self::ToBeta => "tobeta",
            Self::ToMaster => "tomaster",
        }
    }

    /// Name of the destination environment.
    pub fn environment(&self) -> &'static str {
        match self {
            Self::ToBeta => "beta",
            Self::ToMaster => "master",
        }
    }
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.environment())
    }
}

impl FromStr for MigrationDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beta" | "tobeta" | "to-beta" | "to_beta" => Ok(Self::ToBeta),
            "master" | "tomaster" | "to-master" | "to_master" => Ok(Self::ToMaster),
            other => Err(format!("unknown migration direction: {}", other)),
        }
    }
}

/// Company identifier (CPN), always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CompanyId(u32);

impl CompanyId {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 999_999;

    /// Creates an identifier, rejecting values outside the accepted range.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value < i64::from(Self::MIN) || value > i64::from(Self::MAX) {
            return Err(ValidationError::CompanyIdOutOfRange { value });
        }
        Ok(Self(value as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CompanyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompanyId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value = trimmed
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidCompanyId(trimmed.to_string()))?;
        Self::new(value)
    }
}

/// Parses a comma-separated identifier list such as `"123, 456,789"`.
///
/// Blank entries are skipped. Duplicates are kept here; they are removed when
/// the list becomes a [`MigrationRequest`].
pub fn parse_company_ids(input: &str) -> Result<Vec<CompanyId>, ValidationError> {
    let ids = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(CompanyId::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if ids.is_empty() {
        return Err(ValidationError::NoCompanyIds);
    }
    Ok(ids)
}

/// A validated batch of migrations, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    direction: MigrationDirection,
    company_ids: Vec<CompanyId>,
    acting_user: String,
    reason: String,
}

impl MigrationRequest {
    /// Creates a request with the default acting user and reason.
    ///
    /// Duplicate identifiers are dropped, keeping the first occurrence.
    pub fn new(
        direction: MigrationDirection,
        company_ids: impl IntoIterator<Item = CompanyId>,
    ) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        let company_ids: Vec<CompanyId> = company_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        if company_ids.is_empty() {
            return Err(ValidationError::NoCompanyIds);
        }

        Ok(Self {
            direction,
            company_ids,
            acting_user: DEFAULT_ACTING_USER.to_string(),
            reason: DEFAULT_REASON.to_string(),
        })
    }

    /// Sets the acting user recorded by the tool.
    pub fn with_acting_user(mut self, acting_user: impl Into<String>) -> Result<Self, ValidationError> {
        let acting_user = acting_user.into();
        validate_acting_user(&acting_user)?;
        self.acting_user = acting_user;
        Ok(self)
    }

    /// Sets the reason recorded by the tool.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Result<Self, ValidationError> {
        let reason = reason.into();
        validate_reason(&reason)?;
        self.reason = reason;
        Ok(self)
    }

    pub fn direction(&self) -> MigrationDirection {
        self.direction
    }

    pub fn company_ids(&self) -> &[CompanyId] {
        &self.company_ids
    }

    pub fn acting_user(&self) -> &str {
        &self.acting_user
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Checks a value that ends up as a single argv entry of the tool.
fn validate_free_text(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("must not be blank".to_string());
    }
    if let Some(c) = value.chars().find(|c| c.is_control()) {
        return Err(format!("contains control character {:?}", c));
    }
    Ok(())
}

pub(crate) fn validate_acting_user(acting_user: &str) -> Result<(), ValidationError> {
    validate_free_text(acting_user).map_err(ValidationError::InvalidActingUser)
}

pub(crate) fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    validate_free_text(reason).map_err(ValidationError::InvalidReason)?;
    let len = reason.chars().count();
    if len > MAX_REASON_LEN {
        return Err(ValidationError::ReasonTooLong { len });
    }
    Ok(())
}

/// Why an invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The tool ran and exited with a nonzero status.
    ToolRejected,
    /// The tool did not finish in time and was killed.
    Timeout,
    /// The tool could not be started or its output could not be collected.
    ExecutionFailed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolRejected => "tool_rejected",
            Self::Timeout => "timeout",
            Self::ExecutionFailed => "execution_failed",
        }
    }

    /// Whether the failure comes from infrastructure rather than the tool's own decision.
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, Self::ToolRejected)
    }
}

/// Terminal state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationStatus {
    Succeeded,
    Failed,
    TimedOut,
}

impl InvocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Classified result of migrating one company.
///
/// Exactly one of `output` and `error` is set, matching `success`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyOutcome {
    #[serde(rename = "cpn")]
    company_id: CompanyId,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    duration_ms: u64,
}

impl CompanyOutcome {
    /// Outcome of a migration the tool reported as done.
    pub fn succeeded(
        company_id: CompanyId,
        output: impl Into<String>,
        country_code: Option<String>,
    ) -> Self {
        Self {
            company_id,
            success: true,
            country_code,
            output: Some(output.into()),
            error_message: None,
            error_kind: None,
            exit_code: None,
            duration_ms: 0,
        }
    }

    /// Outcome of a migration that did not happen.
    pub fn failed(company_id: CompanyId, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            company_id,
            success: false,
            country_code: None,
            output: None,
            error_message: Some(message.into()),
            error_kind: Some(kind),
            exit_code: None,
            duration_ms: 0,
        }
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_kind(&self) -> Option<FailureKind> {
        self.error_kind
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn status(&self) -> InvocationStatus {
        match (self.success, self.error_kind) {
            (true, _) => InvocationStatus::Succeeded,
            (false, Some(FailureKind::Timeout)) => InvocationStatus::TimedOut,
            (false, _) => InvocationStatus::Failed,
        }
    }
}

/// Aggregate result of one batch, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    batch_id: Uuid,
    direction: MigrationDirection,
    total: usize,
    successful: usize,
    failed: usize,
    results: Vec<CompanyOutcome>,
}

impl BatchReport {
    /// Builds the report from outcomes already in input order.
    pub fn new(batch_id: Uuid, direction: MigrationDirection, results: Vec<CompanyOutcome>) -> Self {
        let successful = results.iter().filter(|o| o.is_success()).count();
        Self {
            batch_id,
            direction,
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }

    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    pub fn direction(&self) -> MigrationDirection {
        self.direction
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn results(&self) -> &[CompanyOutcome] {
        &self.results
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Looks up the outcome for one company.
    pub fn outcome(&self, company_id: CompanyId) -> Option<&CompanyOutcome> {
        self.results.iter().find(|o| o.company_id == company_id)
    }

    /// Human summary, e.g. "Processed 3 company(ies) to beta environment".
    pub fn message(&self) -> String {
        format!(
            "Processed {} company(ies) to {} environment",
            self.total,
            self.direction.environment()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpn(value: i64) -> CompanyId {
        CompanyId::new(value).unwrap()
    }

    #[test]
    fn test_direction_tokens() {
        assert_eq!(MigrationDirection::ToBeta.subcommand(), "tobeta");
        assert_eq!(MigrationDirection::ToMaster.subcommand(), "tomaster");
        assert_eq!(MigrationDirection::ToBeta.to_string(), "beta");
        assert_eq!(
            "to-master".parse::<MigrationDirection>().unwrap(),
            MigrationDirection::ToMaster
        );
        assert!("staging".parse::<MigrationDirection>().is_err());
    }

    #[test]
    fn test_direction_serialization() {
        let json = serde_json::to_string(&MigrationDirection::ToMaster).unwrap();
        assert_eq!(json, "\"master\"");
    }

    #[test]
    fn test_company_id_range() {
        assert!(CompanyId::new(1).is_ok());
        assert!(CompanyId::new(999_999).is_ok());
        assert_eq!(
            CompanyId::new(0),
            Err(ValidationError::CompanyIdOutOfRange { value: 0 })
        );
        assert_eq!(
            CompanyId::new(1_000_000),
            Err(ValidationError::CompanyIdOutOfRange { value: 1_000_000 })
        );
    }

    #[test]
    fn test_company_id_parse() {
        assert_eq!(" 42 ".parse::<CompanyId>().unwrap().get(), 42);
        assert_eq!(
            "abc".parse::<CompanyId>(),
            Err(ValidationError::InvalidCompanyId("abc".to_string()))
        );
        assert_eq!(
            "-5".parse::<CompanyId>(),
            Err(ValidationError::CompanyIdOutOfRange { value: -5 })
        );
    }

    #[test]
    fn test_parse_company_ids() {
        let ids = parse_company_ids("123, 456,,789 ,").unwrap();
        assert_eq!(ids, vec![cpn(123), cpn(456), cpn(789)]);
    }

    #[test]
    fn test_parse_company_ids_empty() {
        assert_eq!(parse_company_ids(""), Err(ValidationError::NoCompanyIds));
        assert_eq!(parse_company_ids(" , ,"), Err(ValidationError::NoCompanyIds));
    }

    #[test]
    fn test_parse_company_ids_invalid_entry() {
        let err = parse_company_ids("123,12x,456").unwrap_err();
        assert_eq!(err, ValidationError::InvalidCompanyId("12x".to_string()));
    }

    #[test]
    fn test_request_deduplicates_in_order() {
        let ids = parse_company_ids("456,123,456,123,789").unwrap();
        let request = MigrationRequest::new(MigrationDirection::ToBeta, ids).unwrap();
        assert_eq!(request.company_ids(), &[cpn(456), cpn(123), cpn(789)]);
        assert_eq!(request.acting_user(), DEFAULT_ACTING_USER);
        assert_eq!(request.reason(), DEFAULT_REASON);
    }

    #[test]
    fn test_request_rejects_empty() {
        let result = MigrationRequest::new(MigrationDirection::ToBeta, Vec::new());
        assert_eq!(result, Err(ValidationError::NoCompanyIds));
    }

    #[test]
    fn test_request_overrides() {
        let request = MigrationRequest::new(MigrationDirection::ToMaster, [cpn(1)])
            .unwrap()
            .with_acting_user("octocat")
            .unwrap()
            .with_reason("Rollback after incident")
            .unwrap();
        assert_eq!(request.acting_user(), "octocat");
        assert_eq!(request.reason(), "Rollback after incident");
    }

    #[test]
    fn test_request_rejects_control_characters() {
        let request = MigrationRequest::new(MigrationDirection::ToBeta, [cpn(1)]).unwrap();
        assert!(matches!(
            request.clone().with_acting_user("bob\n--dest=master"),
            Err(ValidationError::InvalidActingUser(_))
        ));
        assert!(matches!(
            request.clone().with_reason("bad\0reason"),
            Err(ValidationError::InvalidReason(_))
        ));
        assert!(matches!(
            request.with_reason("   "),
            Err(ValidationError::InvalidReason(_))
        ));
    }

    #[test]
    fn test_request_rejects_long_reason() {
        let request = MigrationRequest::new(MigrationDirection::ToBeta, [cpn(1)]).unwrap();
        let reason = "x".repeat(MAX_REASON_LEN + 1);
        assert_eq!(
            request.with_reason(reason),
            Err(ValidationError::ReasonTooLong {
                len: MAX_REASON_LEN + 1
            })
        );
    }

    #[test]
    fn test_outcome_exclusive_fields() {
        let ok = CompanyOutcome::succeeded(cpn(1), "done", Some("CL".to_string()));
        assert!(ok.output().is_some());
        assert!(ok.error_message().is_none());
        assert_eq!(ok.status(), InvocationStatus::Succeeded);

        let failed = CompanyOutcome::failed(cpn(2), FailureKind::Timeout, "timed out");
        assert!(failed.output().is_none());
        assert!(failed.country_code().is_none());
        assert_eq!(failed.error_message(), Some("timed out"));
        assert_eq!(failed.status(), InvocationStatus::TimedOut);

        let rejected = CompanyOutcome::failed(cpn(3), FailureKind::ToolRejected, "no");
        assert_eq!(rejected.status(), InvocationStatus::Failed);
    }

    #[test]
    fn test_outcome_serialization() {
        let ok = CompanyOutcome::succeeded(cpn(123), "done", Some("CL".to_string()))
            .with_exit_code(Some(0))
            .with_duration(Duration::from_millis(1500));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["cpn"], 123);
        assert_eq!(json["success"], true);
        assert_eq!(json["country_code"], "CL");
        assert_eq!(json["output"], "done");
        assert_eq!(json["duration_ms"], 1500);
        assert!(json.get("error").is_none());

        let failed = CompanyOutcome::failed(cpn(789), FailureKind::ToolRejected, "denied");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "denied");
        assert_eq!(json["error_kind"], "tool_rejected");
        assert!(json.get("output").is_none());
        assert!(json.get("country_code").is_none());
    }

    #[test]
    fn test_report_counts() {
        let report = BatchReport::new(
            Uuid::new_v4(),
            MigrationDirection::ToBeta,
            vec![
                CompanyOutcome::succeeded(cpn(123), "ok", Some("CL".to_string())),
                CompanyOutcome::succeeded(cpn(456), "ok", Some("AR".to_string())),
                CompanyOutcome::failed(cpn(789), FailureKind::ToolRejected, "boom"),
            ],
        );
        assert_eq!(report.total(), 3);
        assert_eq!(report.successful(), 2);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
        assert_eq!(report.message(), "Processed 3 company(ies) to beta environment");
        assert_eq!(report.outcome(cpn(456)).unwrap().country_code(), Some("AR"));
        assert!(report.outcome(cpn(1)).is_none());
    }

    #[test]
    fn test_failure_kind_infrastructure() {
        assert!(!FailureKind::ToolRejected.is_infrastructure());
        assert!(FailureKind::Timeout.is_infrastructure());
        assert!(FailureKind::ExecutionFailed.is_infrastructure());
    }
}
