//! Batch coordinator: fans out one tool run per company and assembles the report.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics;

use super::config::{BatchConfig, ToolConfig};
use super::error::ValidationError;
use super::interpreter::OutputInterpreter;
use super::invocation::InvocationBuilder;
use super::runner::{ProcessRunner, TokioProcessRunner};
use super::types::{
    BatchReport, CompanyId, CompanyOutcome, MigrationDirection, MigrationRequest,
};

/// Runs migration batches against the external tool.
///
/// Companies are migrated concurrently, at most `max_concurrency` at a time.
/// A failure or timeout of one company never affects the others, and the
/// report always lists results in request order.
///
/// Tool processes are owned by the future returned from [`run_batch`] /
/// [`execute`]; dropping it kills every process still running.
///
/// [`run_batch`]: BatchCoordinator::run_batch
/// [`execute`]: BatchCoordinator::execute
pub struct BatchCoordinator<R: ProcessRunner> {
    config: BatchConfig,
    builder: InvocationBuilder,
    interpreter: OutputInterpreter,
    runner: Arc<R>,
}

impl BatchCoordinator<TokioProcessRunner> {
    /// Creates a coordinator that spawns real tool processes.
    pub fn with_process_runner(tool: ToolConfig, config: BatchConfig) -> Self {
        let runner = TokioProcessRunner::new(config.timeout());
        Self::new(tool, config, runner)
    }
}

impl<R: ProcessRunner> BatchCoordinator<R> {
    /// Creates a coordinator with a custom runner.
    pub fn new(tool: ToolConfig, config: BatchConfig, runner: R) -> Self {
        Self {
            interpreter: OutputInterpreter::new(config.max_error_len),
            builder: InvocationBuilder::new(tool),
            runner: Arc::new(runner),
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Validates the inputs, applies configured defaults, and runs the batch.
    ///
    /// Only validation problems are returned as errors; every per-company
    /// failure is reported inside the [`BatchReport`].
    pub async fn run_batch(
        &self,
        direction: MigrationDirection,
        company_ids: &[CompanyId],
        acting_user: Option<&str>,
        reason: Option<&str>,
    ) -> Result<BatchReport, ValidationError> {
        let request = self.build_request(direction, company_ids, acting_user, reason)?;
        Ok(self.execute(&request).await)
    }

    /// Builds a request, falling back to configured defaults for blank fields.
    pub fn build_request(
        &self,
        direction: MigrationDirection,
        company_ids: &[CompanyId],
        acting_user: Option<&str>,
        reason: Option<&str>,
    ) -> Result<MigrationRequest, ValidationError> {
        let acting_user = acting_user
            .filter(|u| !u.is_empty())
            .unwrap_or(self.config.default_acting_user.as_str());
        let reason = reason
            .filter(|r| !r.is_empty())
            .unwrap_or(self.config.default_reason.as_str());

        MigrationRequest::new(direction, company_ids.iter().copied())?
            .with_acting_user(acting_user)?
            .with_reason(reason)
    }

    /// Runs every company of an already validated request.
    pub async fn execute(&self, request: &MigrationRequest) -> BatchReport {
        let batch_id = Uuid::new_v4();
        let direction = request.direction();
        let span = info_span!("batch", %batch_id, %direction);

        async move {
            let start = Instant::now();
            let max_concurrency = self.config.max_concurrency.max(1);
            info!(
                companies = request.company_ids().len(),
                max_concurrency,
                acting_user = request.acting_user(),
                "Starting migration batch"
            );
            metrics::BATCHES_TOTAL
                .with_label_values(&[direction.environment()])
                .inc();

            let mut tagged: Vec<(usize, CompanyOutcome)> =
                stream::iter(request.company_ids().iter().copied().enumerate())
                    .map(|(idx, company_id)| async move {
                        (idx, self.migrate_one(company_id, request).await)
                    })
                    .buffer_unordered(max_concurrency)
                    .collect()
                    .await;

            tagged.sort_by_key(|(idx, _)| *idx);
            let outcomes: Vec<CompanyOutcome> =
                tagged.into_iter().map(|(_, outcome)| outcome).collect();

            let report = BatchReport::new(batch_id, direction, outcomes);
            info!(
                total = report.total(),
                successful = report.successful(),
                failed = report.failed(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Migration batch finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Runs and classifies one company. Never fails; errors become outcomes.
    async fn migrate_one(&self, company_id: CompanyId, request: &MigrationRequest) -> CompanyOutcome {
        let invocation = self.builder.build(company_id, request);
        debug!(cpn = %company_id, command = %invocation, "Running migration tool");

        let in_flight = metrics::InFlightGuard::new();
        let start = Instant::now();
        let result = self.runner.run(&invocation).await;
        let elapsed = start.elapsed();
        drop(in_flight);

        let outcome = self.interpreter.interpret(company_id, result);

        let environment = request.direction().environment();
        metrics::INVOCATIONS_TOTAL
            .with_label_values(&[environment, outcome.status().as_str()])
            .inc();
        metrics::INVOCATION_DURATION
            .with_label_values(&[environment])
            .observe(elapsed.as_secs_f64());

        if outcome.is_success() {
            info!(
                cpn = %company_id,
                country_code = outcome.country_code().unwrap_or("-"),
                elapsed_ms = elapsed.as_millis() as u64,
                "Company migrated"
            );
        } else {
            warn!(
                cpn = %company_id,
                status = outcome.status().as_str(),
                kind = outcome.error_kind().map(|k| k.as_str()).unwrap_or("-"),
                infrastructure = outcome.error_kind().is_some_and(|k| k.is_infrastructure()),
                error = outcome.error_message().unwrap_or_default(),
                "Company migration failed"
            );
        }

        outcome
    }
}
