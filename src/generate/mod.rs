//! Generation orchestration
//!
//! Plans one work unit per scope, asks the suggestion source for each unit
//! on a bounded worker pool, validates what comes back and merges the
//! results in unit order:
//!
//! ```text
//! DomainModel ──► plan_units ──► [unit 0] [unit 1] ... [unit n]
//!                                   │        │            │
//!                             Semaphore(workers) + JoinSet, retry/backoff
//!                                   │        │            │
//!                                   └──── merge by unit index ────► TestCase[]
//! ```
//!
//! Output order never depends on completion order: ids are assigned while
//! merging, so the same inputs and answers give the same ids.

pub mod bundle;
pub mod candidate;

pub use bundle::{fuse_context, plan_units, ContextBundle, RunContext, WorkUnit};
pub use candidate::{case_fingerprint, validate_candidate, Origin, UnitScope};

use crate::config::{GeneratorConfig, RetryPolicy};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result, SuggestionError};
use crate::model::{Covers, DomainModel, TestCase};
use crate::normalize::ObservationBatch;
use crate::suggest::{CandidateRecord, SuggestionRequest, SuggestionSource};
use crate::templates::render_suggestion_prompt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// How a unit ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// The source answered (possibly after retries)
    Completed,
    /// Nothing to ask: the bundle was empty
    Skipped,
    /// Terminal failure or retries exhausted; the unit contributed no
    /// suggested candidates
    Failed,
}

/// Per-unit summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub scope: String,
    pub status: UnitStatus,
    pub attempts: u32,
    /// Records returned by the source plus observation records
    pub candidates: usize,
    /// Records that passed validation
    pub accepted: usize,
}

/// Result of the generation stage
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub cases: Vec<TestCase>,
    pub units: Vec<UnitReport>,
    pub diagnostics: Vec<Diagnostic>,
}

/// What one worker task reports back
enum CallOutcome {
    Answered {
        records: Vec<CandidateRecord>,
        attempts: u32,
    },
    Failed {
        error: SuggestionError,
        attempts: u32,
    },
    Skipped,
    Cancelled,
}

struct UnitResult {
    index: usize,
    outcome: CallOutcome,
    diagnostics: Vec<Diagnostic>,
}

/// Run every work unit against `source` and return validated candidates
///
/// Source failures are local to their unit: they are recorded as
/// diagnostics and the run continues. Cancellation stops new calls, drops
/// in-flight ones and fails the whole run with [`Error::Cancelled`].
pub async fn generate(
    config: &GeneratorConfig,
    model: &DomainModel,
    observations: &[ObservationBatch],
    context: &RunContext,
    source: Arc<dyn SuggestionSource>,
    cancel: &CancellationToken,
) -> Result<GenerationOutput> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let units = plan_units(model, observations, context);
    tracing::info!(
        units = units.len(),
        workers = config.workers,
        source = source.name(),
        "starting generation"
    );

    let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));
    let mut tasks = JoinSet::new();

    for unit in &units {
        let skip = unit.bundle.is_empty();
        let request = SuggestionRequest {
            scope: unit.scope.clone(),
            prompt: render_suggestion_prompt(&unit.bundle, &config.test_types)?,
            bundle: unit.bundle.clone(),
            test_types: config.test_types.clone(),
        };
        let index = unit.index;
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let retry = config.retry.clone();

        tasks.spawn(async move {
            if skip {
                return UnitResult {
                    index,
                    outcome: CallOutcome::Skipped,
                    diagnostics: Vec::new(),
                };
            }
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.acquire_owned() => permit.ok(),
            };
            let Some(_permit) = permit else {
                return UnitResult {
                    index,
                    outcome: CallOutcome::Cancelled,
                    diagnostics: Vec::new(),
                };
            };
            let mut diagnostics = Vec::new();
            let outcome =
                call_with_retry(source.as_ref(), &request, &retry, &cancel, &mut diagnostics).await;
            UnitResult {
                index,
                outcome,
                diagnostics,
            }
        });
    }

    let mut results: Vec<Option<UnitResult>> = units.iter().map(|_| None).collect();
    let mut panicked = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => {
                let index = result.index;
                results[index] = Some(result);
            }
            Err(err) => {
                tracing::error!(error = %err, "generation task failed");
                panicked.push(err.to_string());
            }
        }
    }

    if cancel.is_cancelled()
        || results
            .iter()
            .flatten()
            .any(|r| matches!(r.outcome, CallOutcome::Cancelled))
    {
        tracing::warn!("generation cancelled");
        return Err(Error::Cancelled);
    }

    let mut output = GenerationOutput::default();
    for (unit, result) in units.iter().zip(results) {
        let result = result.unwrap_or_else(|| UnitResult {
            index: unit.index,
            outcome: CallOutcome::Failed {
                error: SuggestionError::terminal(
                    panicked
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "worker task did not report".to_string()),
                ),
                attempts: 0,
            },
            diagnostics: Vec::new(),
        });
        merge_unit(model, unit, result, &mut output)?;
    }

    tracing::info!(
        cases = output.cases.len(),
        diagnostics = output.diagnostics.len(),
        "generation finished"
    );
    Ok(output)
}

/// Call the source, retrying transient failures with backoff
async fn call_with_retry(
    source: &dyn SuggestionSource,
    request: &SuggestionRequest,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    diagnostics: &mut Vec<Diagnostic>,
) -> CallOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return CallOutcome::Cancelled,
            result = source.suggest(request) => result,
        };
        attempt += 1;

        let err = match result {
            Ok(records) => {
                tracing::debug!(scope = %request.scope, records = records.len(), attempt, "unit answered");
                return CallOutcome::Answered {
                    records,
                    attempts: attempt,
                };
            }
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= max_attempts {
            tracing::warn!(
                scope = %request.scope,
                attempt,
                max_attempts,
                error = %err,
                "suggestion call failed"
            );
            return CallOutcome::Failed {
                error: err,
                attempts: attempt,
            };
        }

        let wait = policy.delay_for(attempt - 1, err.retry_after_ms());
        let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(
            scope = %request.scope,
            attempt,
            max_attempts,
            wait_ms,
            error = %err,
            "transient suggestion failure, retrying"
        );
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::Retried,
                format!(
                    "attempt {}/{} failed ({}); retrying in {} ms",
                    attempt, max_attempts, err, wait_ms
                ),
            )
            .in_scope(request.scope.clone()),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return CallOutcome::Cancelled,
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

/// Validate a finished unit's records and append them to the output
fn merge_unit(
    model: &DomainModel,
    unit: &WorkUnit,
    result: UnitResult,
    output: &mut GenerationOutput,
) -> Result<()> {
    output.diagnostics.extend(result.diagnostics);

    let (status, attempts, suggested) = match result.outcome {
        CallOutcome::Answered { records, attempts } => (UnitStatus::Completed, attempts, records),
        CallOutcome::Skipped => (UnitStatus::Skipped, 0, Vec::new()),
        CallOutcome::Failed { error, attempts } => {
            output.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UnitFailed,
                    format!("no suggestions after {} attempt(s): {}", attempts, error),
                )
                .in_scope(unit.scope.clone()),
            );
            (UnitStatus::Failed, attempts, Vec::new())
        }
        CallOutcome::Cancelled => return Err(Error::Cancelled),
    };

    let mut context_covers = Covers::default();
    let orphans = candidate::resolve_ids(model, &unit.context_ids, &mut context_covers);
    for orphan in orphans {
        output.diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::OrphanReference,
                format!("context id '{}' does not match any entity", orphan),
            )
            .in_scope(unit.scope.clone())
            .about(orphan),
        );
    }

    let source_fingerprint = unit.bundle.fingerprint()?;
    let scope = UnitScope {
        scope: &unit.scope,
        bundle: &unit.bundle,
        source_fingerprint: &source_fingerprint,
        context_covers: &context_covers,
    };

    let candidates = suggested.len() + unit.observations.len();
    let mut accepted = 0;
    let records = suggested
        .iter()
        .map(|r| (r, Origin::Suggested))
        .chain(unit.observations.iter().map(|r| (r, Origin::Observed)));
    for (record, origin) in records {
        if let Some(mut case) =
            validate_candidate(record, origin, &scope, model, &mut output.diagnostics)
        {
            case.id = format!("TC-{:04}", output.cases.len() + 1);
            output.cases.push(case);
            accepted += 1;
        }
    }

    output.units.push(UnitReport {
        scope: unit.scope.clone(),
        status,
        attempts,
        candidates,
        accepted,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::count_kind;
    use crate::model::{Component, ComponentType, TestType};
    use crate::suggest::{ReplaySource, RuleBasedSource};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn model() -> DomainModel {
        let mut model = DomainModel::new();
        model.add_component(Component::new("btn-login", "Login", ComponentType::Button));
        model.add_component(Component::new("btn-save", "Settings", ComponentType::Button));
        model
    }

    fn fast_config() -> GeneratorConfig {
        let mut config = GeneratorConfig::default();
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 5;
        config
    }

    /// Fails transiently `failures` times, then answers
    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl SuggestionSource for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn suggest(
            &self,
            request: &SuggestionRequest,
        ) -> std::result::Result<Vec<CandidateRecord>, SuggestionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(SuggestionError::Transient {
                    message: "rate limited".into(),
                    retry_after_ms: Some(1),
                });
            }
            Ok(vec![CandidateRecord::new(
                format!("Open {}", request.scope),
                TestType::Func,
                "P1",
            )
            .step("navigate")])
        }
    }

    #[tokio::test]
    async fn test_results_are_ordered_by_unit() {
        let source = ReplaySource::new()
            .with_text("Login", "TC-1: Valid login\nSteps:\n1. click btn-login")
            .with_text("Settings", "TC-1: Save settings\nSteps:\n1. click btn-save");
        let output = generate(
            &fast_config(),
            &model(),
            &[],
            &RunContext::default(),
            Arc::new(source),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let ids: Vec<_> = output.cases.iter().map(|c| (c.id.as_str(), c.scope.as_str())).collect();
        assert_eq!(ids, vec![("TC-0001", "Login"), ("TC-0002", "Settings")]);
        assert!(output.cases[0].covers.component_ids.contains("btn-login"));
        assert_eq!(output.units.len(), 2);
        assert!(output.units.iter().all(|u| u.status == UnitStatus::Completed));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let source = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 1,
        });
        let mut config = fast_config();
        config.workers = 1;
        let output = generate(
            &config,
            &model(),
            &[],
            &RunContext::default(),
            source.clone(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(output.cases.len(), 2);
        assert_eq!(count_kind(&output.diagnostics, DiagnosticKind::Retried), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(output.units.iter().map(|u| u.attempts).sum::<u32>(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_only_that_unit() {
        let source = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: usize::MAX,
        });
        let output = generate(
            &fast_config(),
            &model(),
            &[],
            &RunContext::default(),
            source.clone(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(output.cases.is_empty());
        assert_eq!(count_kind(&output.diagnostics, DiagnosticKind::UnitFailed), 2);
        assert_eq!(count_kind(&output.diagnostics, DiagnosticKind::Retried), 4);
        assert_eq!(source.calls.load(Ordering::SeqCst), 6);
    }

    struct Broken;

    #[async_trait]
    impl SuggestionSource for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn suggest(
            &self,
            _request: &SuggestionRequest,
        ) -> std::result::Result<Vec<CandidateRecord>, SuggestionError> {
            Err(SuggestionError::terminal("invalid api key"))
        }
    }

    #[tokio::test]
    async fn test_terminal_failure_is_not_retried() {
        let output = generate(
            &fast_config(),
            &model(),
            &[],
            &RunContext::default(),
            Arc::new(Broken),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(count_kind(&output.diagnostics, DiagnosticKind::Retried), 0);
        assert!(output.units.iter().all(|u| u.status == UnitStatus::Failed && u.attempts == 1));
    }

    #[tokio::test]
    async fn test_cancelled_run_returns_error() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = generate(
            &fast_config(),
            &model(),
            &[],
            &RunContext::default(),
            Arc::new(RuleBasedSource),
            &cancel,
        )
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_empty_model_has_no_units() {
        let output = generate(
            &fast_config(),
            &DomainModel::new(),
            &[],
            &RunContext::default(),
            Arc::new(RuleBasedSource),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(output.cases.is_empty());
        assert!(output.units.is_empty());
    }

    #[tokio::test]
    async fn test_observations_follow_suggestions() {
        let batch = ObservationBatch {
            source_id: "shots".into(),
            scope: "Login".into(),
            records: vec![CandidateRecord::new("Observed login", TestType::Func, "P2")
                .step("tap login")],
        };
        let source = ReplaySource::new()
            .with_text("Login", "TC-1: Valid login\nSteps:\n1. click btn-login");
        let output = generate(
            &fast_config(),
            &model(),
            &[batch],
            &RunContext::default(),
            Arc::new(source),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        let titles: Vec<_> = output.cases.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Valid login", "Observed login"]);
        assert_eq!(output.units[0].candidates, 2);
    }
}
