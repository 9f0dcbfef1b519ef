//! Workflow Controller
//!
//! Drives one run through Scouting → Validating → (Retrying → Scouting)
//! → Analyzing → Writing → Done, or to Aborted on a fatal failure.
//!
//! - Validation is attempted at most [`MAX_VALIDATION_ATTEMPTS`] times; a
//!   second failed verdict continues with the data at hand (degraded).
//! - A retry re-queries only the sources named in the verdict's missing areas.
//! - Cancellation is observed between states and while Scout or Writer are
//!   in flight; a cancelled run ends Aborted.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{AnalystAgent, PdfReportWriter, ReportWriter, ScoutAgent, ValidatorAgent};
use crate::config::{Config, ValidationConfig};
use crate::models::{
    AggregatedData, AnalysisRequest, Findings, QualityVerdict, WorkflowResult, WorkflowState,
};
use crate::tools::{build_adapters, ToolAdapter};
use crate::types::AppError;

pub const MAX_VALIDATION_ATTEMPTS: u32 = 2;

const CANCELLED: &str = "Analysis was cancelled";

pub struct WorkflowController {
    scout: ScoutAgent,
    validator: ValidatorAgent,
    writer: Arc<dyn ReportWriter>,
}

/// Mutable state of a single run; never shared between runs.
struct Run {
    id: Uuid,
    state: WorkflowState,
    attempt: u32,
    data: AggregatedData,
    verdict: Option<QualityVerdict>,
    findings: Option<Findings>,
    report_path: Option<String>,
    failure_reason: Option<String>,
}

impl Run {
    fn new(request: &AnalysisRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: WorkflowState::Scouting,
            attempt: 0,
            data: AggregatedData::new(request.clone()),
            verdict: None,
            findings: None,
            report_path: None,
            failure_reason: None,
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        info!(
            run_id = %self.id,
            from = ?self.state,
            to = ?next,
            attempt = self.attempt,
            "State transition"
        );
        self.state = next;
    }

    fn abort(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.transition(WorkflowState::Aborted);
    }

    fn finish(self) -> WorkflowResult {
        let complete = self.state == WorkflowState::Done;
        let degraded = self.verdict.as_ref().is_some_and(|v| !v.passed);

        info!(
            run_id = %self.id,
            final_state = ?self.state,
            complete = complete,
            attempts = self.attempt,
            degraded = degraded,
            "Workflow finished"
        );

        WorkflowResult {
            run_id: self.id,
            complete,
            final_state: self.state,
            findings: self.findings,
            report_path: self.report_path,
            failure_reason: self.failure_reason,
            attempts: self.attempt,
            degraded,
            verdict: self.verdict,
        }
    }
}

impl WorkflowController {
    pub fn new(
        adapters: Vec<Arc<dyn ToolAdapter>>,
        tool_timeout: Duration,
        validation: ValidationConfig,
        writer: Arc<dyn ReportWriter>,
    ) -> Self {
        Self {
            scout: ScoutAgent::new(adapters, tool_timeout),
            validator: ValidatorAgent::new(validation),
            writer,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            build_adapters(&config.tools),
            config.tools.timeout(),
            config.validation.clone(),
            Arc::new(PdfReportWriter::new(config.report.output_dir.clone())),
        )
    }

    /// Source names of the enabled tool adapters
    pub fn enabled_tools(&self) -> Vec<String> {
        self.scout.source_names()
    }

    pub async fn run(&self, request: AnalysisRequest) -> WorkflowResult {
        self.run_cancellable(request, CancellationToken::new()).await
    }

    pub async fn run_cancellable(&self, request: AnalysisRequest, cancel: CancellationToken) -> WorkflowResult {
        let mut run = Run::new(&request);
        info!(
            run_id = %run.id,
            product = %request.honeywell_product,
            competitor = %request.competitor_query,
            "Starting competitive analysis"
        );

        while !run.state.is_terminal() {
            if cancel.is_cancelled() {
                run.abort(CANCELLED);
                break;
            }

            match run.state {
                WorkflowState::Scouting => {
                    let missing = run
                        .verdict
                        .as_ref()
                        .map(|v| v.missing_areas.clone())
                        .unwrap_or_default();

                    let gathered = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        data = self.scout.gather(&request, &run.data, &missing) => Some(data),
                    };

                    match gathered {
                        Some(data) => {
                            run.data = data;
                            run.transition(WorkflowState::Validating);
                        }
                        None => run.abort(CANCELLED),
                    }
                }

                WorkflowState::Validating => {
                    run.attempt += 1;
                    let verdict = self.validator.assess(&run.data, run.attempt);

                    let next = if verdict.passed {
                        WorkflowState::Analyzing
                    } else if run.attempt < MAX_VALIDATION_ATTEMPTS {
                        WorkflowState::Retrying
                    } else {
                        warn!(
                            run_id = %run.id,
                            missing = ?verdict.missing_areas,
                            "Validation attempts exhausted, continuing with partial data"
                        );
                        WorkflowState::Analyzing
                    };

                    run.verdict = Some(verdict);
                    run.transition(next);
                }

                WorkflowState::Retrying => {
                    if let Some(verdict) = &run.verdict {
                        info!(
                            run_id = %run.id,
                            sources = ?verdict.missing_areas,
                            "Retrying missing sources"
                        );
                    }
                    run.transition(WorkflowState::Scouting);
                }

                WorkflowState::Analyzing => {
                    let verdict = match &run.verdict {
                        Some(verdict) => verdict.clone(),
                        None => self.validator.assess(&run.data, run.attempt),
                    };

                    match AnalystAgent::analyze(&run.data, &verdict) {
                        Ok(findings) => {
                            run.findings = Some(findings);
                            run.transition(WorkflowState::Writing);
                        }
                        Err(e) => {
                            error!(run_id = %run.id, error = %e, "Analysis failed");
                            run.abort(e.user_message());
                        }
                    }
                }

                WorkflowState::Writing => {
                    let Some(findings) = run.findings.as_ref() else {
                        run.abort(AppError::Internal("no findings to write".into()).user_message());
                        continue;
                    };

                    let rendered = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        rendered = self.writer.render(run.id, &request, findings) => Some(rendered),
                    };

                    match rendered {
                        Some(Ok(path)) => {
                            run.report_path = Some(path);
                            run.transition(WorkflowState::Done);
                        }
                        Some(Err(e)) => {
                            let err = AppError::from(e);
                            error!(run_id = %run.id, error = %err, "Report generation failed");
                            run.abort(err.user_message());
                        }
                        None => run.abort(CANCELLED),
                    }
                }

                WorkflowState::Done | WorkflowState::Aborted => break,
            }
        }

        run.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{
        as_dyn, financial_payload, healthy_adapters, news_payload, request, specs_payload, Behavior,
        FailingWriter, HangingWriter, MemoryWriter, StubAdapter,
    };
    use crate::models::SourceKind;
    use crate::tools::{financial, news, specs};

    fn controller(adapters: &[Arc<StubAdapter>], writer: Arc<dyn ReportWriter>) -> WorkflowController {
        WorkflowController::new(
            as_dyn(adapters),
            Duration::from_secs(5),
            ValidationConfig::default(),
            writer,
        )
    }

    fn with_financial(behavior: Behavior) -> Vec<Arc<StubAdapter>> {
        vec![
            StubAdapter::new(financial::SOURCE_NAME, SourceKind::Financial, behavior),
            StubAdapter::new(news::SOURCE_NAME, SourceKind::News, Behavior::Ok(news_payload())),
            StubAdapter::new(specs::SOURCE_NAME, SourceKind::ProductSpecs, Behavior::Ok(specs_payload())),
        ]
    }

    #[tokio::test]
    async fn test_all_sources_ok_completes_first_attempt() {
        let adapters = healthy_adapters();
        let result = controller(&adapters, Arc::new(MemoryWriter)).run(request()).await;

        assert!(result.complete);
        assert_eq!(result.final_state, WorkflowState::Done);
        assert_eq!(result.attempts, 1);
        assert!(!result.degraded);
        let verdict = result.verdict.as_ref().unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.attempt_number, 1);
        assert_eq!(result.findings.as_ref().unwrap().data_sources_used.len(), 3);
        assert!(result.failure_reason.is_none());
        assert!(adapters.iter().all(|a| a.calls() == 1));

        let short_id = &result.run_id.simple().to_string()[..8];
        assert!(result.report_path.unwrap().ends_with(&format!("_{}.pdf", short_id)));
    }

    #[tokio::test]
    async fn test_financial_timing_out_twice_degrades() {
        let healthy = controller(&healthy_adapters(), Arc::new(MemoryWriter))
            .run(request())
            .await;

        let adapters = with_financial(Behavior::Hang);
        let result = controller(&adapters, Arc::new(MemoryWriter)).run(request()).await;

        assert!(result.complete);
        assert!(result.degraded);
        assert_eq!(result.attempts, 2);
        let verdict = result.verdict.as_ref().unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.attempt_number, 2);

        let findings = result.findings.as_ref().unwrap();
        assert_eq!(findings.data_sources_used.len(), 2);
        assert!(findings.degraded);
        assert!(findings.confidence_score < healthy.findings.unwrap().confidence_score);

        // Only the missing source was retried
        assert_eq!(adapters[0].calls(), 2);
        assert_eq!(adapters[1].calls(), 1);
        assert_eq!(adapters[2].calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_missing_source() {
        let adapters = with_financial(Behavior::HangThenOk(financial_payload()));
        let result = controller(&adapters, Arc::new(MemoryWriter)).run(request()).await;

        assert!(result.complete);
        assert!(!result.degraded);
        assert_eq!(result.attempts, 2);
        assert!(result.verdict.unwrap().passed);
        assert_eq!(result.findings.unwrap().data_sources_used.len(), 3);
    }

    #[tokio::test]
    async fn test_all_sources_failing_aborts() {
        let adapters = vec![
            StubAdapter::new(financial::SOURCE_NAME, SourceKind::Financial, Behavior::Fail),
            StubAdapter::new(news::SOURCE_NAME, SourceKind::News, Behavior::Hang),
            StubAdapter::new(specs::SOURCE_NAME, SourceKind::ProductSpecs, Behavior::Panic),
        ];
        let result = controller(&adapters, Arc::new(MemoryWriter)).run(request()).await;

        assert!(!result.complete);
        assert_eq!(result.final_state, WorkflowState::Aborted);
        assert_eq!(result.attempts, 2);
        assert!(result.findings.is_none());
        assert!(result.report_path.is_none());
        assert!(result.failure_reason.is_some());
        assert!(!result.is_partial_success());
    }

    #[tokio::test]
    async fn test_writer_failure_keeps_findings() {
        let result = controller(&healthy_adapters(), Arc::new(FailingWriter))
            .run(request())
            .await;

        assert!(!result.complete);
        assert_eq!(result.final_state, WorkflowState::Aborted);
        assert!(result.findings.is_some());
        assert!(result.report_path.is_none());
        assert!(result.is_partial_success());

        let reason = result.failure_reason.unwrap();
        assert!(!reason.contains("/srv/secret"));
    }

    #[tokio::test]
    async fn test_no_adapters_aborts_after_two_attempts() {
        let result = controller(&[], Arc::new(MemoryWriter)).run(request()).await;
        assert_eq!(result.final_state, WorkflowState::Aborted);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let adapters = healthy_adapters();
        let result = controller(&adapters, Arc::new(MemoryWriter))
            .run_cancellable(request(), cancel)
            .await;

        assert_eq!(result.final_state, WorkflowState::Aborted);
        assert_eq!(result.failure_reason.as_deref(), Some(CANCELLED));
        assert_eq!(result.attempts, 0);
        assert!(adapters.iter().all(|a| a.calls() == 0));
    }

    #[tokio::test]
    async fn test_cancelled_while_scouting() {
        let adapters = with_financial(Behavior::Hang);
        let workflow = controller(&adapters, Arc::new(MemoryWriter));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = workflow.run_cancellable(request(), cancel).await;

        assert_eq!(result.final_state, WorkflowState::Aborted);
        assert_eq!(result.failure_reason.as_deref(), Some(CANCELLED));
        assert!(result.findings.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_while_writing_keeps_findings() {
        let workflow = controller(&healthy_adapters(), Arc::new(HangingWriter));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = workflow.run_cancellable(request(), cancel).await;

        assert_eq!(result.final_state, WorkflowState::Aborted);
        assert!(!result.complete);
        assert_eq!(result.failure_reason.as_deref(), Some(CANCELLED));
        assert_eq!(result.attempts, 1);
        assert!(result.findings.is_some());
        assert!(result.report_path.is_none());
        assert!(result.is_partial_success());
    }

    #[test]
    fn test_enabled_tools() {
        let workflow = controller(&healthy_adapters(), Arc::new(MemoryWriter));
        assert_eq!(
            workflow.enabled_tools(),
            vec![financial::SOURCE_NAME, news::SOURCE_NAME, specs::SOURCE_NAME]
        );
    }
}
