use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::config::Config;
use crate::types::{AppError, AppResult};
use crate::workflow::WorkflowController;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub workflow: Arc<WorkflowController>,
}

// Pipeline data contracts

/// Input to one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AnalysisRequest {
    #[validate(custom(function = "not_blank"))]
    pub honeywell_product: String,
    #[validate(custom(function = "not_blank"))]
    pub competitor_query: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

impl AnalysisRequest {
    /// Build a request, trimming both fields and rejecting blank input.
    pub fn new(honeywell_product: impl Into<String>, competitor_query: impl Into<String>) -> AppResult<Self> {
        let request = Self {
            honeywell_product: honeywell_product.into().trim().to_string(),
            competitor_query: competitor_query.into().trim().to_string(),
        };
        request.validate().map_err(|_| {
            AppError::InvalidRequest("Both product and competitor query are required".to_string())
        })?;
        Ok(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Financial,
    News,
    ProductSpecs,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Financial => write!(f, "financial"),
            SourceKind::News => write!(f, "news"),
            SourceKind::ProductSpecs => write!(f, "product_specs"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Failed,
    TimedOut,
}

/// Normalized outcome of one tool adapter invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub source_name: String,
    pub kind: SourceKind,
    pub status: ToolStatus,
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl ToolResult {
    pub fn ok(source_name: impl Into<String>, kind: SourceKind, payload: serde_json::Value) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            status: ToolStatus::Ok,
            payload: Some(payload),
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn failed(source_name: impl Into<String>, kind: SourceKind, error: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            status: ToolStatus::Failed,
            payload: None,
            error: Some(error.into()),
            elapsed_ms: 0,
        }
    }

    pub fn timed_out(source_name: impl Into<String>, kind: SourceKind, after_ms: u64) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            status: ToolStatus::TimedOut,
            payload: None,
            error: Some(format!("timed out after {}ms", after_ms)),
            elapsed_ms: after_ms,
        }
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }

    /// True when the payload carries any data at all.
    pub fn has_payload(&self) -> bool {
        match &self.payload {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(serde_json::Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletenessTally {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub timed_out: usize,
}

/// Results gathered for one run, keyed by source name.
///
/// Created once per run and only written by the Scout stage.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedData {
    pub request: AnalysisRequest,
    sources: BTreeMap<String, ToolResult>,
    attempts: u32,
}

impl AggregatedData {
    pub fn new(request: AnalysisRequest) -> Self {
        Self {
            request,
            sources: BTreeMap::new(),
            attempts: 0,
        }
    }

    /// Apply one Scout attempt: each result replaces the entry for its source.
    pub fn merge(&mut self, results: impl IntoIterator<Item = ToolResult>) {
        for result in results {
            self.sources.insert(result.source_name.clone(), result);
        }
        self.attempts += 1;
    }

    pub fn get(&self, source_name: &str) -> Option<&ToolResult> {
        self.sources.get(source_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolResult> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn tally(&self) -> CompletenessTally {
        self.sources
            .values()
            .fold(CompletenessTally::default(), |mut tally, result| {
                tally.total += 1;
                match result.status {
                    ToolStatus::Ok => tally.successful += 1,
                    ToolStatus::Failed => tally.failed += 1,
                    ToolStatus::TimedOut => tally.timed_out += 1,
                }
                tally
            })
    }
}

/// Outcome of one Validator pass. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityVerdict {
    pub passed: bool,
    pub missing_areas: BTreeSet<String>,
    pub attempt_number: u32,
    pub source_scores: BTreeMap<String, f64>,
    pub satisfied_ratio: f64,
    pub recommendations: Vec<String>,
}

impl QualityVerdict {
    pub fn is_satisfied(&self, source_name: &str) -> bool {
        self.source_scores.contains_key(source_name) && !self.missing_areas.contains(source_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveGap {
    pub category: String,
    pub gap: String,
    pub metric: String,
    pub impact: Impact,
    pub opportunity: String,
}

/// Structured output of the Analyst stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Findings {
    pub honeywell_product: String,
    pub competitor_query: String,
    pub competitive_gaps: Vec<CompetitiveGap>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence_score: f64,
    pub data_sources_used: BTreeSet<String>,
    pub degraded: bool,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Scouting,
    Validating,
    Retrying,
    Analyzing,
    Writing,
    Done,
    Aborted,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Aborted)
    }
}

/// Final output of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub complete: bool,
    pub final_state: WorkflowState,
    pub findings: Option<Findings>,
    pub report_path: Option<String>,
    pub failure_reason: Option<String>,
    pub attempts: u32,
    pub degraded: bool,
    pub verdict: Option<QualityVerdict>,
}

impl WorkflowResult {
    /// Findings were produced but no report was written.
    pub fn is_partial_success(&self) -> bool {
        self.findings.is_some() && self.report_path.is_none()
    }
}

// API Request/Response types

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub honeywell_product: String,
    #[serde(default)]
    pub competitor_query: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalyzePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzePayload {
    pub run_id: Uuid,
    pub complete: bool,
    pub degraded: bool,
    pub attempts: u32,
    pub analysis_results: Option<Findings>,
    pub pdf_path: Option<String>,
}

impl From<WorkflowResult> for AnalyzeResponse {
    fn from(result: WorkflowResult) -> Self {
        let success = result.complete && result.report_path.is_some();
        Self {
            success,
            error: result.failure_reason.clone(),
            result: Some(AnalyzePayload {
                run_id: result.run_id,
                complete: result.complete,
                degraded: result.degraded,
                attempts: result.attempts,
                analysis_results: result.findings,
                pdf_path: result.report_path,
            }),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportEntry {
    pub filename: String,
    pub size: u64,
    pub created: String,
    pub modified: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportsResponse {
    pub reports: Vec<ReportEntry>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub tools: Vec<String>,
}
