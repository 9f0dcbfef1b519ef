//! Scout Agent
//!
//! Fans out over the configured tool adapters for one product/competitor
//! pair. Every adapter runs in its own task with its own timeout; a slow,
//! failing or panicking adapter only affects its own entry.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::models::{AggregatedData, AnalysisRequest, SourceKind, ToolResult, ToolStatus};
use crate::tools::ToolAdapter;

pub struct ScoutAgent {
    adapters: Vec<Arc<dyn ToolAdapter>>,
    default_timeout: Duration,
}

impl ScoutAgent {
    pub fn new(adapters: Vec<Arc<dyn ToolAdapter>>, default_timeout: Duration) -> Self {
        Self {
            adapters,
            default_timeout,
        }
    }

    pub fn source_names(&self) -> Vec<String> {
        self.adapters
            .iter()
            .map(|a| a.source_name().to_string())
            .collect()
    }

    /// Run one Scout attempt and merge its results into a copy of `previous`.
    ///
    /// With an empty `missing_areas` every adapter is invoked; otherwise only
    /// the adapters named in it, so sources that already passed keep their
    /// earlier results. Dropping the returned future aborts all in-flight
    /// adapter tasks and leaves `previous` untouched.
    pub async fn gather(
        &self,
        request: &AnalysisRequest,
        previous: &AggregatedData,
        missing_areas: &BTreeSet<String>,
    ) -> AggregatedData {
        let selected: Vec<Arc<dyn ToolAdapter>> = self
            .adapters
            .iter()
            .filter(|a| missing_areas.is_empty() || missing_areas.contains(a.source_name()))
            .cloned()
            .collect();

        info!(
            product = %request.honeywell_product,
            competitor = %request.competitor_query,
            sources = selected.len(),
            attempt = previous.attempts() + 1,
            "Scout gathering data"
        );

        let mut pending: BTreeMap<String, SourceKind> = BTreeMap::new();
        let mut tasks = JoinSet::new();
        for adapter in selected {
            pending.insert(adapter.source_name().to_string(), adapter.kind());
            let timeout = adapter.timeout().unwrap_or(self.default_timeout);
            tasks.spawn(invoke_bounded(adapter, request.clone(), timeout));
        }

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    pending.remove(&result.source_name);
                    info!(
                        source = %result.source_name,
                        status = ?result.status,
                        elapsed_ms = result.elapsed_ms,
                        "Source completed"
                    );
                    results.push(result);
                }
                Err(e) => warn!(error = %e, "Scout task ended without a result"),
            }
        }

        // Anything still pending lost its task before reporting
        for (source_name, kind) in pending {
            results.push(ToolResult::failed(source_name, kind, "tool task aborted"));
        }

        let successful = results.iter().filter(|r| r.status == ToolStatus::Ok).count();
        info!("{}/{} sources successful", successful, results.len());

        let mut data = previous.clone();
        data.merge(results);
        data
    }
}

/// Invoke one adapter under its timeout, converting a panic into a failed result.
async fn invoke_bounded(
    adapter: Arc<dyn ToolAdapter>,
    request: AnalysisRequest,
    timeout: Duration,
) -> ToolResult {
    let source_name = adapter.source_name().to_string();
    let kind = adapter.kind();
    let started = Instant::now();

    let call = AssertUnwindSafe(adapter.invoke(&request)).catch_unwind();
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(result)) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            result.with_elapsed_ms(elapsed_ms)
        }
        Ok(Err(_)) => {
            warn!(source = %source_name, "Tool adapter panicked");
            ToolResult::failed(source_name, kind, "tool adapter panicked")
                .with_elapsed_ms(started.elapsed().as_millis() as u64)
        }
        Err(_) => {
            warn!(source = %source_name, timeout_ms = timeout.as_millis() as u64, "Tool adapter timed out");
            ToolResult::timed_out(source_name, kind, timeout.as_millis() as u64)
        }
    }
}
