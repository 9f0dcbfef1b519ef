//! Tool Adapters
//!
//! Each adapter wraps one third-party data source behind the same contract:
//! `invoke(request) -> ToolResult`. Adapters never return errors; every
//! failure is folded into a `ToolResult` with `status = failed`.
//!
//! - **yfinance**: Yahoo Finance quote summaries for Honeywell and the competitor
//! - **tavily_news**: Tavily news search over aviation trade press
//! - **product_specs**: SerpAPI Google search for competitor product specifications

pub mod financial;
pub mod news;
pub mod specs;

pub use financial::{CompanySnapshot, FinancialAdapter, FinancialComparison, FinancialPayload};
pub use news::{NewsAdapter, NewsArticle, NewsPayload};
pub use specs::{SpecPage, SpecsAdapter, SpecsPayload};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ToolsConfig;
use crate::models::{AnalysisRequest, SourceKind, ToolResult};

/// Errors raised inside an adapter before they are folded into a `ToolResult`
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("No results found for query")]
    NoResults,
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ToolError::ParseError(err.to_string())
        } else {
            ToolError::RequestFailed(err.to_string())
        }
    }
}

#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Key under which this adapter's result is stored in `AggregatedData`.
    fn source_name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Per-adapter timeout override; `None` uses the Scout default.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn invoke(&self, request: &AnalysisRequest) -> ToolResult;
}

/// Fold an adapter's internal result into the uniform `ToolResult` record.
pub(crate) fn into_tool_result<T: Serialize>(
    source_name: &str,
    kind: SourceKind,
    outcome: Result<T, ToolError>,
) -> ToolResult {
    match outcome {
        Ok(payload) => match serde_json::to_value(payload) {
            Ok(value) => ToolResult::ok(source_name, kind, value),
            Err(e) => ToolResult::failed(source_name, kind, format!("payload encoding failed: {}", e)),
        },
        Err(e) => {
            warn!(source = %source_name, error = %e, "Tool adapter failed");
            ToolResult::failed(source_name, kind, e.to_string())
        }
    }
}

/// Build the adapter set enabled by the current configuration.
///
/// The financial adapter needs no key and is always present; news and
/// product-spec search are enabled by their API keys.
pub fn build_adapters(config: &ToolsConfig) -> Vec<Arc<dyn ToolAdapter>> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("aero-intel/", env!("CARGO_PKG_VERSION")))
        .timeout(config.timeout())
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build tuned HTTP client, using defaults");
            reqwest::Client::new()
        });

    let mut adapters: Vec<Arc<dyn ToolAdapter>> = vec![Arc::new(FinancialAdapter::new(
        client.clone(),
        &config.yahoo_finance_base_url,
    ))];

    match &config.tavily_api_key {
        Some(key) => adapters.push(Arc::new(
            NewsAdapter::new(client.clone(), &config.tavily_base_url, key)
                .with_max_results(config.news_max_results),
        )),
        None => warn!("Tavily API key not found - news adapter disabled"),
    }

    match &config.serpapi_api_key {
        Some(key) => adapters.push(Arc::new(
            SpecsAdapter::new(key.clone())
                .with_max_results(config.specs_max_results)
                .with_timeout(config.timeout()),
        )),
        None => warn!("SerpAPI key not found - product specification adapter disabled"),
    }

    info!(
        tools = ?adapters.iter().map(|a| a.source_name().to_string()).collect::<Vec<_>>(),
        "Tool adapters initialized"
    );

    adapters
}
