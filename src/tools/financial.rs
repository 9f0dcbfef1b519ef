// Yahoo Finance adapter
// Pulls quote summaries for Honeywell and the competitor named in the query.
// Endpoint: {base}/v10/finance/quoteSummary/{ticker}?modules=price,summaryDetail,financialData

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{into_tool_result, ToolAdapter, ToolError};
use crate::models::{AnalysisRequest, SourceKind, ToolResult};

pub const SOURCE_NAME: &str = "yfinance";
pub const HONEYWELL_TICKER: &str = "HON";

const QUOTE_MODULES: &str = "price,summaryDetail,financialData";

/// Point-in-time market data for one company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanySnapshot {
    pub ticker: String,
    pub company_name: Option<String>,
    pub current_price: Option<f64>,
    pub price_change_percent: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub revenue: Option<f64>,
    pub profit_margin: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialComparison {
    /// Honeywell market cap divided by competitor market cap
    pub market_cap_ratio: Option<f64>,
    pub price_ratio: Option<f64>,
    pub revenue_ratio: Option<f64>,
    /// Honeywell P/E minus competitor P/E
    pub pe_ratio_difference: Option<f64>,
    /// Honeywell margin minus competitor margin, in fraction units
    pub profit_margin_difference: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPayload {
    pub honeywell: CompanySnapshot,
    pub competitor: Option<CompanySnapshot>,
    pub comparison: FinancialComparison,
}

pub struct FinancialAdapter {
    client: Client,
    base_url: String,
}

impl FinancialAdapter {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_snapshot(&self, ticker: &str) -> Result<CompanySnapshot, ToolError> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, ticker);
        debug!(ticker = %ticker, "Fetching quote summary");

        let response = self
            .client
            .get(&url)
            .query(&[("modules", QUOTE_MODULES)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::RequestFailed(format!(
                "quote summary for {} returned {}",
                ticker, status
            )));
        }

        let body: Value = response.json().await?;
        parse_quote_summary(ticker, &body)
    }

    async fn fetch(&self, request: &AnalysisRequest) -> Result<FinancialPayload, ToolError> {
        let competitor_ticker = competitor_ticker(&request.competitor_query);
        info!(
            honeywell = HONEYWELL_TICKER,
            competitor = competitor_ticker,
            "Fetching financial data"
        );

        let (honeywell, competitor) = futures::join!(
            self.fetch_snapshot(HONEYWELL_TICKER),
            self.fetch_snapshot(competitor_ticker)
        );

        let honeywell = honeywell?;
        let competitor = match competitor {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(ticker = competitor_ticker, error = %e, "Competitor quote unavailable");
                None
            }
        };

        let comparison = competitor
            .as_ref()
            .map(|c| compare(&honeywell, c))
            .unwrap_or_default();

        Ok(FinancialPayload {
            honeywell,
            competitor,
            comparison,
        })
    }
}

#[async_trait]
impl ToolAdapter for FinancialAdapter {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Financial
    }

    async fn invoke(&self, request: &AnalysisRequest) -> ToolResult {
        let started = Instant::now();
        let outcome = self.fetch(request).await;
        into_tool_result(SOURCE_NAME, SourceKind::Financial, outcome)
            .with_elapsed_ms(started.elapsed().as_millis() as u64)
    }
}

/// Map a free-text competitor query to the ticker of the listed parent company.
pub fn competitor_ticker(query: &str) -> &'static str {
    let query = query.to_lowercase();
    let words: Vec<&str> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if query.contains("pratt") || query.contains("whitney") || query.contains("collins") {
        "RTX"
    } else if query.contains("general electric") || words.contains(&"ge") {
        "GE"
    } else if query.contains("boeing") {
        "BA"
    } else if query.contains("airbus") {
        "EADSY"
    } else if query.contains("rolls royce") || query.contains("rolls-royce") {
        "RYCEY"
    } else if query.contains("safran") {
        "SAFRY"
    } else {
        "GE"
    }
}

fn raw_number(section: Option<&Value>, field: &str) -> Option<f64> {
    let value = section?.get(field)?;
    // Yahoo wraps numbers as {"raw": .., "fmt": ..}; some fields come back bare
    value
        .get("raw")
        .and_then(Value::as_f64)
        .or_else(|| value.as_f64())
}

fn parse_quote_summary(ticker: &str, body: &Value) -> Result<CompanySnapshot, ToolError> {
    let summary = body
        .get("quoteSummary")
        .ok_or_else(|| ToolError::ParseError("missing quoteSummary".to_string()))?;

    if let Some(error) = summary.get("error").filter(|e| !e.is_null()) {
        let description = error
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ToolError::RequestFailed(description.to_string()));
    }

    let result = summary
        .get("result")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .ok_or(ToolError::NoResults)?;

    let price = result.get("price");
    let detail = result.get("summaryDetail");
    let financial = result.get("financialData");

    let company_name = price
        .and_then(|p| p.get("longName").or_else(|| p.get("shortName")))
        .and_then(Value::as_str)
        .map(String::from);

    Ok(CompanySnapshot {
        ticker: ticker.to_string(),
        company_name,
        current_price: raw_number(price, "regularMarketPrice"),
        price_change_percent: raw_number(price, "regularMarketChangePercent").map(|p| p * 100.0),
        market_cap: raw_number(price, "marketCap").or_else(|| raw_number(detail, "marketCap")),
        pe_ratio: raw_number(detail, "trailingPE"),
        revenue: raw_number(financial, "totalRevenue"),
        profit_margin: raw_number(financial, "profitMargins"),
        fifty_two_week_high: raw_number(detail, "fiftyTwoWeekHigh"),
        fifty_two_week_low: raw_number(detail, "fiftyTwoWeekLow"),
        volume: raw_number(price, "regularMarketVolume").or_else(|| raw_number(detail, "volume")),
    })
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

fn difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

pub fn compare(honeywell: &CompanySnapshot, competitor: &CompanySnapshot) -> FinancialComparison {
    FinancialComparison {
        market_cap_ratio: ratio(honeywell.market_cap, competitor.market_cap),
        price_ratio: ratio(honeywell.current_price, competitor.current_price),
        revenue_ratio: ratio(honeywell.revenue, competitor.revenue),
        pe_ratio_difference: difference(honeywell.pe_ratio, competitor.pe_ratio),
        profit_margin_difference: difference(honeywell.profit_margin, competitor.profit_margin),
    }
}
