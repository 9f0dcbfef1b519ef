// Shared fixtures for agent and workflow tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::writer::{report_filename, ReportError, ReportWriter};
use crate::models::{AggregatedData, AnalysisRequest, Findings, SourceKind, ToolResult};
use crate::tools::{
    financial, news, specs, CompanySnapshot, FinancialPayload, NewsArticle, NewsPayload, SpecPage,
    SpecsPayload, ToolAdapter,
};

pub fn request() -> AnalysisRequest {
    AnalysisRequest::new("TFE731 Engine", "compare with Pratt & Whitney PW500").unwrap()
}

pub fn financial_payload() -> Value {
    let honeywell = CompanySnapshot {
        ticker: "HON".into(),
        company_name: Some("Honeywell International Inc.".into()),
        current_price: Some(210.0),
        price_change_percent: Some(1.2),
        market_cap: Some(140e9),
        pe_ratio: Some(24.0),
        revenue: Some(36e9),
        profit_margin: Some(0.15),
        ..Default::default()
    };
    let competitor = CompanySnapshot {
        ticker: "RTX".into(),
        company_name: Some("RTX Corporation".into()),
        current_price: Some(105.0),
        price_change_percent: Some(-6.5),
        market_cap: Some(70e9),
        pe_ratio: Some(20.0),
        revenue: Some(68e9),
        profit_margin: Some(0.05),
        ..Default::default()
    };
    let comparison = financial::compare(&honeywell, &competitor);
    serde_json::to_value(FinancialPayload {
        honeywell,
        competitor: Some(competitor),
        comparison,
    })
    .unwrap()
}

pub fn news_payload() -> Value {
    let article = |title: &str, content: &str| NewsArticle {
        title: title.into(),
        url: format!("https://ainonline.com/{}", title.len()),
        content: content.into(),
        published_date: None,
        score: 0.8,
    };
    let articles = vec![
        article(
            "Honeywell TFE731 faces new competitor pressure",
            "Market share in the midsize jet segment is shifting as the competitor expands.",
        ),
        article(
            "PW500 upgrade brings new technology",
            "Pratt & Whitney Canada announced a development program for the PW500 family.",
        ),
        article(
            "Business aviation deliveries rise",
            "Deliveries of light and midsize jets rose in the third quarter.",
        ),
    ];
    serde_json::to_value(NewsPayload {
        queries: vec!["Honeywell TFE731 Engine aerospace news".into()],
        total_results: articles.len(),
        articles,
    })
    .unwrap()
}

pub fn specs_payload() -> Value {
    serde_json::to_value(SpecsPayload {
        competitor_product: "PW500".into(),
        search_query: "PW500 specifications".into(),
        pages: vec![SpecPage {
            title: "Pratt & Whitney Canada PW500".into(),
            url: "https://en.wikipedia.org/wiki/PW500".into(),
            source: Some("en.wikipedia.org".into()),
            status: specs::STATUS_COMPLETED.into(),
            specs: vec!["Takeoff thrust 2,900-4,500 lbf".into(), "Dry weight 700 lb".into()],
            price: Some("$1.2 million".into()),
            date: Some("1993".into()),
        }],
    })
    .unwrap()
}

pub fn ok_financial() -> ToolResult {
    ToolResult::ok(financial::SOURCE_NAME, SourceKind::Financial, financial_payload())
}

pub fn ok_news() -> ToolResult {
    ToolResult::ok(news::SOURCE_NAME, SourceKind::News, news_payload())
}

pub fn ok_specs() -> ToolResult {
    ToolResult::ok(specs::SOURCE_NAME, SourceKind::ProductSpecs, specs_payload())
}

pub fn aggregated(results: Vec<ToolResult>) -> AggregatedData {
    let mut data = AggregatedData::new(request());
    data.merge(results);
    data
}

/// Scripted adapter behaviour
pub enum Behavior {
    Ok(Value),
    Fail,
    Hang,
    Panic,
    /// Hang on the first call, succeed afterwards
    HangThenOk(Value),
}

pub struct StubAdapter {
    pub name: &'static str,
    pub kind: SourceKind,
    pub behavior: Behavior,
    calls: AtomicUsize,
}

impl StubAdapter {
    pub fn new(name: &'static str, kind: SourceKind, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            kind,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolAdapter for StubAdapter {
    fn source_name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn timeout(&self) -> Option<Duration> {
        Some(Duration::from_millis(100))
    }

    async fn invoke(&self, _request: &AnalysisRequest) -> ToolResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Ok(payload) => ToolResult::ok(self.name, self.kind, payload.clone()),
            Behavior::Fail => ToolResult::failed(self.name, self.kind, "upstream unavailable"),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                ToolResult::failed(self.name, self.kind, "unreachable")
            }
            Behavior::Panic => panic!("adapter bug"),
            Behavior::HangThenOk(payload) => {
                if call == 0 {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                ToolResult::ok(self.name, self.kind, payload.clone())
            }
        }
    }
}

/// The three production source names backed by well-formed stub payloads
pub fn healthy_adapters() -> Vec<Arc<StubAdapter>> {
    vec![
        StubAdapter::new(financial::SOURCE_NAME, SourceKind::Financial, Behavior::Ok(financial_payload())),
        StubAdapter::new(news::SOURCE_NAME, SourceKind::News, Behavior::Ok(news_payload())),
        StubAdapter::new(specs::SOURCE_NAME, SourceKind::ProductSpecs, Behavior::Ok(specs_payload())),
    ]
}

pub fn as_dyn(adapters: &[Arc<StubAdapter>]) -> Vec<Arc<dyn ToolAdapter>> {
    adapters
        .iter()
        .map(|a| a.clone() as Arc<dyn ToolAdapter>)
        .collect()
}

/// Reports "written" without touching the filesystem
pub struct MemoryWriter;

#[async_trait]
impl ReportWriter for MemoryWriter {
    async fn render(&self, run_id: Uuid, _request: &AnalysisRequest, _findings: &Findings) -> Result<String, ReportError> {
        Ok(format!("reports/{}", report_filename(run_id)))
    }
}

pub struct FailingWriter;

#[async_trait]
impl ReportWriter for FailingWriter {
    async fn render(&self, _run_id: Uuid, _request: &AnalysisRequest, _findings: &Findings) -> Result<String, ReportError> {
        Err(ReportError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "/srv/secret/reports: permission denied",
        )))
    }
}

/// Never finishes on its own
pub struct HangingWriter;

#[async_trait]
impl ReportWriter for HangingWriter {
    async fn render(&self, _run_id: Uuid, _request: &AnalysisRequest, _findings: &Findings) -> Result<String, ReportError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("reports/unreachable.pdf".to_string())
    }
}
