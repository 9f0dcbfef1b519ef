//! Writer Agent
//!
//! Renders `Findings` into a paginated A4 PDF report with `lopdf`.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{AnalysisRequest, Findings, Impact};
use crate::types::AppError;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const TOP: i64 = PAGE_HEIGHT - 60;

const MAX_GAPS: usize = 8;
const MAX_INSIGHTS: usize = 10;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF encoding failed: {0}")]
    Encode(String),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        AppError::ReportGeneration(err.to_string())
    }
}

#[async_trait]
pub trait ReportWriter: Send + Sync {
    /// Write the report for run `run_id` and return its path.
    async fn render(
        &self,
        run_id: Uuid,
        request: &AnalysisRequest,
        findings: &Findings,
    ) -> Result<String, ReportError>;
}

pub struct PdfReportWriter {
    output_dir: PathBuf,
}

impl PdfReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn build_document(request: &AnalysisRequest, findings: &Findings) -> Result<Vec<u8>, ReportError> {
        let lines = layout(request, findings);
        let pages = paginate(&lines);

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let bold_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular_id,
                "F2" => bold_id,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for operations in pages {
            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|e| ReportError::Encode(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = Object::Integer(kids.len() as i64);
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| ReportError::Encode(e.to_string()))?;
        Ok(bytes)
    }
}

#[async_trait]
impl ReportWriter for PdfReportWriter {
    async fn render(
        &self,
        run_id: Uuid,
        request: &AnalysisRequest,
        findings: &Findings,
    ) -> Result<String, ReportError> {
        let bytes = Self::build_document(request, findings)?;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let filename = report_filename(run_id);
        let path = self.output_dir.join(filename);
        tokio::fs::write(&path, &bytes).await?;

        info!(path = %path.display(), bytes = bytes.len(), "Report written");
        Ok(path.display().to_string())
    }
}

/// `honeywell_analysis_<YYYYmmdd_HHMMSS>_<first 8 hex of the run id>.pdf`
pub fn report_filename(run_id: Uuid) -> String {
    let run_tag = run_id.simple().to_string();
    format!(
        "honeywell_analysis_{}_{}.pdf",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &run_tag[..8]
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Line {
    font: Font,
    size: i64,
    indent: i64,
    text: String,
}

struct Layout {
    lines: Vec<Line>,
}

impl Layout {
    fn push(&mut self, font: Font, size: i64, indent: i64, text: &str) {
        let usable = PAGE_WIDTH - 2 * MARGIN - indent;
        // Helvetica averages roughly half an em per glyph
        let max_chars = (usable * 2 / size).max(20) as usize;
        for wrapped in wrap(&sanitize(text), max_chars) {
            self.lines.push(Line {
                font,
                size,
                indent,
                text: wrapped,
            });
        }
    }

    fn title(&mut self, text: &str) {
        self.push(Font::Bold, 18, 0, text);
    }

    fn heading(&mut self, text: &str) {
        self.blank();
        self.push(Font::Bold, 14, 0, text);
    }

    fn body(&mut self, text: &str) {
        self.push(Font::Regular, 10, 0, text);
    }

    fn indented(&mut self, text: &str) {
        self.push(Font::Regular, 10, 18, text);
    }

    fn blank(&mut self) {
        self.lines.push(Line {
            font: Font::Regular,
            size: 10,
            indent: 0,
            text: String::new(),
        });
    }
}

fn confidence_band(score: f64) -> &'static str {
    if score >= 0.8 {
        "High"
    } else if score >= 0.6 {
        "Medium"
    } else {
        "Low"
    }
}

fn layout(request: &AnalysisRequest, findings: &Findings) -> Vec<Line> {
    let mut doc = Layout { lines: Vec::new() };

    doc.title("Competitive Intelligence Report");
    doc.push(
        Font::Regular,
        12,
        0,
        &format!("{} vs {}", request.honeywell_product, request.competitor_query),
    );
    doc.blank();
    doc.body(&format!("Product: {}", request.honeywell_product));
    doc.body(&format!("Analysis: {}", request.competitor_query));
    doc.body(&format!("Generated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));
    doc.body(&format!(
        "Confidence: {:.0}% ({})",
        findings.confidence_score * 100.0,
        confidence_band(findings.confidence_score)
    ));
    doc.body(&format!("Data sources: {}", findings.data_sources_used.len()));

    doc.heading("Executive Summary");
    doc.body(&findings.summary);

    doc.heading("Competitive Gaps");
    if findings.competitive_gaps.is_empty() {
        doc.body("No significant competitive gaps identified.");
    }
    for (i, gap) in findings.competitive_gaps.iter().take(MAX_GAPS).enumerate() {
        let impact = match gap.impact {
            Impact::High => "High",
            Impact::Medium => "Medium",
            Impact::Low => "Low",
        };
        doc.body(&format!("{}. [{}] {}: {}", i + 1, impact, gap.category, gap.gap));
        doc.indented(&format!("Metric: {}", gap.metric));
        doc.indented(&format!("Opportunity: {}", gap.opportunity));
    }

    doc.heading("Key Insights");
    if findings.insights.is_empty() {
        doc.body("No insights were generated.");
    }
    for insight in findings.insights.iter().take(MAX_INSIGHTS) {
        doc.body(&format!("- {}", insight));
    }

    doc.heading("Strategic Recommendations");
    for (i, recommendation) in findings.recommendations.iter().enumerate() {
        doc.body(&format!("{}. {}", i + 1, recommendation));
    }

    doc.heading("Data Sources");
    for source in &findings.data_sources_used {
        doc.body(&format!("- {}", source));
    }

    doc.heading("Analysis Details");
    doc.body(&format!("Competitive gaps identified: {}", findings.competitive_gaps.len()));
    doc.body(&format!("Insights generated: {}", findings.insights.len()));
    doc.body(&format!(
        "Partial data: {}",
        if findings.degraded { "yes" } else { "no" }
    ));
    doc.body(&format!("Analysis timestamp: {}", findings.timestamp.to_rfc3339()));

    doc.lines
}

fn paginate(lines: &[Line]) -> Vec<Vec<Operation>> {
    let mut pages = Vec::new();
    let mut operations = Vec::new();
    let mut y = TOP;

    for line in lines {
        let step = line.size + 4;
        if y - step < MARGIN {
            pages.push(std::mem::take(&mut operations));
            y = TOP;
        }
        y -= step;

        if line.text.is_empty() {
            continue;
        }
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![
                Object::Name(line.font.resource().to_vec()),
                Object::Integer(line.size),
            ],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Integer(MARGIN + line.indent), Object::Integer(y)],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.text.as_str())]));
        operations.push(Operation::new("ET", vec![]));
    }

    pages.push(operations);
    pages
}

/// Reduce text to what the standard Type1 fonts can show.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\u{2013}' | '\u{2014}' => Some('-'),
            '\u{2018}' | '\u{2019}' => Some('\''),
            '\u{201C}' | '\u{201D}' => Some('"'),
            '\n' | '\t' => Some(' '),
            c if c.is_ascii() && !c.is_ascii_control() => Some(c),
            _ => None,
        })
        .collect()
}

fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let (head, tail) = word.split_at(max_chars);
            lines.push(head.to_string());
            word = tail;
        }

        if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CompetitiveGap;
    use std::collections::BTreeSet;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("TFE731 Engine", "compare with Pratt & Whitney PW500").unwrap()
    }

    fn findings(insight_count: usize) -> Findings {
        Findings {
            honeywell_product: "TFE731 Engine".into(),
            competitor_query: "compare with Pratt & Whitney PW500".into(),
            competitive_gaps: vec![CompetitiveGap {
                category: "Profitability".into(),
                gap: "Superior profit margins".into(),
                metric: "10.0% higher profit margin".into(),
                impact: Impact::High,
                opportunity: "Operational efficiency advantage".into(),
            }],
            insights: (0..insight_count)
                .map(|i| format!("Insight {} about the midsize business jet engine market \u{2014} with detail", i))
                .collect(),
            recommendations: vec!["Monitor and improve operational efficiency metrics".into()],
            confidence_score: 0.82,
            data_sources_used: ["yfinance".to_string()].into_iter().collect::<BTreeSet<_>>(),
            degraded: false,
            summary: "Found 1 gaps, 3 insights, 82% confidence".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
        let long = wrap(&"x".repeat(25), 10);
        assert_eq!(long.len(), 3);
        assert_eq!(wrap("", 10), vec![String::new()]);
    }

    #[test]
    fn test_sanitize_keeps_ascii() {
        assert_eq!(sanitize("Pratt & Whitney \u{2014} PW500\u{2122}"), "Pratt & Whitney - PW500");
    }

    #[test]
    fn test_build_document_is_loadable_pdf() {
        let bytes = PdfReportWriter::build_document(&request(), &findings(3)).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_long_reports_paginate() {
        // Many long insights are capped at ten, so push the summary instead
        let mut long = findings(10);
        long.summary = "Extended summary sentence for pagination. ".repeat(200);
        let bytes = PdfReportWriter::build_document(&request(), &long).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[tokio::test]
    async fn test_render_writes_named_report() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PdfReportWriter::new(dir.path().join("reports"));
        let run_id = Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap();

        let path = writer.render(run_id, &request(), &findings(2)).await.unwrap();

        let file_name = std::path::Path::new(&path).file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("honeywell_analysis_"));
        assert!(file_name.ends_with("_3f2a9c1e.pdf"));
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_render_fails_when_directory_is_unusable() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // A regular file cannot serve as the report directory
        let writer = PdfReportWriter::new(file.path());

        let err = writer.render(Uuid::new_v4(), &request(), &findings(1)).await.unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
