//! Analyst Agent
//!
//! Turns the satisfied sources of a run into competitive gaps, insights and
//! recommendations, and scores how far the result can be trusted.
//! Unsatisfied sources never contribute content; they only lower confidence.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{info, warn};

use super::validator::quality_score;
use crate::models::{AggregatedData, CompetitiveGap, Findings, Impact, QualityVerdict, SourceKind, ToolResult};
use crate::tools::{CompanySnapshot, FinancialPayload, NewsPayload, SpecsPayload};
use crate::types::{AppError, AppResult};

const COMPETITIVE_KEYWORDS: &[&str] = &["competition", "competitor", "market share", "advantage", "disadvantage"];
const TECHNOLOGY_KEYWORDS: &[&str] = &["technology", "innovation", "development", "breakthrough"];
const TECHNICAL_SPEC_KEYWORDS: &[&str] = &["thrust", "power", "efficiency"];

const DEGRADED_CONFIDENCE_FACTOR: f64 = 0.85;
const CONFIDENCE_FLOOR: f64 = 0.3;
const LOW_QUALITY_SCORE: f64 = 0.3;

#[derive(Default)]
struct Section {
    gaps: Vec<CompetitiveGap>,
    insights: Vec<String>,
}

impl Section {
    fn gap(&mut self, category: &str, gap: &str, metric: String, impact: Impact, opportunity: &str) {
        self.gaps.push(CompetitiveGap {
            category: category.to_string(),
            gap: gap.to_string(),
            metric,
            impact,
            opportunity: opportunity.to_string(),
        });
    }

    fn absorb(&mut self, other: Section) {
        self.gaps.extend(other.gaps);
        self.insights.extend(other.insights);
    }
}

pub struct AnalystAgent;

impl AnalystAgent {
    pub fn analyze(data: &AggregatedData, verdict: &QualityVerdict) -> AppResult<Findings> {
        let satisfied: Vec<&ToolResult> = data
            .iter()
            .filter(|r| verdict.is_satisfied(&r.source_name))
            .collect();

        if satisfied.is_empty() {
            warn!(sources = data.len(), "No satisfied sources to analyze");
            return Err(AppError::AnalysisFailure(format!(
                "none of {} sources met the quality threshold",
                data.len()
            )));
        }

        let mut section = Section::default();
        let mut data_sources_used = BTreeSet::new();
        let mut satisfied_kinds = BTreeSet::new();

        for result in &satisfied {
            let Some(payload) = result.payload.clone() else {
                continue;
            };
            let analyzed = match result.kind {
                SourceKind::Financial => serde_json::from_value::<FinancialPayload>(payload).map(|p| analyze_financial(&p)),
                SourceKind::News => serde_json::from_value::<NewsPayload>(payload).map(|p| analyze_news(&p)),
                SourceKind::ProductSpecs => serde_json::from_value::<SpecsPayload>(payload).map(|p| analyze_specs(&p)),
            };
            match analyzed {
                Ok(part) => {
                    section.absorb(part);
                    data_sources_used.insert(result.source_name.clone());
                    satisfied_kinds.insert(result.kind);
                }
                Err(e) => warn!(source = %result.source_name, error = %e, "Skipping unreadable payload"),
            }
        }

        let recommendations = strategic_recommendations(&section);
        let degraded = !verdict.passed;
        let confidence_score = confidence(data, &section, satisfied_kinds.len(), degraded);

        let summary = format!(
            "Found {} gaps, {} insights, {:.0}% confidence{}",
            section.gaps.len(),
            section.insights.len(),
            confidence_score * 100.0,
            if degraded {
                " (based on partial data)"
            } else {
                ""
            }
        );

        info!(
            gaps = section.gaps.len(),
            insights = section.insights.len(),
            confidence = confidence_score,
            degraded = degraded,
            "Analysis complete"
        );

        Ok(Findings {
            honeywell_product: data.request.honeywell_product.clone(),
            competitor_query: data.request.competitor_query.clone(),
            competitive_gaps: section.gaps,
            insights: section.insights,
            recommendations,
            confidence_score,
            data_sources_used,
            degraded,
            summary,
            timestamp: Utc::now(),
        })
    }
}

fn analyze_financial(payload: &FinancialPayload) -> Section {
    let mut section = Section::default();
    let comparison = &payload.comparison;

    if let Some(ratio) = comparison.market_cap_ratio.filter(|r| *r > 0.0) {
        if ratio > 1.5 {
            section.gap(
                "Market Position",
                "Significant market cap advantage over competitor",
                format!("{:.1}x larger market cap", ratio),
                Impact::High,
                "Leverage financial strength for R&D investment",
            );
        } else if ratio < 0.7 {
            section.gap(
                "Market Position",
                "Smaller market cap than competitor",
                format!("{:.1}x smaller market cap", 1.0 / ratio),
                Impact::Medium,
                "Focus on niche markets or cost efficiency",
            );
        }
    }

    if let Some(diff) = comparison.pe_ratio_difference.filter(|d| d.abs() > 5.0) {
        if diff > 0.0 {
            section.gap(
                "Valuation",
                "Higher P/E ratio indicates growth expectations",
                format!("P/E ratio {:.1} points higher", diff),
                Impact::Medium,
                "Investor confidence in growth prospects",
            );
        } else {
            section.gap(
                "Valuation",
                "Lower P/E ratio may indicate undervaluation",
                format!("P/E ratio {:.1} points lower", diff.abs()),
                Impact::Medium,
                "Potential value investment opportunity",
            );
        }
    }

    if let Some(diff) = comparison.profit_margin_difference.filter(|d| d.abs() > 0.05) {
        if diff > 0.0 {
            section.gap(
                "Profitability",
                "Superior profit margins",
                format!("{:.1}% higher profit margin", diff * 100.0),
                Impact::High,
                "Operational efficiency advantage",
            );
        } else {
            section.gap(
                "Profitability",
                "Lower profit margins than competitor",
                format!("{:.1}% lower profit margin", diff.abs() * 100.0),
                Impact::High,
                "Focus on cost optimization and pricing",
            );
        }
    }

    if let Some(competitor) = &payload.competitor {
        if let Some(ratio) = comparison.revenue_ratio.filter(|r| *r > 0.0) {
            if ratio >= 1.0 {
                section
                    .insights
                    .push(format!("Revenue comparison shows Honeywell has {:.1}x the competitor's revenue scale", ratio));
            } else {
                section
                    .insights
                    .push(format!("Revenue comparison shows the competitor has {:.1}x Honeywell's revenue scale", 1.0 / ratio));
            }
        }

        if let (Some(ours), Some(theirs)) = (
            payload.honeywell.pe_ratio.filter(|p| *p > 0.0),
            competitor.pe_ratio.filter(|p| *p > 0.0),
        ) {
            section.insights.push(format!(
                "Valuation comparison: Honeywell P/E {:.1} vs Competitor P/E {:.1}",
                ours, theirs
            ));
        }
    }

    section.insights.extend(company_insights(&payload.honeywell, "Honeywell"));
    if let Some(competitor) = &payload.competitor {
        let label = competitor.company_name.as_deref().unwrap_or("Competitor");
        section.insights.extend(company_insights(competitor, label));
    }

    section
}

fn company_insights(company: &CompanySnapshot, label: &str) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(market_cap) = company.market_cap {
        if market_cap > 100e9 {
            insights.push(format!(
                "{} is a large-cap company with significant market presence (${:.1}B market cap)",
                label,
                market_cap / 1e9
            ));
        } else if market_cap > 10e9 {
            insights.push(format!(
                "{} is a mid-to-large cap company (${:.1}B market cap)",
                label,
                market_cap / 1e9
            ));
        }
    }

    if let Some(margin) = company.profit_margin {
        let pct = margin * 100.0;
        if margin > 0.15 {
            insights.push(format!("{} shows strong profitability with {:.1}% profit margins", label, pct));
        } else if margin > 0.05 {
            insights.push(format!("{} maintains reasonable profitability with {:.1}% profit margins", label, pct));
        } else if margin > 0.0 {
            insights.push(format!("{} has modest profitability with {:.1}% profit margins", label, pct));
        }
    }

    if let Some(pe) = company.pe_ratio {
        if (15.0..=25.0).contains(&pe) {
            insights.push(format!("{} has reasonable valuation with P/E ratio of {:.1}", label, pe));
        } else if pe > 25.0 {
            insights.push(format!("{} has high growth expectations with P/E ratio of {:.1}", label, pe));
        } else if pe > 0.0 {
            insights.push(format!("{} appears undervalued with P/E ratio of {:.1}", label, pe));
        }
    }

    if let Some(change) = company.price_change_percent.filter(|c| c.abs() > 5.0) {
        let direction = if change > 0.0 { "positive" } else { "negative" };
        insights.push(format!(
            "{} shows {} recent performance with {:.1}% price change",
            label, direction, change
        ));
    }

    insights
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn mentions_any(haystacks: &[&str], keywords: &[&str]) -> bool {
    haystacks
        .iter()
        .any(|h| keywords.iter().any(|k| h.contains(k)))
}

fn analyze_news(payload: &NewsPayload) -> Section {
    let mut section = Section::default();
    let articles = &payload.articles;
    if articles.is_empty() {
        return section;
    }

    for article in articles.iter().take(5) {
        let title = article.title.to_lowercase();
        let content = article.content.to_lowercase();
        let text = [title.as_str(), content.as_str()];

        if mentions_any(&text, COMPETITIVE_KEYWORDS) {
            section
                .insights
                .push(format!("News analysis: {}...", truncate(&article.title, 100)));
        }
        if mentions_any(&text, TECHNOLOGY_KEYWORDS) {
            section
                .insights
                .push(format!("Technology trend identified: {}...", truncate(&article.title, 80)));
        }
    }

    if articles.len() >= 3 {
        section
            .insights
            .push(format!("Strong news coverage with {} relevant articles found", articles.len()));
    } else {
        section.gap(
            "Market Intelligence",
            "Limited recent news coverage",
            format!("Only {} relevant articles", articles.len()),
            Impact::Medium,
            "Monitor industry news more closely for competitive intelligence",
        );
    }

    section
}

fn analyze_specs(payload: &SpecsPayload) -> Section {
    let mut section = Section::default();
    if payload.pages.is_empty() {
        return section;
    }

    let mut price_found = false;
    for page in &payload.pages {
        if !page.specs.is_empty() {
            section.insights.push(format!(
                "Product specifications found: {} key features identified",
                page.specs.len()
            ));
            for spec in &page.specs {
                let lower = spec.to_lowercase();
                if TECHNICAL_SPEC_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    section
                        .insights
                        .push(format!("Technical specification: {}...", truncate(spec, 60)));
                }
            }
        }

        if let Some(price) = &page.price {
            price_found = true;
            section.insights.push(format!("Pricing information available: {}", price));
        }

        if let Some(date) = &page.date {
            section
                .insights
                .push(format!("Product timeline: first flight/launch in {}", date));
        }
    }

    if !price_found {
        section.gap(
            "Pricing Intelligence",
            "Product pricing not publicly available",
            "Price data missing".to_string(),
            Impact::Medium,
            "Consider alternative pricing research methods",
        );
    }

    if section.insights.is_empty() {
        section.gap(
            "Product Intelligence",
            "Limited product specification data",
            "Specifications not found".to_string(),
            Impact::High,
            "Expand product research sources",
        );
    }

    section
}

fn strategic_recommendations(section: &Section) -> Vec<String> {
    let mut recommendations = Vec::new();

    if section.gaps.iter().any(|g| g.impact == Impact::High) {
        recommendations.push("Focus on high-impact competitive gaps identified in the analysis".to_string());
    }
    if section.gaps.iter().any(|g| g.impact == Impact::Medium) {
        recommendations.push("Consider medium-impact opportunities for strategic advantage".to_string());
    }

    let any_insight = |needle: &str| section.insights.iter().any(|i| i.to_lowercase().contains(needle));
    if any_insight("profitability") {
        recommendations.push("Monitor and improve operational efficiency metrics".to_string());
    }
    if any_insight("market cap") {
        recommendations.push("Leverage market position for strategic investments".to_string());
    }
    if any_insight("valuation") {
        recommendations.push("Consider valuation metrics in strategic planning".to_string());
    }

    if recommendations.is_empty() {
        recommendations.push("Continue monitoring competitive landscape for emerging opportunities".to_string());
    }

    recommendations
}

/// Confidence in [0, 1], non-decreasing as sources become satisfied.
fn confidence(data: &AggregatedData, section: &Section, satisfied_kinds: usize, degraded: bool) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let scores: Vec<f64> = data.iter().map(quality_score).collect();
    let mean_quality = scores.iter().sum::<f64>() / scores.len() as f64;

    let evidence = section.gaps.len() + section.insights.len();
    let evidence_bonus = (0.02 * evidence as f64).min(0.2);
    let diversity_bonus = (0.05 * satisfied_kinds as f64).min(0.15);
    let low_quality_penalty = 0.1 * scores.iter().filter(|s| **s < LOW_QUALITY_SCORE).count() as f64;

    let mut confidence = (mean_quality + evidence_bonus + diversity_bonus - low_quality_penalty).clamp(0.0, 1.0);
    if degraded {
        confidence *= DEGRADED_CONFIDENCE_FACTOR;
    }
    if evidence > 0 {
        confidence = confidence.max(CONFIDENCE_FLOOR);
    }
    confidence
}
