//! Validator Agent
//!
//! Scores every gathered source and decides whether the data is good enough
//! to analyze. Pure and deterministic: the same `AggregatedData` always
//! yields the same verdict.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::config::ValidationConfig;
use crate::models::{AggregatedData, QualityVerdict, SourceKind, ToolResult};
use crate::tools::{FinancialPayload, NewsPayload, SpecsPayload};
use crate::tools::specs::STATUS_COMPLETED;

const FINANCIAL_MAX_SCORE: f64 = 10.0;
const NEWS_MAX_SCORE: f64 = 6.0;
const SPECS_MAX_SCORE: f64 = 6.0;

pub struct ValidatorAgent {
    policy: ValidationConfig,
}

impl ValidatorAgent {
    pub fn new(policy: ValidationConfig) -> Self {
        Self { policy }
    }

    pub fn assess(&self, data: &AggregatedData, attempt_number: u32) -> QualityVerdict {
        let mut source_scores = BTreeMap::new();
        let mut missing_areas = BTreeSet::new();
        let mut satisfied_kinds = BTreeSet::new();

        for result in data.iter() {
            let score = quality_score(result);
            source_scores.insert(result.source_name.clone(), score);

            let satisfied = result.is_ok() && result.has_payload() && score >= self.policy.source_threshold;
            if satisfied {
                satisfied_kinds.insert(result.kind);
            } else {
                warn!(
                    source = %result.source_name,
                    status = ?result.status,
                    score = score,
                    "Source failed quality check"
                );
                missing_areas.insert(result.source_name.clone());
            }
        }

        let total = data.len();
        let satisfied = total - missing_areas.len();
        let satisfied_ratio = if total == 0 {
            0.0
        } else {
            satisfied as f64 / total as f64
        };
        let passed = total > 0 && satisfied_ratio >= self.policy.pass_ratio;

        let recommendations = recommendations(
            &source_scores,
            self.policy.source_threshold,
            satisfied_kinds.len(),
            total,
        );

        info!(
            attempt = attempt_number,
            passed = passed,
            satisfied = satisfied,
            total = total,
            missing = ?missing_areas,
            "Validation complete"
        );

        QualityVerdict {
            passed,
            missing_areas,
            attempt_number,
            source_scores,
            satisfied_ratio,
            recommendations,
        }
    }
}

/// Kind-specific quality score in [0, 1].
///
/// Anything that is not an ok result with a payload of the expected shape
/// scores zero.
pub fn quality_score(result: &ToolResult) -> f64 {
    if !result.is_ok() {
        return 0.0;
    }
    let Some(payload) = result.payload.clone() else {
        return 0.0;
    };

    let score = match result.kind {
        SourceKind::Financial => serde_json::from_value::<FinancialPayload>(payload)
            .map(|p| score_financial(&p) / FINANCIAL_MAX_SCORE),
        SourceKind::News => {
            serde_json::from_value::<NewsPayload>(payload).map(|p| score_news(&p) / NEWS_MAX_SCORE)
        }
        SourceKind::ProductSpecs => {
            serde_json::from_value::<SpecsPayload>(payload).map(|p| score_specs(&p) / SPECS_MAX_SCORE)
        }
    };

    match score {
        Ok(score) => {
            debug!(source = %result.source_name, score = score, "Quality score");
            score.clamp(0.0, 1.0)
        }
        Err(e) => {
            warn!(source = %result.source_name, error = %e, "Payload does not match expected shape");
            0.0
        }
    }
}

fn positive(value: Option<f64>) -> bool {
    value.is_some_and(|v| v > 0.0)
}

fn score_financial(payload: &FinancialPayload) -> f64 {
    let mut score = 0.0;

    for company in std::iter::once(&payload.honeywell).chain(payload.competitor.as_ref()) {
        if company.company_name.as_deref().is_some_and(|n| !n.is_empty()) && positive(company.current_price) {
            score += 2.0;
        }
        if positive(company.market_cap) {
            score += 1.0;
        }
    }

    let comparison = &payload.comparison;
    if comparison.market_cap_ratio.is_some_and(|r| r != 0.0) {
        score += 1.0;
    }
    if comparison.pe_ratio_difference.is_some() {
        score += 1.0;
    }
    if comparison.profit_margin_difference.is_some() {
        score += 1.0;
    }
    let competitor_revenue = payload.competitor.as_ref().and_then(|c| c.revenue);
    if positive(payload.honeywell.revenue) && positive(competitor_revenue) {
        score += 1.0;
    }

    score
}

fn score_news(payload: &NewsPayload) -> f64 {
    if payload.articles.is_empty() {
        return 0.0;
    }

    let mut score = 5.0;
    for article in payload.articles.iter().take(2) {
        if article.content.chars().count() > 20 {
            score += 0.25;
        }
        if article.title.chars().count() > 5 {
            score += 0.25;
        }
    }
    score
}

fn score_specs(payload: &SpecsPayload) -> f64 {
    if payload.pages.is_empty() {
        return 0.0;
    }

    let mut score = 2.0;
    for page in &payload.pages {
        if page.status == STATUS_COMPLETED {
            score += 1.0;
        }
        if !page.specs.is_empty() {
            score += 1.0;
        }
        if page.price.is_some() {
            score += 1.0;
        }
        if page.date.is_some() {
            score += 1.0;
        }
    }
    score
}

fn recommendations(
    source_scores: &BTreeMap<String, f64>,
    threshold: f64,
    satisfied_kinds: usize,
    total: usize,
) -> Vec<String> {
    let mut recommendations: Vec<String> = source_scores
        .iter()
        .filter(|(_, score)| **score < threshold)
        .map(|(name, score)| format!("Consider retrying {} (quality score: {:.2})", name, score))
        .collect();

    if total == 0 {
        recommendations.push("No data sources available - scout may need to retry all tools".to_string());
    } else if satisfied_kinds < 2 {
        recommendations.push("Limited data diversity - consider adding more data sources".to_string());
    }

    if recommendations.is_empty() {
        recommendations.push("Data quality is acceptable for analysis".to_string());
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support::{aggregated, ok_financial, ok_news, ok_specs};
    use crate::tools::{financial, news};
    use serde_json::json;

    fn validator() -> ValidatorAgent {
        ValidatorAgent::new(ValidationConfig::default())
    }

    #[test]
    fn test_all_sources_satisfied_passes() {
        let data = aggregated(vec![ok_financial(), ok_news(), ok_specs()]);
        let verdict = validator().assess(&data, 1);

        assert!(verdict.passed);
        assert!(verdict.missing_areas.is_empty());
        assert_eq!(verdict.attempt_number, 1);
        assert_eq!(verdict.satisfied_ratio, 1.0);
        assert_eq!(verdict.recommendations, vec!["Data quality is acceptable for analysis"]);
        for score in verdict.source_scores.values() {
            assert!((score - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_timed_out_source_is_missing() {
        let data = aggregated(vec![
            ToolResult::timed_out(financial::SOURCE_NAME, SourceKind::Financial, 60_000),
            ok_news(),
            ok_specs(),
        ]);
        let verdict = validator().assess(&data, 1);

        assert!(!verdict.passed);
        assert_eq!(
            verdict.missing_areas.iter().collect::<Vec<_>>(),
            vec![financial::SOURCE_NAME]
        );
        assert!(verdict.is_satisfied(news::SOURCE_NAME));
        assert!(verdict
            .recommendations
            .contains(&"Consider retrying yfinance (quality score: 0.00)".to_string()));
    }

    #[test]
    fn test_pass_ratio_is_configurable() {
        let lenient = ValidatorAgent::new(ValidationConfig {
            pass_ratio: 0.5,
            source_threshold: 0.6,
        });
        let data = aggregated(vec![
            ToolResult::failed(financial::SOURCE_NAME, SourceKind::Financial, "down"),
            ok_news(),
        ]);
        assert!(lenient.assess(&data, 1).passed);
        assert!(!validator().assess(&data, 1).passed);
    }

    #[test]
    fn test_empty_data_never_passes() {
        let lenient = ValidatorAgent::new(ValidationConfig {
            pass_ratio: 0.0,
            source_threshold: 0.0,
        });
        let verdict = lenient.assess(&aggregated(Vec::new()), 2);
        assert!(!verdict.passed);
        assert_eq!(verdict.attempt_number, 2);
        assert!(verdict.recommendations[0].starts_with("No data sources available"));
    }

    #[test]
    fn test_ok_but_wrong_shape_scores_zero() {
        let odd = ToolResult::ok(news::SOURCE_NAME, SourceKind::News, json!({"unexpected": true}));
        assert_eq!(quality_score(&odd), 0.0);

        let empty_news = ToolResult::ok(
            news::SOURCE_NAME,
            SourceKind::News,
            json!({"queries": [], "articles": [], "total_results": 0}),
        );
        assert_eq!(quality_score(&empty_news), 0.0);
        let verdict = validator().assess(&aggregated(vec![empty_news]), 1);
        assert!(verdict.missing_areas.contains(news::SOURCE_NAME));
    }

    #[test]
    fn test_financial_without_competitor_is_partial() {
        let mut payload: FinancialPayload =
            serde_json::from_value(crate::agents::test_support::financial_payload()).unwrap();
        payload.competitor = None;
        payload.comparison = Default::default();
        // Honeywell alone: name/price +2, market cap +1
        assert_eq!(score_financial(&payload), 3.0);

        let result = ToolResult::ok(
            financial::SOURCE_NAME,
            SourceKind::Financial,
            serde_json::to_value(payload).unwrap(),
        );
        assert!((quality_score(&result) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_assess_is_deterministic() {
        let data = aggregated(vec![
            ok_financial(),
            ToolResult::failed(news::SOURCE_NAME, SourceKind::News, "down"),
        ]);
        assert_eq!(validator().assess(&data, 1), validator().assess(&data, 1));
    }
}
