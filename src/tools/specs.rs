//! Product Specification Search
//!
//! Looks up competitor product specifications through SerpAPI Google search
//! and extracts what the result snippets reveal:
//! - Spec lines mentioning thrust, power, weight, fuel and similar metrics
//! - A list price when one is quoted
//! - A year that dates the product or the page
//!
//! The competitor product is derived from the free-text competitor query by
//! dropping comparison phrases ("compare with", "vs") and manufacturer names.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serpapi_search_rust::serp_api_search::SerpApiSearch;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{into_tool_result, ToolAdapter, ToolError};
use crate::models::{AnalysisRequest, SourceKind, ToolResult};

pub const SOURCE_NAME: &str = "product_specs";

pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_NO_CONTENT: &str = "no_content";

const SPEC_KEYWORDS: &[&str] = &[
    "thrust",
    "power",
    "weight",
    "fuel",
    "pressure",
    "temperature",
    "rpm",
    "diameter",
    "length",
    "height",
];

const REMOVED_PHRASES: &[&str] = &[
    "compare with",
    "compared to",
    "compared with",
    "vs",
    "versus",
    "against",
    "pratt & whitney",
    "pratt and whitney",
    "rolls-royce",
    "rolls royce",
    "general electric",
    "williams",
    "collins",
    "honeywell",
    "safran",
    "mtu",
];

const PRICE_UNITS: &[(&str, &str)] = &[
    ("million", "million"),
    ("billion", "billion"),
    ("m ", "million"),
    ("b ", "billion"),
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_SPECS_PER_PAGE: usize = 5;
const EARLIEST_YEAR: i32 = 1950;
const LATEST_YEAR: i32 = 2035;

/// One search hit with the specification details found in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecPage {
    pub title: String,
    pub url: String,
    pub source: Option<String>,
    /// "completed" when the page had content to extract from
    pub status: String,
    pub specs: Vec<String>,
    pub price: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecsPayload {
    pub competitor_product: String,
    pub search_query: String,
    pub pages: Vec<SpecPage>,
}

/// SerpAPI-backed specification lookup
pub struct SpecsAdapter {
    api_key: String,
    max_results: usize,
    timeout: Duration,
}

impl SpecsAdapter {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            max_results: 5,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Upper bound on one SerpAPI call, including the blocking thread it runs on
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum pages kept per search
    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    async fn google(&self, query: &str) -> Result<Value, ToolError> {
        let mut params = HashMap::<String, String>::new();
        params.insert("engine".to_string(), "google".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("hl".to_string(), "en".to_string());
        params.insert("gl".to_string(), "us".to_string());
        params.insert("num".to_string(), self.max_results.to_string());

        let api_key = self.api_key.clone();
        block_on_bounded(self.timeout, move || async move {
            SerpApiSearch::google(params, api_key)
                .json()
                .await
                .map_err(|e| e.to_string())
        })
        .await
    }

    async fn fetch(&self, request: &AnalysisRequest) -> Result<SpecsPayload, ToolError> {
        if self.api_key.is_empty() {
            return Err(ToolError::NoApiKey);
        }

        let competitor_product = extract_competitor_product(&request.competitor_query);
        let search_query = format!("{} specifications", competitor_product);
        info!(query = %search_query, "Searching product specifications via SerpAPI");

        let results = self.google(&search_query).await?;
        debug!("Raw Google response received");

        let pages = parse_organic_results(&results, self.max_results)?;
        info!(
            pages = pages.len(),
            with_specs = pages.iter().filter(|p| !p.specs.is_empty()).count(),
            "Product specification search completed"
        );

        Ok(SpecsPayload {
            competitor_product,
            search_query,
            pages,
        })
    }
}

#[async_trait]
impl ToolAdapter for SpecsAdapter {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ProductSpecs
    }

    async fn invoke(&self, request: &AnalysisRequest) -> ToolResult {
        let started = Instant::now();
        let outcome = self.fetch(request).await;
        into_tool_result(SOURCE_NAME, SourceKind::ProductSpecs, outcome)
            .with_elapsed_ms(started.elapsed().as_millis() as u64)
    }
}

/// Drive a non-Send future on a blocking thread, giving up after `timeout`.
///
/// The timeout is applied inside the blocking thread, so the thread is
/// released when it fires even if the caller has already stopped waiting.
async fn block_on_bounded<F, Fut, T>(timeout: Duration, make: F) -> Result<T, ToolError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, String>>,
    T: Send + 'static,
{
    let handle = tokio::runtime::Handle::current();
    let outcome = tokio::task::spawn_blocking(move || {
        handle.block_on(async move { tokio::time::timeout(timeout, make()).await })
    })
    .await
    .map_err(|e| ToolError::RequestFailed(e.to_string()))?;

    match outcome {
        Ok(result) => result.map_err(ToolError::RequestFailed),
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "SerpAPI request timed out");
            Err(ToolError::RequestFailed(format!(
                "SerpAPI request timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}

fn parse_organic_results(results: &Value, max_results: usize) -> Result<Vec<SpecPage>, ToolError> {
    if results.get("error").is_some() {
        // The error text can name the account; keep it out of the result
        return Err(ToolError::RequestFailed("SerpAPI returned an error".to_string()));
    }

    let organic_results = results.get("organic_results").ok_or(ToolError::NoResults)?;

    let results_array = organic_results
        .as_array()
        .ok_or_else(|| ToolError::ParseError("Expected array of results".to_string()))?;

    if results_array.is_empty() {
        return Err(ToolError::NoResults);
    }

    let pages = results_array
        .iter()
        .take(max_results)
        .map(|result| {
            let title = result
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled")
                .to_string();

            let snippet = result
                .get("snippet")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let url = result
                .get("link")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let source = result
                .get("source")
                .and_then(|v| v.as_str())
                .map(String::from)
                .or_else(|| url.split('/').nth(2).map(String::from));

            let text = format!("{}. {}", title, snippet);
            let date = result
                .get("date")
                .and_then(|v| v.as_str())
                .map(String::from)
                .or_else(|| extract_year(&text).map(|y| y.to_string()));

            SpecPage {
                status: if snippet.trim().is_empty() {
                    STATUS_NO_CONTENT.to_string()
                } else {
                    STATUS_COMPLETED.to_string()
                },
                specs: extract_specs(&snippet),
                price: extract_price(&text),
                title,
                url,
                source,
                date,
            }
        })
        .collect();

    Ok(pages)
}

fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| c == '.' || c == ',' || c == ':')
        .to_lowercase()
}

/// Strip comparison phrases and manufacturer names from a competitor query.
///
/// Falls back to the trimmed query when nothing is left.
pub fn extract_competitor_product(competitor_query: &str) -> String {
    let tokens: Vec<&str> = competitor_query.split_whitespace().collect();
    let normalized: Vec<String> = tokens.iter().map(|t| normalize_token(t)).collect();
    let phrases: Vec<Vec<&str>> = REMOVED_PHRASES
        .iter()
        .map(|p| p.split_whitespace().collect())
        .collect();

    let mut kept = Vec::new();
    let mut i = 0;
    'outer: while i < tokens.len() {
        for phrase in &phrases {
            let end = i + phrase.len();
            if end <= tokens.len() && normalized[i..end].iter().zip(phrase).all(|(t, p)| t == p) {
                i = end;
                continue 'outer;
            }
        }
        kept.push(tokens[i]);
        i += 1;
    }

    let product = kept.join(" ");
    if product.is_empty() {
        competitor_query.trim().to_string()
    } else {
        product
    }
}

/// Sentences of `text` that mention a specification keyword
fn extract_specs(text: &str) -> Vec<String> {
    let mut specs: Vec<String> = Vec::new();
    for segment in text
        .split(|c: char| matches!(c, ';' | '|' | '\n' | '·' | '•'))
        .flat_map(|s| s.split(". "))
    {
        let segment = segment.trim().trim_end_matches('.').trim();
        if segment.is_empty() {
            continue;
        }
        let lower = segment.to_lowercase();
        if SPEC_KEYWORDS.iter().any(|k| lower.contains(k)) && !specs.iter().any(|s| s == segment) {
            specs.push(segment.to_string());
        }
        if specs.len() == MAX_SPECS_PER_PAGE {
            break;
        }
    }
    specs
}

/// First dollar amount in `text`, with a trailing million/billion unit if present
fn extract_price(text: &str) -> Option<String> {
    let start = text.find('$')?;
    let rest = &text[start + 1..];
    let amount: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    let amount = amount.trim_end_matches(['.', ',']);
    if !amount.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let tail = rest[amount.len()..].trim_start().to_lowercase();
    let unit = PRICE_UNITS
        .iter()
        .find(|(prefix, _)| tail.starts_with(prefix))
        .map(|(_, unit)| *unit);

    Some(match unit {
        Some(unit) => format!("${} {}", amount, unit),
        None => format!("${}", amount),
    })
}

fn extract_year(text: &str) -> Option<i32> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|part| part.len() == 4)
        .filter_map(|y| y.parse::<i32>().ok())
        .find(|y| (EARLIEST_YEAR..=LATEST_YEAR).contains(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_competitor_product() {
        assert_eq!(extract_competitor_product("compare with Pratt & Whitney PW500"), "PW500");
        assert_eq!(extract_competitor_product("Williams FJ44 series"), "FJ44 series");
        assert_eq!(extract_competitor_product("vs. Rolls-Royce Pearl 700"), "Pearl 700");
        assert_eq!(extract_competitor_product("GE Passport"), "GE Passport");
        // Words that merely contain a phrase are kept
        assert_eq!(extract_competitor_product("Versatile APU"), "Versatile APU");
        assert_eq!(extract_competitor_product("compare with"), "compare with");
    }

    #[test]
    fn test_extract_specs() {
        let snippet = "The PW535 produces 3,400 lbf of thrust. Dry weight is 700 lb; bypass ratio 2.6. Certified in 1993";
        let specs = extract_specs(snippet);
        assert_eq!(specs, vec!["The PW535 produces 3,400 lbf of thrust", "Dry weight is 700 lb"]);
        assert!(extract_specs("A light business jet engine family").is_empty());
    }

    #[test]
    fn test_extract_price() {
        assert_eq!(extract_price("Unit cost: $2.5 million per engine"), Some("$2.5 million".to_string()));
        assert_eq!(extract_price("priced at $850,000."), Some("$850,000".to_string()));
        assert_eq!(extract_price("costs $ unknown"), None);
        assert_eq!(extract_price("no pricing"), None);
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("entered service in 1993 with Cessna"), Some(1993));
        assert_eq!(extract_year("3400 lbf thrust"), None);
        assert_eq!(extract_year("no date"), None);
    }

    #[test]
    fn test_parse_organic_results() {
        let results = json!({
            "organic_results": [
                {
                    "title": "Pratt & Whitney Canada PW500 - Wikipedia",
                    "link": "https://en.wikipedia.org/wiki/Pratt_%26_Whitney_Canada_PW500",
                    "snippet": "Takeoff thrust 2,900-4,500 lbf. Introduced 1993. Unit cost $1.2 million"
                },
                {
                    "title": "PW500 brochure",
                    "link": "https://www.prattwhitney.com/pw500",
                    "source": "Pratt & Whitney",
                    "snippet": ""
                }
            ]
        });

        let pages = parse_organic_results(&results, 5).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].status, STATUS_COMPLETED);
        assert_eq!(pages[0].specs, vec!["Takeoff thrust 2,900-4,500 lbf"]);
        assert_eq!(pages[0].price.as_deref(), Some("$1.2 million"));
        assert_eq!(pages[0].date.as_deref(), Some("1993"));
        assert_eq!(pages[0].source.as_deref(), Some("en.wikipedia.org"));
        assert_eq!(pages[1].status, STATUS_NO_CONTENT);
        assert_eq!(pages[1].source.as_deref(), Some("Pratt & Whitney"));
    }

    #[test]
    fn test_parse_organic_results_errors() {
        assert!(matches!(
            parse_organic_results(&json!({"organic_results": []}), 5),
            Err(ToolError::NoResults)
        ));
        let err = parse_organic_results(&json!({"error": "Invalid API key for user@example.com"}), 5).unwrap_err();
        assert!(!err.to_string().contains("example.com"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_search_stops_at_timeout() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let started = Instant::now();

        let outcome: Result<Value, ToolError> = block_on_bounded(Duration::from_millis(50), move || async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(json!({}))
        })
        .await;

        // Returning means the blocking thread itself has finished
        assert!(started.elapsed() < Duration::from_millis(400));
        assert!(matches!(outcome, Err(ToolError::RequestFailed(ref msg)) if msg.contains("timed out")));

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_search_passes_result_through() {
        let ok: Result<u32, ToolError> = block_on_bounded(Duration::from_secs(1), || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u32, ToolError> =
            block_on_bounded(Duration::from_secs(1), || async { Err("quota exceeded".to_string()) }).await;
        assert!(matches!(err, Err(ToolError::RequestFailed(ref msg)) if msg == "quota exceeded"));
    }
}
