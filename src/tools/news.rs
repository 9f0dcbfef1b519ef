// Tavily news adapter
// Searches aviation trade press for coverage of the product and competitor.
// API Reference: https://docs.tavily.com/documentation/api-reference/endpoint/search

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{into_tool_result, ToolAdapter, ToolError};
use crate::models::{AnalysisRequest, SourceKind, ToolResult};

pub const SOURCE_NAME: &str = "tavily_news";

const RESULTS_PER_QUERY: usize = 3;

const NEWS_DOMAINS: &[&str] = &[
    "reuters.com",
    "bloomberg.com",
    "wsj.com",
    "ft.com",
    "aviationweek.com",
    "flightglobal.com",
    "ainonline.com",
];

const EXCLUDED_DOMAINS: &[&str] = &["wikipedia.org", "reddit.com"];

#[derive(Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    topic: &'a str,
    max_results: usize,
    include_domains: &'a [&'a str],
    exclude_domains: &'a [&'a str],
}

#[derive(Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub content: String,
    pub published_date: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPayload {
    pub queries: Vec<String>,
    pub articles: Vec<NewsArticle>,
    pub total_results: usize,
}

pub struct NewsAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    max_results: usize,
}

impl NewsAdapter {
    pub fn new(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_results: 5,
        }
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    async fn search(&self, query: &str) -> Result<Vec<TavilyResult>, ToolError> {
        debug!(query = %query, "Searching Tavily");

        let body = TavilySearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            topic: "news",
            max_results: RESULTS_PER_QUERY,
            include_domains: NEWS_DOMAINS,
            exclude_domains: EXCLUDED_DOMAINS,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Never echo the response body; Tavily reflects the key on auth errors
            return Err(ToolError::RequestFailed(format!("Tavily returned {}", status)));
        }

        let parsed: TavilySearchResponse = response.json().await?;
        Ok(parsed.results)
    }

    async fn fetch(&self, request: &AnalysisRequest) -> Result<NewsPayload, ToolError> {
        if self.api_key.is_empty() {
            return Err(ToolError::NoApiKey);
        }

        let queries = news_queries(request);
        info!(queries = queries.len(), "Searching aviation news");

        let outcomes = futures::future::join_all(queries.iter().map(|q| self.search(q))).await;

        let mut seen = HashSet::new();
        let mut articles = Vec::new();
        let mut failures = 0;

        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(results) => {
                    for result in results {
                        if result.url.is_empty() || !seen.insert(result.url.clone()) {
                            continue;
                        }
                        articles.push(NewsArticle {
                            title: result.title,
                            url: result.url,
                            content: result.content,
                            published_date: result.published_date.filter(|d| !d.is_empty()),
                            score: result.score,
                        });
                    }
                }
                Err(e) => {
                    warn!(query = %query, error = %e, "News query failed");
                    failures += 1;
                }
            }
        }

        if failures == queries.len() {
            return Err(ToolError::RequestFailed("all news queries failed".to_string()));
        }

        articles.sort_by(|a, b| b.score.total_cmp(&a.score));
        articles.truncate(self.max_results);

        info!(count = articles.len(), "News search completed");

        Ok(NewsPayload {
            total_results: articles.len(),
            queries,
            articles,
        })
    }
}

#[async_trait]
impl ToolAdapter for NewsAdapter {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn invoke(&self, request: &AnalysisRequest) -> ToolResult {
        let started = Instant::now();
        let outcome = self.fetch(request).await;
        into_tool_result(SOURCE_NAME, SourceKind::News, outcome)
            .with_elapsed_ms(started.elapsed().as_millis() as u64)
    }
}

fn news_queries(request: &AnalysisRequest) -> Vec<String> {
    vec![
        format!("Honeywell {} aerospace news", request.honeywell_product),
        format!("{} competitive analysis", request.honeywell_product),
        format!("{} market position", request.competitor_query),
    ]
}
