use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub validation: ValidationConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    pub tavily_api_key: Option<String>,
    pub serpapi_api_key: Option<String>,
    pub timeout_secs: u64,
    pub yahoo_finance_base_url: String,
    pub tavily_base_url: String,
    pub news_max_results: usize,
    pub specs_max_results: usize,
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Fraction of sources that must be satisfied for a verdict to pass.
    pub pass_ratio: f64,
    /// Minimum per-source quality score for the source to count as satisfied.
    pub source_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pass_ratio: 1.0,
            source_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub default_filter: String,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let validation = ValidationConfig {
            pass_ratio: parse_var("VALIDATION_PASS_RATIO", 1.0)?,
            source_threshold: parse_var("SOURCE_QUALITY_THRESHOLD", 0.6)?,
        };
        validation.check()?;

        Ok(Self {
            server: ServerConfig {
                port: parse_var("PORT", 3000)?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                static_dir: env::var("STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("static")),
            },
            tools: ToolsConfig {
                tavily_api_key: non_empty_var("TAVILY_API_KEY"),
                serpapi_api_key: non_empty_var("SERPAPI_API_KEY"),
                timeout_secs: parse_var("TOOL_TIMEOUT_SECS", 60)?,
                yahoo_finance_base_url: env::var("YAHOO_FINANCE_BASE_URL")
                    .unwrap_or_else(|_| "https://query1.finance.yahoo.com".to_string()),
                tavily_base_url: env::var("TAVILY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.tavily.com".to_string()),
                news_max_results: parse_var("NEWS_MAX_RESULTS", 5)?,
                specs_max_results: parse_var("SPECS_MAX_RESULTS", 5)?,
            },
            validation,
            report: ReportConfig {
                output_dir: env::var("REPORTS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("reports")),
            },
            logging: LoggingConfig {
                default_filter: "aero_intel=info,tower_http=info".to_string(),
                log_dir: non_empty_var("LOG_DIR").map(PathBuf::from),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
                cors_allowed_origins: vec!["http://localhost:3000".to_string()],
                static_dir: PathBuf::from("static"),
            },
            tools: ToolsConfig {
                tavily_api_key: None,
                serpapi_api_key: None,
                timeout_secs: 60,
                yahoo_finance_base_url: "https://query1.finance.yahoo.com".to_string(),
                tavily_base_url: "https://api.tavily.com".to_string(),
                news_max_results: 5,
                specs_max_results: 5,
            },
            validation: ValidationConfig::default(),
            report: ReportConfig {
                output_dir: PathBuf::from("reports"),
            },
            logging: LoggingConfig {
                default_filter: "aero_intel=info,tower_http=info".to_string(),
                log_dir: None,
            },
        }
    }
}

impl ValidationConfig {
    pub fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pass_ratio) {
            anyhow::bail!("VALIDATION_PASS_RATIO must be within [0, 1], got {}", self.pass_ratio);
        }
        if !(0.0..=1.0).contains(&self.source_threshold) {
            anyhow::bail!(
                "SOURCE_QUALITY_THRESHOLD must be within [0, 1], got {}",
                self.source_threshold
            );
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.starts_with("your_"))
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        _ => Ok(default),
    }
}
