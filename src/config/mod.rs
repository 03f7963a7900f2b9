use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scraper::Strategy;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Sites, routing and HTTP behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_sites")]
    pub sites: Vec<String>,

    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderRule>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts for transient failures; 0 means a single attempt.
    #[serde(default)]
    pub max_retries: usize,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Maps a URL substring to a scraping strategy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderRule {
    pub marker: String,
    pub strategy: Strategy,
}

/// Aggregation window and courtesy delays
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_window_months")]
    pub window_months: u32,

    #[serde(default = "default_delay_ms")]
    pub site_delay_ms: u64,

    #[serde(default = "default_delay_ms")]
    pub batch_delay_ms: u64,
}

impl PipelineConfig {
    pub fn site_delay(&self) -> Duration {
        Duration::from_millis(self.site_delay_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_sites() -> Vec<String> {
    [
        "https://tgsouthernpower.org/HtCurrentMonthbillhistory",
        "https://webportal.tgsouthernpower.org/TGSPDCL/Billinginfo/Billinginfo.jsp",
        "https://tgsouthernpower.org/",
        "https://www.billdesk.com/pgidsk/pgmerc/tsspdclpgi/TSSPDCLPGIDetails.jsp",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Most specific marker first: the web portal host also contains the
/// lookup-portal marker.
pub fn default_providers() -> Vec<ProviderRule> {
    [
        ("webportal.tgsouthernpower.org", Strategy::BillingPortal),
        ("tgsouthernpower.org", Strategy::LookupPortal),
        ("billdesk.com", Strategy::PaymentGateway),
    ]
    .into_iter()
    .map(|(marker, strategy)| ProviderRule {
        marker: marker.to_string(),
        strategy,
    })
    .collect()
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}
fn default_window_months() -> u32 {
    20
}
fn default_delay_ms() -> u64 {
    1000
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            sites: default_sites(),
            providers: default_providers(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_months: default_window_months(),
            site_delay_ms: default_delay_ms(),
            batch_delay_ms: default_delay_ms(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("BILL_SCRAPE").separator("__"))
            .build()
            .context("Failed to read configuration")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scraper.sites.len(), 4);
        assert_eq!(cfg.scraper.timeout_secs, 15);
        assert_eq!(cfg.scraper.max_retries, 0);
        assert_eq!(cfg.pipeline.window_months, 20);
        assert_eq!(cfg.pipeline.site_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_toml_overrides() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [scraper]
                sites = ["https://bills.example/history"]
                providers = [{ marker = "bills.example", strategy = "lookup_portal" }]

                [pipeline]
                site_delay_ms = 0
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .and_then(|c| c.try_deserialize())
            .expect("valid config");

        assert_eq!(cfg.scraper.sites, vec!["https://bills.example/history"]);
        assert_eq!(cfg.scraper.providers[0].strategy, Strategy::LookupPortal);
        assert_eq!(cfg.scraper.timeout_secs, 15);
        assert_eq!(cfg.pipeline.site_delay_ms, 0);
        assert_eq!(cfg.pipeline.window_months, 20);
    }
}
