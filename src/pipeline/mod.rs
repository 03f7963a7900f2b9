//! Aggregation pipeline: runs every configured site for one service number
//! and turns the raw candidates into the final bill history.
//!
//! ## Steps
//!
//!   1. Visit sites in order, one at a time, with a courtesy pause between them.
//!   2. Drop candidates that carry neither a date nor an amount.
//!   3. Deduplicate on (raw date, amount, service number); first seen wins.
//!   4. Keep bills inside the trailing window, plus any with an unparseable date.
//!   5. Sort newest first; unparseable dates sink to the end.
//!
//! Steps 2-5 are pure functions of the candidates and a reference instant.

use chrono::{Local, Months, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AppConfig, PipelineConfig};
use crate::error::ScrapeError;
use crate::models::{BillCandidate, ScrapeReport};
use crate::scraper::http_client::{HttpClient, Transport};
use crate::scraper::{Site, SiteScraper};

pub struct Pipeline<T> {
    sites: Vec<Site>,
    scraper: SiteScraper<T>,
    options: PipelineConfig,
}

impl Pipeline<HttpClient> {
    /// Build a pipeline over the configured sites using the real HTTP client.
    ///
    /// Site URLs that do not parse are skipped with a warning.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScrapeError> {
        let client = HttpClient::new(&config.scraper)?;
        let sites = config
            .scraper
            .sites
            .iter()
            .filter_map(|raw| match Site::resolve(raw, &config.scraper.providers) {
                Ok(site) => Some(site),
                Err(e) => {
                    warn!("Skipping site {:?}: {}", raw, e);
                    None
                }
            })
            .collect();
        Ok(Self::new(sites, client, config.pipeline.clone()))
    }
}

impl<T: Transport> Pipeline<T> {
    pub fn new(sites: Vec<Site>, transport: T, options: PipelineConfig) -> Self {
        Self {
            sites,
            scraper: SiteScraper::new(transport),
            options,
        }
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Scrape bill history for one service number as of now.
    pub async fn run(&self, service_number: &str) -> ScrapeReport {
        self.run_at(service_number, Local::now().naive_local()).await
    }

    /// Scrape bill history for one service number, filtering against `now`.
    pub async fn run_at(&self, service_number: &str, now: NaiveDateTime) -> ScrapeReport {
        let mut reports = Vec::with_capacity(self.sites.len());

        for (i, site) in self.sites.iter().enumerate() {
            if i > 0 {
                pause(self.options.site_delay()).await;
            }
            reports.push(self.scraper.scrape(site, service_number).await);
        }

        let candidates: Vec<BillCandidate> = reports
            .iter()
            .flat_map(|r| r.outcome.candidates().iter().cloned())
            .collect();
        let found = candidates.len();
        let bills = aggregate(candidates, now, self.options.window_months);

        let report = ScrapeReport {
            service_number: service_number.to_string(),
            sites: reports,
            bills,
        };

        if report.all_sites_failed() {
            warn!("{}: every site failed", service_number);
        }
        info!(
            "{}: {} candidates → {} bills ({} of {} sites failed)",
            service_number,
            found,
            report.bills.len(),
            report.failed_sites(),
            report.sites.len()
        );

        report
    }

    /// Run several service numbers one after another with the batch delay
    /// between them.
    pub async fn run_batch(&self, service_numbers: &[String]) -> Vec<ScrapeReport> {
        let mut reports = Vec::with_capacity(service_numbers.len());

        for (i, service_number) in service_numbers.iter().enumerate() {
            if i > 0 {
                pause(self.options.batch_delay()).await;
            }
            reports.push(self.run(service_number).await);
        }

        reports
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// ── Pure stages ───────────────────────────────────────────────────────────────

/// Usable-filter, dedup, window-filter and sort, in that order.
pub fn aggregate(
    candidates: Vec<BillCandidate>,
    now: NaiveDateTime,
    window_months: u32,
) -> Vec<BillCandidate> {
    let usable = candidates.into_iter().filter(BillCandidate::is_usable).collect();
    let mut bills = filter_window(dedup(usable), now, window_months);
    sort_newest_first(&mut bills);
    bills
}

pub fn dedup(candidates: Vec<BillCandidate>) -> Vec<BillCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.dedup_key()))
        .collect()
}

/// Earliest date still inside a window of `months` ending at `now`.
pub fn window_start(now: NaiveDateTime, months: u32) -> NaiveDate {
    let today = now.date();
    today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// The boundary day itself is inside the window.
pub fn filter_window(
    candidates: Vec<BillCandidate>,
    now: NaiveDateTime,
    months: u32,
) -> Vec<BillCandidate> {
    let cutoff = window_start(now, months);
    candidates
        .into_iter()
        .filter(|c| c.bill_date.is_none_or(|d| d >= cutoff))
        .collect()
}

/// Stable: equal dates keep their traversal order.
pub fn sort_newest_first(bills: &mut [BillCandidate]) {
    bills.sort_by(|a, b| {
        let a = a.bill_date.unwrap_or(NaiveDate::MIN);
        let b = b.bill_date.unwrap_or(NaiveDate::MIN);
        b.cmp(&a)
    });
}

// ── Tests ─────────────────────────────────────────────────────────────────────
