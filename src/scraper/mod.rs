pub mod classify;
pub mod dates;
pub mod forms;
pub mod http_client;
pub mod parsers;

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use self::forms::{FormSubmission, GATEWAY_KEYWORDS, LOOKUP_KEYWORDS, discover_forms};
use self::http_client::{Page, Transport};
use self::parsers::{bill_links, parse_bill_response, parse_bill_tables};
use crate::config::ProviderRule;
use crate::error::ScrapeError;
use crate::models::{BillCandidate, SiteOutcome, SiteReport};

// ── Strategies ────────────────────────────────────────────────────────────────

/// How a site is scraped once its landing page has been fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Parse bill-related tables on the landing page only.
    Generic,
    /// Submit lookup forms, then follow bill/history/payment links one hop
    /// and submit every form found there.
    LookupPortal,
    /// Submit forms whose markup mentions "billing".
    BillingPortal,
    /// Submit lookup forms as a single fixed `consumerNumber` POST.
    PaymentGateway,
}

impl Strategy {
    /// First rule whose marker occurs in `url` wins; no match means generic.
    pub fn route(url: &str, rules: &[ProviderRule]) -> Strategy {
        rules
            .iter()
            .find(|r| url.contains(&r.marker))
            .map(|r| r.strategy)
            .unwrap_or(Strategy::Generic)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Generic => "generic",
            Strategy::LookupPortal => "lookup_portal",
            Strategy::BillingPortal => "billing_portal",
            Strategy::PaymentGateway => "payment_gateway",
        }
    }
}

/// A configured target with its routed strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub url: Url,
    pub strategy: Strategy,
}

impl Site {
    pub fn resolve(raw: &str, rules: &[ProviderRule]) -> Result<Self, ScrapeError> {
        let url = Url::parse(raw.trim())?;
        let strategy = Strategy::route(url.as_str(), rules);
        Ok(Self { url, strategy })
    }
}

// ── Site dispatcher ───────────────────────────────────────────────────────────

pub struct SiteScraper<T> {
    transport: T,
}

impl<T: Transport> SiteScraper<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Visit one site. Never fails: a landing-page failure is reported as
    /// [`SiteOutcome::Failed`], anything deeper just contributes no bills.
    pub async fn scrape(&self, site: &Site, service_number: &str) -> SiteReport {
        let started = Instant::now();
        info!(
            "Scraping {} ({}) for service number {}",
            site.url,
            site.strategy.name(),
            service_number
        );

        let outcome = match self.transport.get(&site.url).await {
            Ok(page) => {
                let bills = self.dispatch(site, &page, service_number).await;
                info!("{}: {} candidates", site.url, bills.len());
                SiteOutcome::Extracted(bills)
            }
            Err(e) => {
                warn!("Error scraping {}: {}", site.url, e);
                SiteOutcome::Failed(e)
            }
        };

        SiteReport {
            site: site.url.to_string(),
            strategy: site.strategy,
            outcome,
            elapsed: started.elapsed(),
        }
    }

    async fn dispatch(&self, site: &Site, page: &Page, service_number: &str) -> Vec<BillCandidate> {
        let source = site.url.as_str();

        match site.strategy {
            Strategy::Generic => parse_bill_tables(&page.body, service_number, source),

            Strategy::LookupPortal => {
                let submissions: Vec<_> = discover_forms(&page.body)
                    .into_iter()
                    .filter(|f| f.is_lookup(&LOOKUP_KEYWORDS))
                    .map(|f| f.submission(&page.url, service_number))
                    .collect();
                let mut bills = self.submit_all(submissions, service_number, source).await;
                bills.extend(self.follow_links(page, service_number, source).await);
                bills
            }

            Strategy::BillingPortal => {
                let submissions: Vec<_> = discover_forms(&page.body)
                    .into_iter()
                    .filter(|f| f.mentions("billing"))
                    .map(|f| f.submission(&page.url, service_number))
                    .collect();
                self.submit_all(submissions, service_number, source).await
            }

            Strategy::PaymentGateway => {
                let submissions: Vec<_> = discover_forms(&page.body)
                    .into_iter()
                    .filter(|f| f.is_lookup(&GATEWAY_KEYWORDS))
                    .map(|f| f.gateway_submission(&page.url, service_number))
                    .collect();
                self.submit_all(submissions, service_number, source).await
            }
        }
    }

    /// Submit forms one at a time; a failed form yields nothing.
    async fn submit_all(
        &self,
        submissions: Vec<Result<FormSubmission, ScrapeError>>,
        service_number: &str,
        source: &str,
    ) -> Vec<BillCandidate> {
        let mut bills = Vec::new();

        for submission in submissions {
            let result = match submission {
                Ok(sub) => {
                    debug!("Submitting form to {}", sub.url);
                    self.transport.submit(&sub).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(resp) => bills.extend(parse_bill_response(&resp.body, service_number, source)),
                Err(e) => warn!("Error submitting form on {}: {}", source, e),
            }
        }

        bills
    }

    /// Single hop: fetch each bill-related link and submit every form on it.
    async fn follow_links(
        &self,
        page: &Page,
        service_number: &str,
        source: &str,
    ) -> Vec<BillCandidate> {
        let mut bills = Vec::new();

        for link in bill_links(&page.body, &page.url) {
            debug!("Following link {}", link);
            let linked = match self.transport.get(&link).await {
                Ok(p) => p,
                Err(e) => {
                    warn!("Error following link {}: {}", link, e);
                    continue;
                }
            };

            let submissions: Vec<_> = discover_forms(&linked.body)
                .into_iter()
                .map(|f| f.submission(&linked.url, service_number))
                .collect();
            bills.extend(self.submit_all(submissions, service_number, source).await);
        }

        bills
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
