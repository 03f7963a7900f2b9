use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ScrapeError;
use crate::scraper::Strategy;

// ── Bill candidate ────────────────────────────────────────────────────────────

/// An extracted, unverified bill record.
///
/// `date` is the text as found on the page; `bill_date` is its normalized
/// form, `None` when the text could not be parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BillCandidate {
    pub service_number: String,
    pub date: Option<String>,
    pub bill_date: Option<NaiveDate>,
    pub amount: Option<String>,
    pub bill_number: Option<String>,
    pub status: Option<String>,
    pub source: String,
    pub raw_text: Option<String>,
}

impl BillCandidate {
    pub fn new(service_number: &str, source: &str) -> Self {
        Self {
            service_number: service_number.to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// At least one of date or amount must be present for a record to be kept.
    pub fn is_usable(&self) -> bool {
        self.date.is_some() || self.amount.is_some()
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            date: self.date.clone().unwrap_or_default(),
            amount: self.amount.clone().unwrap_or_default(),
            service_number: self.service_number.clone(),
        }
    }

    pub fn status_kind(&self) -> Option<StatusKind> {
        self.status.as_deref().map(StatusKind::from_text)
    }
}

/// Composite identity used to drop duplicate candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub date: String,
    pub amount: String,
    pub service_number: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Paid,
    Unpaid,
    Due,
    Other,
}

impl StatusKind {
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        // "unpaid" contains "paid"
        if lower.contains("unpaid") {
            StatusKind::Unpaid
        } else if lower.contains("paid") {
            StatusKind::Paid
        } else if lower.contains("due") {
            StatusKind::Due
        } else {
            StatusKind::Other
        }
    }
}

// ── Per-site and per-identifier reports ───────────────────────────────────────

#[derive(Debug)]
pub enum SiteOutcome {
    Extracted(Vec<BillCandidate>),
    Failed(ScrapeError),
}

impl SiteOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, SiteOutcome::Failed(_))
    }

    pub fn candidates(&self) -> &[BillCandidate] {
        match self {
            SiteOutcome::Extracted(bills) => bills,
            SiteOutcome::Failed(_) => &[],
        }
    }
}

#[derive(Debug)]
pub struct SiteReport {
    pub site: String,
    pub strategy: Strategy,
    pub outcome: SiteOutcome,
    pub elapsed: Duration,
}

/// Result of one pipeline run for a single service identifier.
#[derive(Debug)]
pub struct ScrapeReport {
    pub service_number: String,
    pub sites: Vec<SiteReport>,
    pub bills: Vec<BillCandidate>,
}

impl ScrapeReport {
    /// "No bill history found" is a normal outcome, not an error.
    pub fn is_empty(&self) -> bool {
        self.bills.is_empty()
    }

    pub fn all_sites_failed(&self) -> bool {
        !self.sites.is_empty() && self.sites.iter().all(|s| s.outcome.is_failed())
    }

    pub fn failed_sites(&self) -> usize {
        self.sites.iter().filter(|s| s.outcome.is_failed()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_kind() {
        assert_eq!(StatusKind::from_text("UNPAID"), StatusKind::Unpaid);
        assert_eq!(StatusKind::from_text("Paid on 12/05"), StatusKind::Paid);
        assert_eq!(StatusKind::from_text("Due"), StatusKind::Due);
        assert_eq!(StatusKind::from_text("pending"), StatusKind::Other);
    }

    #[test]
    fn test_dedup_key_treats_missing_as_empty() {
        let mut bill = BillCandidate::new("12345", "scraped");
        bill.amount = Some("450".into());
        let key = bill.dedup_key();
        assert_eq!(key.date, "");
        assert_eq!(key.amount, "450");
        assert_eq!(key.service_number, "12345");
    }

    #[test]
    fn test_usable_requires_date_or_amount() {
        let mut bill = BillCandidate::new("12345", "scraped");
        bill.raw_text = Some("Bill payment details".into());
        assert!(!bill.is_usable());
        bill.date = Some("01/02/2024".into());
        assert!(bill.is_usable());
    }
}
