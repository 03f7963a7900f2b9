//! Best-effort bill history extraction from utility-provider web pages.
//!
//! Given a service number, [`Pipeline`] visits each configured site, drives
//! lookup forms, reads bill tables and text blocks, then returns a
//! deduplicated, newest-first list of [`BillCandidate`]s from the trailing
//! window. Failures are absorbed per form and per site.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod scraper;
pub mod utils;

pub use config::AppConfig;
pub use error::ScrapeError;
pub use models::{BillCandidate, ScrapeReport, SiteOutcome, SiteReport, StatusKind};
pub use pipeline::Pipeline;
