use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use bill_scrape::scraper::classify::{Field, classify};
use bill_scrape::scraper::dates::normalize_date;
use bill_scrape::utils::{self, parse_service_numbers};
use bill_scrape::scraper::Strategy;
use bill_scrape::{AppConfig, BillCandidate, Pipeline, ScrapeReport, SiteOutcome, SiteReport};

#[derive(Parser)]
#[command(name = "bill-scrape", about = "Utility bill history scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape bill history for one or more service numbers
    Scrape {
        /// Service numbers (commas allowed)
        service_numbers: Vec<String>,

        /// Read additional service numbers from a file (one per line or comma separated)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },

    /// List configured sites and the strategy each one is routed to
    Sites,

    /// Show which bill field a text fragment would be assigned to
    Classify { text: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
    Csv,
}

#[derive(Serialize)]
struct ReportView<'a> {
    service_number: &'a str,
    bills: &'a [BillCandidate],
    sites: Vec<SiteView<'a>>,
}

/// Per-site summary: candidate count or failure, and time spent.
#[derive(Serialize)]
struct SiteView<'a> {
    site: &'a str,
    strategy: Strategy,
    candidates: usize,
    error: Option<String>,
    elapsed_ms: u128,
}

impl<'a> From<&'a SiteReport> for SiteView<'a> {
    fn from(s: &'a SiteReport) -> Self {
        Self {
            site: &s.site,
            strategy: s.strategy,
            candidates: s.outcome.candidates().len(),
            error: match &s.outcome {
                SiteOutcome::Failed(e) => Some(e.to_string()),
                SiteOutcome::Extracted(_) => None,
            },
            elapsed_ms: s.elapsed.as_millis(),
        }
    }
}

impl<'a> From<&'a ScrapeReport> for ReportView<'a> {
    fn from(r: &'a ScrapeReport) -> Self {
        Self {
            service_number: &r.service_number,
            bills: &r.bills,
            sites: r.sites.iter().map(SiteView::from).collect(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "bill_scrape=info,warn",
        1 => "bill_scrape=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Scrape {
            service_numbers,
            file,
            format,
        } => {
            let mut numbers = parse_service_numbers(&service_numbers.join("\n"));
            if let Some(path) = file {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                numbers.extend(parse_service_numbers(&text));
            }
            anyhow::ensure!(!numbers.is_empty(), "Please provide at least one service number");

            let _t = utils::Timer::start(format!("Scraping {} service numbers", numbers.len()));
            let pipeline = Pipeline::from_config(&config).context("Failed to build pipeline")?;
            let reports = pipeline.run_batch(&numbers).await;

            print_reports(&reports, format)?;
            let empty = reports.iter().filter(|r| r.is_empty()).count();
            info!("Done: {} service numbers, {} with no bill history", reports.len(), empty);
        }

        Command::Sites => {
            let pipeline = Pipeline::from_config(&config).context("Failed to build pipeline")?;
            for site in pipeline.sites() {
                println!("  {:<16} {}", site.strategy.name(), site.url);
            }
        }

        Command::Classify { text } => match classify(&text) {
            Some(Field::Date) => match normalize_date(&text) {
                Some(d) => println!("date ({})", d),
                None => println!("date (unparseable)"),
            },
            Some(field) => println!("{}", field.as_str()),
            None => println!("none"),
        },
    }

    Ok(())
}

fn print_reports(reports: &[ScrapeReport], format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let views: Vec<ReportView> = reports.iter().map(ReportView::from).collect();
            serde_json::to_writer_pretty(io::stdout(), &views)?;
            println!();
        }

        Format::Csv => {
            let mut wtr = csv::Writer::from_writer(io::stdout());
            for bill in reports.iter().flat_map(|r| &r.bills) {
                wtr.serialize(bill)?;
            }
            wtr.flush()?;
        }

        Format::Table => {
            for report in reports {
                println!("─────────────────────────────────");
                println!("  Service number: {}", report.service_number);
                println!("─────────────────────────────────");
                if report.is_empty() {
                    println!("  No bill history found");
                }
                for bill in &report.bills {
                    println!(
                        "  {:<12} {:>14}  {:<14} {}",
                        bill.bill_date
                            .map(|d| d.to_string())
                            .or_else(|| bill.date.clone())
                            .unwrap_or("—".into()),
                        bill.amount.as_deref().unwrap_or("—"),
                        bill.bill_number.as_deref().unwrap_or("—"),
                        bill.status.as_deref().unwrap_or(""),
                    );
                }
                for site in report.sites.iter().map(SiteView::from) {
                    match &site.error {
                        Some(e) => println!("  ! {} ({} ms): {}", site.site, site.elapsed_ms, e),
                        None => println!(
                            "  · {} ({}, {} candidates, {} ms)",
                            site.site,
                            site.strategy.name(),
                            site.candidates,
                            site.elapsed_ms
                        ),
                    }
                }
            }
        }
    }

    Ok(())
}
