use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use super::classify::{Field, classify, find_date};
use super::dates::normalize_date;
use crate::models::BillCandidate;

// ── Selectors & keywords ──────────────────────────────────────────────────────

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table"));
static ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr"));
static CELL: LazyLock<Selector> = LazyLock::new(|| selector("td, th"));
static DIV: LazyLock<Selector> = LazyLock::new(|| selector("div"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

static CURRENCY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:₹|Rs\.?)\s*\d+(?:,\d+)*(?:\.\d{2})?").expect("valid amount pattern")
});
static BARE_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:,\d+)*(?:\.\d{2})?").expect("valid amount pattern"));

/// Tables worth scanning on a page that was not produced by a lookup.
const BILL_TABLE_KEYWORDS: [&str; 4] = ["bill", "payment", "amount", "due"];
/// Blocks worth handing to the free-text parser in a lookup response.
const BILL_BLOCK_KEYWORDS: [&str; 4] = ["bill", "amount", "due", "payment"];
/// Relevance gate of the free-text parser itself.
const BILL_TEXT_KEYWORDS: [&str; 7] = [
    "bill",
    "amount",
    "due",
    "payment",
    "paid",
    "outstanding",
    "balance",
];
/// Outbound links worth following one hop.
const BILL_LINK_KEYWORDS: [&str; 3] = ["bill", "history", "payment"];

/// Rows with fewer cells are layout, not data.
const MIN_ROW_CELLS: usize = 3;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid static selector")
}

pub(crate) fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Text of an element with each text node trimmed and concatenated, so
/// values split by inline markup (`1<b>2</b>/05/2024`) stay whole.
pub(crate) fn element_text(el: &ElementRef) -> String {
    el.text().map(str::trim).collect()
}

fn with_date(bill: &mut BillCandidate, raw: &str) {
    // Fall back to the date-looking part of the text, e.g. "Bill date: 12/05/2024".
    bill.bill_date = normalize_date(raw).or_else(|| find_date(raw).and_then(normalize_date));
    bill.date = Some(raw.to_string());
}

// ── Table parser ──────────────────────────────────────────────────────────────

/// One candidate per row of cell texts that yields a date or an amount.
///
/// Each cell is classified independently and assigned at most one field; when
/// several cells map to the same field the rightmost one is kept.
pub fn parse_row(cells: &[String], service_number: &str, source: &str) -> Option<BillCandidate> {
    if cells.len() < MIN_ROW_CELLS {
        return None;
    }

    let mut bill = BillCandidate::new(service_number, source);

    for text in cells {
        match classify(text) {
            Some(Field::Date) => with_date(&mut bill, text),
            Some(Field::Amount) => bill.amount = Some(text.clone()),
            Some(Field::BillNumber) => bill.bill_number = Some(text.clone()),
            Some(Field::Status) => bill.status = Some(text.clone()),
            None => {}
        }
    }

    bill.is_usable().then_some(bill)
}

pub fn parse_table(table: ElementRef, service_number: &str, source: &str) -> Vec<BillCandidate> {
    table
        .select(&ROW)
        .filter_map(|tr| {
            let cells: Vec<String> = tr.select(&CELL).map(|td| element_text(&td)).collect();
            parse_row(&cells, service_number, source)
        })
        .collect()
}

// ── Free-text-block parser ────────────────────────────────────────────────────

/// At most one candidate from a block of text, keeping the text itself.
///
/// The candidate may carry neither date nor amount; the pipeline drops those.
pub fn parse_text_block(text: &str, service_number: &str, source: &str) -> Option<BillCandidate> {
    if !contains_any(text, &BILL_TEXT_KEYWORDS) {
        return None;
    }

    let mut bill = BillCandidate::new(service_number, source);
    bill.raw_text = Some(text.to_string());

    let date_match = find_date(text);
    if let Some(date) = date_match {
        with_date(&mut bill, date);
    }
    bill.amount = find_amount(text, date_match);

    Some(bill)
}

/// Currency-marked amount first, else the first number that is not part of
/// the date already taken from the same text.
fn find_amount(text: &str, date: Option<&str>) -> Option<String> {
    if let Some(m) = CURRENCY_AMOUNT.find(text) {
        return Some(m.as_str().trim().to_string());
    }

    let date_span = date.and_then(|d| text.find(d).map(|start| start..start + d.len()));
    BARE_AMOUNT
        .find_iter(text)
        .find(|m| {
            date_span
                .as_ref()
                .is_none_or(|span| m.end() <= span.start || m.start() >= span.end)
        })
        .map(|m| m.as_str().to_string())
}

// ── Documents ─────────────────────────────────────────────────────────────────

/// Generic page scan: only tables whose markup mentions bills.
pub fn parse_bill_tables(html: &str, service_number: &str, source: &str) -> Vec<BillCandidate> {
    let doc = Html::parse_document(html);

    doc.select(&TABLE)
        .filter(|t| contains_any(&t.html(), &BILL_TABLE_KEYWORDS))
        .flat_map(|t| parse_table(t, service_number, source))
        .collect()
}

/// Response to a lookup: every table, plus every bill-related block of text.
pub fn parse_bill_response(html: &str, service_number: &str, source: &str) -> Vec<BillCandidate> {
    let doc = Html::parse_document(html);

    let mut bills: Vec<BillCandidate> = doc
        .select(&TABLE)
        .flat_map(|t| parse_table(t, service_number, source))
        .collect();
    let from_tables = bills.len();

    bills.extend(
        doc.select(&DIV)
            .filter(|div| contains_any(&div.html(), &BILL_BLOCK_KEYWORDS))
            .filter_map(|div| parse_text_block(&element_text(&div), service_number, source)),
    );

    debug!(
        "Response parsed: {} from tables, {} from text blocks",
        from_tables,
        bills.len() - from_tables
    );
    bills
}

/// Distinct http(s) links whose href mentions bills, resolved against `base`.
pub fn bill_links(html: &str, base: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let mut links: Vec<Url> = Vec::new();

    for a in doc.select(&LINK) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        if !contains_any(href, &BILL_LINK_KEYWORDS) {
            continue;
        }
        let Ok(url) = base.join(href) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") || links.contains(&url) {
            continue;
        }
        links.push(url);
    }

    links
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cells(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_row_with_date_amount_status() {
        let bill = parse_row(&cells(&["12/05/2024", "₹1,250.00", "Paid"]), "12345", "scraped")
            .expect("row should yield a candidate");
        assert_eq!(bill.date.as_deref(), Some("12/05/2024"));
        assert_eq!(bill.bill_date, NaiveDate::from_ymd_opt(2024, 5, 12));
        assert_eq!(bill.amount.as_deref(), Some("₹1,250.00"));
        assert_eq!(bill.status.as_deref(), Some("Paid"));
        assert_eq!(bill.service_number, "12345");
        assert_eq!(bill.source, "scraped");
    }

    #[test]
    fn test_short_and_header_rows_dropped() {
        assert!(parse_row(&cells(&["12/05/2024", "₹1,250.00"]), "1", "s").is_none());
        assert!(parse_row(&cells(&["Bill Date", "Amount", "Status"]), "1", "s").is_none());
    }

    #[test]
    fn test_rightmost_cell_wins() {
        let bill = parse_row(
            &cells(&["01/04/2024", "15/04/2024", "Rs 980", "Rs 1,010", "TSSPDCL"]),
            "1",
            "s",
        )
        .expect("candidate");
        assert_eq!(bill.date.as_deref(), Some("15/04/2024"));
        assert_eq!(bill.bill_date, NaiveDate::from_ymd_opt(2024, 4, 15));
        assert_eq!(bill.amount.as_deref(), Some("Rs 1,010"));
        assert_eq!(bill.bill_number.as_deref(), Some("TSSPDCL"));
    }

    #[test]
    fn test_labelled_date_cell_is_normalized() {
        let bill = parse_row(&cells(&["Bill date: 03/11/2023", "Total", "Rs 410"]), "1", "s")
            .expect("candidate");
        assert_eq!(bill.date.as_deref(), Some("Bill date: 03/11/2023"));
        assert_eq!(bill.bill_date, NaiveDate::from_ymd_opt(2023, 11, 3));
    }

    #[test]
    fn test_text_block() {
        let bill = parse_text_block(
            "Last bill generated on 05/02/2024 for Rs. 1,340.00 is paid",
            "777",
            "scraped",
        )
        .expect("relevant block");
        assert_eq!(bill.date.as_deref(), Some("05/02/2024"));
        assert_eq!(bill.amount.as_deref(), Some("Rs. 1,340.00"));
        assert!(bill.raw_text.is_some());
    }

    #[test]
    fn test_text_block_amount_skips_date_digits() {
        let bill = parse_text_block("Amount due 14/03/2024 1,020.50", "7", "s").expect("block");
        assert_eq!(bill.date.as_deref(), Some("14/03/2024"));
        assert_eq!(bill.amount.as_deref(), Some("1,020.50"));
    }

    #[test]
    fn test_text_block_gate() {
        assert!(parse_text_block("Welcome to the customer portal", "7", "s").is_none());
        let bare = parse_text_block("Check your outstanding balance", "7", "s").expect("block");
        assert!(!bare.is_usable());
    }

    #[test]
    fn test_bill_tables_filtered_by_keyword() {
        let html = r#"
            <table><tr><td>12/05/2024</td><td>450</td><td>x</td></tr></table>
            <table>
              <tr><th>Bill Date</th><th>Amount</th><th>Status</th></tr>
              <tr><td>12/05/2024</td><td>₹1,250.00</td><td>Paid</td></tr>
              <tr><td>12/04/2024</td><td>₹1,100.00</td><td>Paid</td></tr>
            </table>"#;
        let bills = parse_bill_tables(html, "12345", "site");
        assert_eq!(bills.len(), 2);
        assert_eq!(bills[1].amount.as_deref(), Some("₹1,100.00"));
    }

    #[test]
    fn test_bill_response_reads_tables_and_blocks() {
        let html = r#"
            <div id="summary">Bill amount Rs 640.00 due on 20/06/2024</div>
            <table><tr><td>20/05/2024</td><td>Rs 600.00</td><td>Paid</td></tr></table>"#;
        let bills = parse_bill_response(html, "12345", "site");
        assert_eq!(bills.len(), 2);
        assert_eq!(bills[0].amount.as_deref(), Some("Rs 600.00"));
        assert_eq!(bills[1].amount.as_deref(), Some("Rs 640.00"));
        assert_eq!(bills[1].date.as_deref(), Some("20/06/2024"));
    }

    #[test]
    fn test_inline_markup_inside_cells() {
        let html = r#"<table><tr>
            <td>1<b>2</b>/05/2024</td><td>x</td><td><span>₹</span>1,250.00</td>
        </tr></table>"#;
        let bills = parse_bill_response(html, "12345", "site");
        assert_eq!(bills.len(), 1);
        assert_eq!(bills[0].date.as_deref(), Some("12/05/2024"));
        assert_eq!(bills[0].bill_date, NaiveDate::from_ymd_opt(2024, 5, 12));
        assert_eq!(bills[0].amount.as_deref(), Some("₹1,250.00"));
    }

    #[test]
    fn test_bill_links() {
        let base = Url::parse("https://power.example/home/").expect("url");
        let html = r#"
            <a href="billhistory.jsp">History</a>
            <a href="/Payment/Options">Pay</a>
            <a href="billhistory.jsp">Again</a>
            <a href="mailto:billing@power.example">Mail</a>
            <a href="/contact">Contact</a>"#;
        let links: Vec<String> = bill_links(html, &base).into_iter().map(String::from).collect();
        assert_eq!(
            links,
            vec![
                "https://power.example/home/billhistory.jsp",
                "https://power.example/Payment/Options",
            ]
        );
    }
}
