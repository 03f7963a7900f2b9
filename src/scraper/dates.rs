use chrono::{Datelike, NaiveDate};

/// Accepted layouts, tried in order.
const DATE_FORMATS: [&str; 8] = [
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d/%m/%y",
    "%d-%m-%y",
    "%Y-%m-%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
];

/// Parse a raw bill date. `None` means unparseable; this never fails.
///
/// "12/05/2024" → 2024-05-12 | "Mar 5, 2024" → 2024-03-05 | "05-Mar-23" → None
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        let Ok(date) = NaiveDate::parse_from_str(s, fmt) else {
            continue;
        };
        // chrono's %Y accepts short years; leave those to the %y layouts.
        if fmt.contains("%Y") && date.year() < 1000 {
            continue;
        }
        return Some(date);
    }

    None
}
