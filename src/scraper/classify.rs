use regex::Regex;
use std::sync::LazyLock;

// ── Patterns ──────────────────────────────────────────────────────────────────

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}", // 12/05/2024, 12-05-24
        r"\d{1,2}-\w{3}-\d{2,4}",         // 12-May-2024
        r"\w{3}\s+\d{1,2},?\s+\d{4}",     // May 12, 2024
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid date pattern"))
    .collect()
});

static CURRENCY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"₹\s*\d+(?:,\d+)*(?:\.\d{2})?",
        r"\d+(?:,\d+)*(?:\.\d{2})?\s*₹",
        r"Rs\.?\s*\d+(?:,\d+)*(?:\.\d{2})?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid amount pattern"))
    .collect()
});

static BARE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:,\d+)*(?:\.\d{2})?").expect("valid number pattern"));

static BILL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z0-9]{6,}").expect("valid bill number pattern"));

const STATUS_KEYWORDS: [&str; 3] = ["paid", "unpaid", "due"];

/// Bare numbers longer than this are not treated as amounts.
const MAX_BARE_AMOUNT_LEN: usize = 20;

// ── Classifiers ───────────────────────────────────────────────────────────────

pub fn is_date(text: &str) -> bool {
    DATE_PATTERNS.iter().any(|re| re.is_match(text))
}

/// First date-looking substring, in pattern priority order.
pub fn find_date(text: &str) -> Option<&str> {
    DATE_PATTERNS
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str())
}

/// Currency-marked amounts, or any short text containing a number.
///
/// "Rs 450" → true | "1,250.00 ₹" → true | "450" → true | "Total" → false
pub fn is_amount(text: &str) -> bool {
    if CURRENCY_PATTERNS.iter().any(|re| re.is_match(text)) {
        return true;
    }
    BARE_NUMBER.is_match(text) && text.chars().count() <= MAX_BARE_AMOUNT_LEN
}

pub fn is_bill_number(text: &str) -> bool {
    BILL_NUMBER.is_match(text)
}

pub fn is_status(text: &str) -> bool {
    let lower = text.to_lowercase();
    STATUS_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Field a table cell is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Amount,
    BillNumber,
    Status,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Amount => "amount",
            Field::BillNumber => "bill_number",
            Field::Status => "status",
        }
    }
}

/// Date beats amount beats bill number beats status; first match wins.
pub fn classify(text: &str) -> Option<Field> {
    if is_date(text) {
        Some(Field::Date)
    } else if is_amount(text) {
        Some(Field::Amount)
    } else if is_bill_number(text) {
        Some(Field::BillNumber)
    } else if is_status(text) {
        Some(Field::Status)
    } else {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_date() {
        assert!(is_date("12/05/2024"));
        assert!(is_date("1-5-24"));
        assert!(is_date("12-May-2024"));
        assert!(is_date("May 12, 2024"));
        assert!(is_date("Bill date: 03/11/2023"));
        assert!(!is_date("₹1,250.00"));
        assert!(!is_date(""));
    }

    #[test]
    fn test_is_amount() {
        assert!(is_amount("₹1,250.00"));
        assert!(is_amount("1,250.00 ₹"));
        assert!(is_amount("Rs. 450"));
        assert!(is_amount("450"));
        assert!(!is_amount("Paid"));
        // long free text with a digit only qualifies when currency-marked
        assert!(!is_amount("Consumer 1 of the billing cycle list"));
        assert!(is_amount("Net payable amount is Rs 1,200.50 only"));
    }

    #[test]
    fn test_is_bill_number() {
        assert!(is_bill_number("AB12CD34"));
        assert!(!is_bill_number("ab12cd34"));
        assert!(!is_bill_number("AB12"));
    }

    #[test]
    fn test_is_status() {
        assert!(is_status("Paid"));
        assert!(is_status("UNPAID"));
        assert!(is_status("Overdue"));
        assert!(!is_status("Pending"));
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify("12/05/2024"), Some(Field::Date));
        assert_eq!(classify("₹1,250.00"), Some(Field::Amount));
        assert_eq!(classify("Paid"), Some(Field::Status));
        // all digits: amount wins over bill number
        assert_eq!(classify("1234567"), Some(Field::Amount));
        assert_eq!(classify("INVOICEABCDEF"), Some(Field::BillNumber));
        assert_eq!(classify("Description"), None);
    }

    #[test]
    fn test_find_date() {
        assert_eq!(find_date("Billed on 12/05/2024 for"), Some("12/05/2024"));
        assert_eq!(find_date("nothing here"), None);
    }
}
