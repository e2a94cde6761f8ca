//! Canonicalisation of the loosely formatted text found in meter exports:
//! date headers, decorated meter labels and numeric cells.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("Unrecognized date format: '{0}'")]
    Date(String),

    #[error("Invalid numeric value: '{0}'")]
    Value(String),
}

static BRACKETED_SERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*(\d+)\s*\]").expect("valid regex"));
static BRACKETED_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));
static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*$").expect("valid regex"));
static LONG_DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4,}").expect("valid regex"));
static MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)\.?[\s,\-]*(\d{4}|\d{2})$").expect("valid regex")
});

const MAX_SLUG_LEN: usize = 20;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parse a date header into a calendar date.
///
/// Shapes are tried in this order:
/// 1. `dd.mm.yy[yy]` (anything containing `.`)
/// 2. `mm/dd/yy[yy]` (anything containing `/`)
/// 3. ISO `yyyy-mm-dd`, optionally followed by a time part
/// 4. `Month[,] yyyy` with full or three letter English month names; day is 1
///
/// Two digit years are read as 20YY.
///
/// ```
/// use chrono::NaiveDate;
/// use meter_reconciliation_service::normalize::normalize_date;
///
/// let expected = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
/// assert_eq!(normalize_date("02.01.25").unwrap(), expected);
/// assert_eq!(normalize_date("1/2/25").unwrap(), expected);
/// assert_eq!(normalize_date("2025-01-02").unwrap(), expected);
/// ```
pub fn normalize_date(raw: &str) -> Result<NaiveDate, FormatError> {
    let trimmed = raw.trim();
    let err = || FormatError::Date(raw.to_string());

    if trimmed.is_empty() {
        return Err(err());
    }

    let structured = if trimmed.contains('.') {
        parse_numeric_triplet(trimmed.trim_end_matches('.'), '.', DateOrder::DayMonthYear)
    } else if trimmed.contains('/') {
        parse_numeric_triplet(trimmed, '/', DateOrder::MonthDayYear)
    } else if trimmed.contains('-') && trimmed.len() >= 8 {
        parse_iso(trimmed)
    } else {
        None
    };

    structured
        .or_else(|| parse_month_year(trimmed))
        .ok_or_else(err)
}

#[derive(Clone, Copy)]
enum DateOrder {
    DayMonthYear,
    MonthDayYear,
}

fn parse_numeric_triplet(value: &str, separator: char, order: DateOrder) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split(separator).map(str::trim).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let first: u32 = parts[0].parse().ok()?;
    let second: u32 = parts[1].parse().ok()?;
    let year = expand_year(parts[2])?;

    let (day, month) = match order {
        DateOrder::DayMonthYear => (first, second),
        DateOrder::MonthDayYear => (second, first),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_iso(value: &str) -> Option<NaiveDate> {
    let date_part = value.split(['T', ' ']).next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn parse_month_year(value: &str) -> Option<NaiveDate> {
    let caps = MONTH_YEAR.captures(value)?;
    let month = month_number(&caps[1])?;
    let year = expand_year(&caps[2])?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    if name == "sept" {
        return Some(9);
    }
    MONTHS
        .iter()
        .position(|full| *full == name || (name.len() == 3 && full.starts_with(&name)))
        .map(|idx| idx as u32 + 1)
}

fn expand_year(value: &str) -> Option<i32> {
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = value.parse().ok()?;
    match value.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

/// Extract the serial number from a decorated meter label.
///
/// Precedence: digits in `[...]`, then the trailing digit run, then the first
/// run of at least four digits, and finally an alphanumeric slug of the label
/// (at most 20 characters). The result is empty only when the label has no
/// alphanumeric characters at all.
///
/// ```
/// use meter_reconciliation_service::normalize::extract_serial;
///
/// assert_eq!(extract_serial("1.OG Links [6063928]"), "6063928");
/// assert_eq!(extract_serial("Main Building 749304"), "749304");
/// ```
pub fn extract_serial(label: &str) -> String {
    if let Some(caps) = BRACKETED_SERIAL.captures(label) {
        return caps[1].to_string();
    }
    if let Some(caps) = TRAILING_DIGITS.captures(label) {
        return caps[1].to_string();
    }
    if let Some(run) = LONG_DIGIT_RUN.find(label) {
        return run.as_str().to_string();
    }
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(MAX_SLUG_LEN)
        .collect()
}

/// Human readable location for a new meter: the label without its bracketed
/// serial, whitespace collapsed.
pub fn derive_location(label: &str) -> String {
    let stripped = BRACKETED_SEGMENT.replace_all(label, " ");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        label.trim().to_string()
    } else {
        collapsed
    }
}

/// Parse a numeric grid cell.
///
/// Blank cells are `Ok(None)`. Spaces and apostrophes used as digit grouping
/// are dropped; when both `.` and `,` appear the later one is the decimal
/// separator, a lone `,` is a decimal comma.
pub fn parse_value(raw: &str) -> Result<Option<f64>, FormatError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();

    let canonical = match (compact.rfind('.'), compact.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (None, Some(_)) if compact.matches(',').count() > 1 => compact.replace(',', ""),
        (None, Some(_)) => compact.replace(',', "."),
        _ => compact,
    };

    match canonical.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(FormatError::Value(raw.to_string())),
    }
}
