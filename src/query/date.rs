//! Date normalization for range filters.

use crate::error::AppError;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Accepted input layouts after the canonical pass-through, tried in order.
const FALLBACK_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];

fn canonical_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static pattern"))
}

/// Normalize a date to `YYYY-MM-DD`. Accepts YYYY-MM-DD, DD-MM-YYYY, DD/MM/YYYY and YYYY/MM/DD.
pub fn format_date(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    if canonical_shape().is_match(raw) {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|_| raw.to_string())
            .map_err(|_| AppError::InvalidDateFormat(raw.to_string()));
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| AppError::InvalidDateFormat(raw.to_string()))
}
