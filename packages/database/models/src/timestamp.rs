//! Lenient parsing of the text timestamps stored in the database.
//!
//! Submission times are written as `YYYY-MM-DD HH:MM:SS.ffffff`; ride times
//! come straight from an HTML `datetime-local` input (`YYYY-MM-DDTHH:MM`)
//! and may be empty or garbage.

use chrono::{NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parses a stored timestamp, returning `None` if no known format matches.
#[must_use]
pub fn parse(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Formats a timestamp the way submission times are stored: seconds
/// precision, with a six-digit fraction only when it is non-zero.
#[must_use]
pub fn format(value: &NaiveDateTime) -> String {
    if value.and_utc().timestamp_subsec_nanos() == 0 {
        value.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        value.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}
