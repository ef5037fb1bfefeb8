//! Field validators
//!
//! Pure predicates shared by the add and update paths. The `require_*`
//! wrappers turn a failed predicate into [`RegisterError::InvalidValue`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::str::FromStr;

use crate::core::error::{RegisterError, Result};

/// Lowest and highest allowed likelihood/impact rating
pub const RATING_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// True iff `n` is a rating between 1 and 5
pub fn is_valid_rating(n: i64) -> bool {
    RATING_RANGE.contains(&n)
}

/// True iff the trimmed string is not empty
pub fn is_non_empty(s: &str) -> bool {
    !s.trim().is_empty()
}

/// True iff `value` is exactly one of `allowed`
pub fn is_valid_enum_member(value: &str, allowed: &[&str]) -> bool {
    allowed.contains(&value)
}

pub fn require_rating(field: &'static str, n: i64) -> Result<u8> {
    if !is_valid_rating(n) {
        return Err(RegisterError::invalid(
            field,
            format!("must be an integer between 1 and 5 (got {})", n),
        ));
    }
    Ok(n as u8)
}

pub fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if !is_non_empty(value) {
        return Err(RegisterError::invalid(field, "is required"));
    }
    Ok(())
}

/// Parse an enum field, mapping the parse failure to `InvalidValue`
pub fn require_enum<T>(field: &'static str, value: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| RegisterError::invalid(field, e))
}

pub fn require_date(field: &'static str, value: &str) -> Result<NaiveDate> {
    parse_calendar_date(value).ok_or_else(|| {
        RegisterError::invalid(field, format!("'{}' is not a valid date", value.trim()))
    })
}

/// Parse a date the way it is typed into the sheet.
///
/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, `DD/MM/YYYY`, and full timestamps
/// (RFC 3339 or naive `YYYY-MM-DDTHH:MM:SS`), keeping only the date.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(!is_valid_rating(0));
        assert!(is_valid_rating(1));
        assert!(is_valid_rating(5));
        assert!(!is_valid_rating(6));
        assert!(!is_valid_rating(-3));
    }

    #[test]
    fn test_non_empty_trims() {
        assert!(is_non_empty("x"));
        assert!(!is_non_empty(""));
        assert!(!is_non_empty("   \t"));
    }

    #[test]
    fn test_enum_member_is_exact() {
        let allowed = ["Corrective", "Preventive"];
        assert!(is_valid_enum_member("Corrective", &allowed));
        assert!(!is_valid_enum_member("corrective", &allowed));
        assert!(!is_valid_enum_member("Other", &allowed));
    }

    #[test]
    fn test_require_rating_error() {
        let err = require_rating("impact", 9).unwrap_err();
        assert!(matches!(
            err,
            RegisterError::InvalidValue { field: "impact", .. }
        ));
        assert_eq!(require_rating("impact", 4).unwrap(), 4);
    }

    #[test]
    fn test_parse_calendar_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(parse_calendar_date("2025-03-14"), Some(expected));
        assert_eq!(parse_calendar_date("2025/03/14"), Some(expected));
        assert_eq!(parse_calendar_date("14/03/2025"), Some(expected));
        assert_eq!(parse_calendar_date("2025-03-14T09:30:00Z"), Some(expected));
        assert_eq!(parse_calendar_date("2025-03-14T09:30:00.123"), Some(expected));
    }

    #[test]
    fn test_parse_calendar_date_rejects() {
        assert_eq!(parse_calendar_date(""), None);
        assert_eq!(parse_calendar_date("No records"), None);
        assert_eq!(parse_calendar_date("2025-02-30"), None);
    }
}
