use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CompilerError, Result};

static ISO_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:[T ].*)?$").expect("static ISO date pattern")
});

/// Long-form layouts seen in notices and press releases, tried in order.
const TEXT_FORMATS: &[&str] = &[
    "%B %d, %Y", // January 15, 2026
    "%b %d, %Y", // Jan 15, 2026
    "%b. %d, %Y", // Jan. 15, 2026
    "%m/%d/%Y",  // 01/15/2026
    "%B %d %Y",  // January 15 2026
];

/// Parse a date string into the canonical representation. Timestamps keep only
/// their date part.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let invalid = || CompilerError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    };

    if let Some(caps) = ISO_PREFIX.captures(trimmed) {
        return NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").map_err(|_| invalid());
    }

    let text = trimmed.trim_end_matches('.');
    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .ok_or_else(invalid)
}

/// Required date: absent or blank is a missing field, unparsable is a bad date.
pub fn require_date(field: &str, value: Option<&str>) -> Result<NaiveDate> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(field, v),
        None => Err(CompilerError::MissingField(field.to_string())),
    }
}

/// Optional date: absent or blank is `None`, present but unparsable is an error.
pub fn optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => parse_date(field, v).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_accepted_layouts() {
        let expected = d(2026, 1, 15);
        for input in [
            "2026-01-15",
            "2026-01-15T00:00:00.000Z",
            "2026-01-15T00:00:00Z",
            "January 15, 2026",
            "Jan 15, 2026",
            "Jan. 15, 2026",
            "01/15/2026",
            "January 15 2026",
            "  January 15, 2026. ",
        ] {
            assert_eq!(parse_date("declarationDate", input).unwrap(), expected, "{}", input);
        }
    }

    #[test]
    fn test_unparsable_dates_are_errors() {
        for input in ["2026-02-30", "15/01/2026", "next tuesday", "2026"] {
            assert!(parse_date("incidentStart", input).is_err(), "{}", input);
        }
    }

    #[test]
    fn test_missing_versus_invalid() {
        assert!(matches!(
            require_date("incidentStart", None),
            Err(CompilerError::MissingField(_))
        ));
        assert!(matches!(
            require_date("incidentStart", Some("  ")),
            Err(CompilerError::MissingField(_))
        ));
        assert_eq!(optional_date("incidentEnd", Some("")).unwrap(), None);
        assert!(optional_date("incidentEnd", Some("garbage")).is_err());
    }
}
