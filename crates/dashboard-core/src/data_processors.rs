use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::FieldParseError;

// ── DateParser ────────────────────────────────────────────────────────────────

/// Parses the date-bearing fields of subscription exports.
pub struct DateParser;

impl DateParser {
    const DATETIME_FORMATS: &'static [&'static str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y %I:%M:%S %p",
        "%m/%d/%Y %I:%M %p",
    ];

    const DATE_FORMATS: &'static [&'static str] =
        &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y", "%b %d, %Y"];

    /// Parse one cell of the column `field`.
    ///
    /// Offsets in RFC 3339 values are dropped after conversion to the local
    /// wall-clock of that offset, so the calendar month is the one written in
    /// the source.
    pub fn parse(field: &'static str, value: &str) -> Result<NaiveDateTime, FieldParseError> {
        let s = value.trim();
        let failure = || FieldParseError {
            field,
            value: value.to_string(),
        };

        if s.is_empty() {
            return Err(failure());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.naive_local());
        }

        for fmt in Self::DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(naive);
            }
        }

        for fmt in Self::DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return date.and_hms_opt(0, 0, 0).ok_or_else(failure);
            }
        }

        Err(failure())
    }
}

// ── Cell text helpers ─────────────────────────────────────────────────────────

/// Map an empty or whitespace-only cell to the missing marker.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Render a float cell the way a spreadsheet shows it: integral values lose
/// their fractional part so numeric account ids stay stable keys.
pub fn format_float_cell(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Title-case `s`: the first cased character after any non-letter is
/// upper-cased, every other letter lower-cased.
///
/// ```
/// use dashboard_core::data_processors::title_case;
///
/// assert_eq!(title_case("PORTLAND"), "Portland");
/// assert_eq!(title_case("new york"), "New York");
/// assert_eq!(title_case("o'fallon"), "O'Fallon");
/// ```
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn parse(s: &str) -> Option<NaiveDateTime> {
        DateParser::parse("LastStartDate", s).ok()
    }

    #[test]
    fn test_parse_iso_date() {
        let dt = parse("2020-01-15").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2020, 1, 15));
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_parse_iso_datetime_variants() {
        assert!(parse("2020-01-15T10:30:00").is_some());
        assert!(parse("2020-01-15 10:30:00").is_some());
        assert!(parse("2020-01-15 10:30:00.250").is_some());
        assert!(parse("2020-01-15 10:30").is_some());
    }

    #[test]
    fn test_parse_rfc3339_keeps_wall_clock_month() {
        // 23:30 on Jan 31st at -05:00 is already February in UTC.
        let dt = parse("2020-01-31T23:30:00-05:00").unwrap();
        assert_eq!(dt.month(), 1);
        assert!(parse("2020-01-15T10:00:00Z").is_some());
    }

    #[test]
    fn test_parse_us_formats() {
        let dt = parse("01/20/2020").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2020, 1, 20));
        assert!(parse("1/20/2020 14:05").is_some());
        assert!(parse("01/20/2020 2:05:00 PM").is_some());
        assert!(parse("15-Jan-2020").is_some());
    }

    #[test]
    fn test_parse_whitespace_tolerated() {
        assert!(parse("  2020-01-15  ").is_some());
    }

    #[test]
    fn test_parse_failure_carries_field_and_value() {
        let err = DateParser::parse("OriginalStartDate", "soon").unwrap_err();
        assert_eq!(err.field, "OriginalStartDate");
        assert_eq!(err.value, "soon");
        assert!(DateParser::parse("LastStartDate", "").is_err());
        assert!(DateParser::parse("LastStartDate", "2020-02-30").is_err());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("x")), Some("x"));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_format_float_cell() {
        assert_eq!(format_float_cell(12345.0), "12345");
        assert_eq!(format_float_cell(-3.0), "-3");
        assert_eq!(format_float_cell(1.5), "1.5");
    }

    #[test]
    fn test_title_case_collapses_spellings() {
        assert_eq!(title_case("PORTLAND"), "Portland");
        assert_eq!(title_case("portland"), "Portland");
        assert_eq!(title_case("Portland"), "Portland");
        assert_eq!(title_case("SAINT PAUL"), "Saint Paul");
        assert_eq!(title_case("winston-salem"), "Winston-Salem");
        assert_eq!(title_case(""), "");
    }
}
