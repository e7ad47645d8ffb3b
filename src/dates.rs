use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// ISO-8601 date-time formats, with optional fractional seconds.
const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Other date-time formats tried, after [`ISO_FORMATS`], when coercing a
/// date cell.
const FORMATS: &[&str] = &["%m/%d/%Y %H:%M", "%m/%d/%Y %H:%M:%S"];

/// Date-only formats tried, in order, when coercing a date cell.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Parses a strict ISO-8601 date (`2023-01-15`) or date-time
/// (`2023-01-15 10:30:00`, `2023-01-15T10:30`, `2023-01-15 10:30:00.250`).
///
/// This is the cheap attempt made while loading; anything else is left for
/// [`DateParser::coerce`].
#[must_use]
pub fn parse_iso(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .or_else(|| parse_any(text, ISO_FORMATS))
}

/// Coerces date text to a date-time, turning anything unparseable into
/// `None` instead of an error.
#[derive(Debug, Clone, Default)]
pub struct DateParser {
    format: Option<String>,
}

impl DateParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser that tries the `chrono` format string `format` before
    /// the built-in formats.
    ///
    /// The format may describe either a date or a date-time.
    #[must_use]
    pub fn with_format(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
        }
    }

    /// Returns the date-time represented by `text`, or `None` if it is empty
    /// or matches none of the known formats.
    #[must_use]
    pub fn coerce(&self, text: &str) -> Option<NaiveDateTime> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(format) = &self.format {
            if let Some(parsed) = parse_with(text, format) {
                return Some(parsed);
            }
        }
        // Keep the wall-clock time; the offset is not applied.
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.naive_local());
        }
        parse_any(text, ISO_FORMATS)
            .or_else(|| parse_any(text, FORMATS))
            .or_else(|| {
                DATE_FORMATS
                    .iter()
                    .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }
}

fn parse_any(text: &str, formats: &[&str]) -> Option<NaiveDateTime> {
    formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
}

fn parse_with(text: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::month::Month;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn parse_iso_fn_accepts_minutes_and_fractional_seconds() {
        assert_eq!(
            parse_iso("2023-01-15 10:30"),
            ymd(2023, 1, 15).date().and_hms_opt(10, 30, 0)
        );
        assert_eq!(
            parse_iso("2023-01-15T10:30:00.5"),
            ymd(2023, 1, 15).date().and_hms_milli_opt(10, 30, 0, 500)
        );
    }

    #[test]
    fn parse_iso_fn_accepts_only_iso_dates() {
        assert_eq!(parse_iso("2023-01-15"), Some(ymd(2023, 1, 15)));
        assert_eq!(
            parse_iso("2023-01-15 10:30:00"),
            NaiveDate::from_ymd_opt(2023, 1, 15)
                .unwrap()
                .and_hms_opt(10, 30, 0)
        );
        assert_eq!(parse_iso("1/15/2023"), None);
    }

    #[test]
    fn coerce_fn_understands_common_formats() {
        let parser = DateParser::new();
        assert_eq!(parser.coerce("2023-01-15"), Some(ymd(2023, 1, 15)));
        assert_eq!(parser.coerce("1/15/2023"), Some(ymd(2023, 1, 15)));
        assert_eq!(parser.coerce("15-01-2023"), Some(ymd(2023, 1, 15)));
        assert_eq!(parser.coerce("2023/01/15"), Some(ymd(2023, 1, 15)));
        assert_eq!(parser.coerce("15.01.2023"), Some(ymd(2023, 1, 15)));
        assert_eq!(
            parser.coerce("2023-01-15T23:00:00+00:00"),
            ymd(2023, 1, 15).date().and_hms_opt(23, 0, 0)
        );
        assert_eq!(
            parser.coerce("2023-01-15 10:30"),
            ymd(2023, 1, 15).date().and_hms_opt(10, 30, 0)
        );
        assert_eq!(
            parser.coerce("2023-01-15T10:30"),
            ymd(2023, 1, 15).date().and_hms_opt(10, 30, 0)
        );
        assert_eq!(
            parser.coerce("2023-01-15 10:30:00.250"),
            ymd(2023, 1, 15).date().and_hms_milli_opt(10, 30, 0, 250)
        );
    }

    #[test]
    fn coerce_fn_keeps_wall_clock_time_for_offset_dates() {
        let parsed = DateParser::new().coerce("2023-01-31T23:30:00-05:00").unwrap();
        assert_eq!(parsed, ymd(2023, 1, 31).date().and_hms_opt(23, 30, 0).unwrap());
        assert_eq!(Month::of(&parsed), Month::new(2023, 1).unwrap());
    }

    #[test]
    fn coerce_fn_returns_none_for_empty_or_malformed_text() {
        let parser = DateParser::new();
        assert_eq!(parser.coerce(""), None);
        assert_eq!(parser.coerce("   "), None);
        assert_eq!(parser.coerce("not-a-date"), None);
        assert_eq!(parser.coerce("2023-13-01"), None);
        assert_eq!(parser.coerce("2/30/2023"), None);
    }

    #[test]
    fn coerce_fn_tries_custom_format_first() {
        // Day-first slashes would otherwise be read as month-first.
        let parser = DateParser::with_format("%d/%m/%Y");
        assert_eq!(parser.coerce("03/02/2023"), Some(ymd(2023, 2, 3)));
        assert_eq!(DateParser::new().coerce("03/02/2023"), Some(ymd(2023, 3, 2)));
    }
}
