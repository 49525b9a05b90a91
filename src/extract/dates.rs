//! Date parsing for export timestamps
//!
//! Exports render dates with the board's configured display format; the
//! pattern is therefore a runtime setting, not a constant. Listing pages
//! often show a date with no time component, so a date-only fallback is
//! always tried.

use chrono::{NaiveDate, NaiveDateTime};

use super::ExtractError;

/// Default display pattern for datetimes in exports.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Date-only fallback used by listing pages.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses display dates to Unix timestamps. Cheap to clone, safe to share.
#[derive(Debug, Clone)]
pub struct DateParser {
    datetime_format: String,
    date_format: String,
}

impl Default for DateParser {
    fn default() -> Self {
        Self {
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl DateParser {
    /// Use a custom datetime pattern (chrono `strftime` syntax). The
    /// date-only fallback is derived by dropping everything from the first
    /// time specifier onward, falling back to the default when that leaves
    /// nothing useful.
    pub fn with_format(datetime_format: &str) -> Self {
        let date_format = datetime_format
            .split(" %H")
            .next()
            .filter(|f| f.contains('%'))
            .unwrap_or(DEFAULT_DATE_FORMAT)
            .to_string();
        Self {
            datetime_format: datetime_format.to_string(),
            date_format,
        }
    }

    /// Parse a display date to seconds since the Unix epoch. Dates are
    /// taken as UTC; the source does not expose its time zone.
    pub fn parse(&self, text: &str) -> Result<i64, ExtractError> {
        let text = text.trim();
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, &self.datetime_format) {
            return Ok(datetime.and_utc().timestamp());
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, &self.date_format) {
            if let Some(datetime) = date.and_hms_opt(0, 0, 0) {
                return Ok(datetime.and_utc().timestamp());
            }
        }
        Err(ExtractError::BadDate(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_datetime() {
        let parser = DateParser::default();
        assert_eq!(parser.parse("1970-01-01 00:00:10").unwrap(), 10);
        assert_eq!(parser.parse("2005-09-14 21:29:31").unwrap(), 1_126_733_371);
    }

    #[test]
    fn date_only_falls_back_to_midnight() {
        let parser = DateParser::default();
        assert_eq!(parser.parse("1970-01-02").unwrap(), 86_400);
    }

    #[test]
    fn custom_format() {
        let parser = DateParser::with_format("%d.%m.%Y %H:%M:%S");
        assert_eq!(parser.parse("02.01.1970 00:00:00").unwrap(), 86_400);
        // Derived date-only fallback
        assert_eq!(parser.parse("02.01.1970").unwrap(), 86_400);
    }

    #[test]
    fn garbage_is_an_error() {
        let parser = DateParser::default();
        assert!(matches!(
            parser.parse("Yesterday"),
            Err(ExtractError::BadDate(_))
        ));
    }
}
