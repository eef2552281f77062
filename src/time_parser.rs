//! Parsing of director-supplied timestamps.
//!
//! Directors have reported timestamps in several shapes across API versions.
//! [`TimeParser`] tries each known format in order and normalizes the result
//! to UTC. New formats go into [`TimeParser::default`]; call sites only ever
//! see `parse(raw) -> DateTime<Utc>`.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{DirectorError, Result};

/// A single timestamp layout the director is known to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// RFC 3339 / ISO 8601, e.g. `2016-01-09T06:23:25Z` or `...+02:00`.
    Rfc3339,
    /// Naive layout followed by a literal zone suffix, e.g.
    /// `2016-01-09 06:23:25 UTC`. The suffix must name UTC.
    NaiveUtc(&'static str),
    /// Layout carrying a numeric offset, e.g. `2016-01-09 06:23:25 +0000`.
    WithOffset(&'static str),
}

impl TimeFormat {
    fn parse(self, raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
        match self {
            TimeFormat::Rfc3339 => {
                DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
            }
            TimeFormat::NaiveUtc(layout) => {
                NaiveDateTime::parse_from_str(raw, layout).map(|t| t.and_utc())
            }
            TimeFormat::WithOffset(layout) => {
                DateTime::parse_from_str(raw, layout).map(|t| t.with_timezone(&Utc))
            }
        }
    }
}

/// Parses director timestamps against an ordered list of formats.
#[derive(Debug, Clone)]
pub struct TimeParser {
    formats: Vec<TimeFormat>,
}

impl Default for TimeParser {
    fn default() -> Self {
        TimeParser {
            formats: vec![
                TimeFormat::Rfc3339,
                TimeFormat::NaiveUtc("%Y-%m-%d %H:%M:%S UTC"),
                TimeFormat::WithOffset("%Y-%m-%d %H:%M:%S %z"),
            ],
        }
    }
}

impl TimeParser {
    /// Creates a parser that tries exactly `formats`, in order.
    pub fn with_formats(formats: Vec<TimeFormat>) -> Self {
        TimeParser { formats }
    }

    /// Parses `raw` with the first matching format.
    ///
    /// # Errors
    ///
    /// `DirectorError::Parse` when no format matches. The error from the last
    /// attempted format is kept as the source.
    pub fn parse(&self, raw: &str) -> Result<DateTime<Utc>> {
        let trimmed = raw.trim();
        let mut last_err = None;
        for format in &self.formats {
            match format.parse(trimmed) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => last_err = Some(e),
            }
        }
        Err(DirectorError::Parse {
            raw: raw.to_string(),
            source: last_err,
        })
    }
}
