//! Date proximity between a target date and a candidate's release date.
//!
//! Distances are whole calendar days. `None` is the "no information"
//! sentinel (infinitely far): a missing or unparseable date on either side.

use chrono::{DateTime, NaiveDate};

/// A target date as it arrives from the tracking database or a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateInput<'a> {
    Missing,
    /// ISO-ish text, a bare year, or a string of epoch seconds.
    Text(&'a str),
    /// Unix epoch seconds.
    Epoch(i64),
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(s: &'a str) -> Self {
        DateInput::Text(s)
    }
}

impl<'a> From<Option<&'a str>> for DateInput<'a> {
    fn from(s: Option<&'a str>) -> Self {
        s.map_or(DateInput::Missing, DateInput::Text)
    }
}

impl From<i64> for DateInput<'_> {
    fn from(secs: i64) -> Self {
        DateInput::Epoch(secs)
    }
}

/// Longest all-digit string still read as a year rather than epoch seconds.
const MAX_YEAR_DIGITS: usize = 4;

/// UTC calendar date of a Unix timestamp.
pub fn epoch_to_date(secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

/// Parse the leading `YYYY-MM-DD` of a string (extra characters ignored).
/// Strings shorter than ten characters are parsed whole, so `2020-1-5` works.
pub fn parse_iso_prefix(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let prefix = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

impl DateInput<'_> {
    /// Resolve to a calendar date, if possible.
    pub fn to_date(self) -> Option<NaiveDate> {
        match self {
            DateInput::Missing => None,
            DateInput::Epoch(secs) => epoch_to_date(secs),
            DateInput::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else if s.bytes().all(|b| b.is_ascii_digit()) {
                    if s.len() <= MAX_YEAR_DIGITS {
                        let year: i32 = s.parse().ok()?;
                        NaiveDate::from_ymd_opt(year, 1, 1)
                    } else {
                        epoch_to_date(s.parse().ok()?)
                    }
                } else {
                    parse_iso_prefix(s)
                }
            }
        }
    }
}

/// Absolute day distance between `target` and a candidate date string.
///
/// The candidate is read from its first ten characters as `YYYY-MM-DD`.
/// Returns `None` when either side is missing or unparseable.
pub fn date_distance<'a>(target: impl Into<DateInput<'a>>, candidate: Option<&str>) -> Option<u64> {
    let target = target.into().to_date()?;
    let candidate = parse_iso_prefix(candidate?)?;
    Some((target - candidate).num_days().unsigned_abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_distance() {
        assert_eq!(date_distance("2020-01-10", Some("2020-01-01")), Some(9));
        assert_eq!(date_distance("2020-01-01", Some("2020-01-10")), Some(9));
        assert_eq!(date_distance("2020-01-10", Some("2021-01-01")), Some(357));
        assert_eq!(date_distance("2024-03-01", Some("2024-03-01")), Some(0));
    }

    #[test]
    fn test_epoch_matches_iso() {
        // 2021-01-01T00:00:00Z
        assert_eq!(date_distance(1_609_459_200i64, Some("2021-01-01")), Some(0));
        assert_eq!(date_distance("1609459200", Some("2021-01-01")), Some(0));
        assert_eq!(date_distance(1_609_459_200i64 + 86_399, Some("2021-01-01")), Some(0));
    }

    #[test]
    fn test_candidate_extra_characters_ignored() {
        assert_eq!(date_distance("2020-05-01", Some("2020-05-03T12:00:00Z")), Some(2));
        assert_eq!(date_distance("2020-05-01T08:00:00.000+02:00", Some("2020-05-01")), Some(0));
    }

    #[test]
    fn test_short_candidate_date_parses_whole() {
        assert_eq!(date_distance("2020-01-10", Some("2020-1-5")), Some(5));
        assert_eq!(date_distance("2020-03-01", Some("2020-3-1")), Some(0));
        assert_eq!(parse_iso_prefix("1999-12-3"), NaiveDate::from_ymd_opt(1999, 12, 3));
    }

    #[test]
    fn test_bare_year_target() {
        assert_eq!(date_distance("2020", Some("2020-01-31")), Some(30));
    }

    #[test]
    fn test_missing_or_malformed_is_none() {
        assert_eq!(date_distance(None::<&str>, Some("2020-01-01")), None);
        assert_eq!(date_distance("2020-01-01", None), None);
        assert_eq!(date_distance("", Some("2020-01-01")), None);
        assert_eq!(date_distance("2020-01-01", Some("")), None);
        assert_eq!(date_distance("soon", Some("2020-01-01")), None);
        assert_eq!(date_distance("2020-01-01", Some("2020")), None);
        assert_eq!(date_distance("2020-13-45", Some("2020-01-01")), None);
        assert_eq!(date_distance(DateInput::Missing, Some("2020-01-01")), None);
    }
}
