//! Date range handling for report queries.

use crate::error::{Result, ServiceError};
use chrono::NaiveDate;
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ServiceError::InvalidRequest(
                "startDate must not be after endDate".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parses the `startDate` / `endDate` query parameters.
    pub fn from_params(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = parse_date("startDate", start)?;
        let end = parse_date("endDate", end)?;
        Self::new(start, end)
    }

    /// `BETWEEN` predicate over a date-typed SQL expression.
    pub fn between(&self, column: &str) -> String {
        format!("{column} BETWEEN '{}' AND '{}'", self.start, self.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

fn parse_date(name: &str, raw: Option<&str>) -> Result<NaiveDate> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ServiceError::InvalidRequest(format!("{name} is required")))?;

    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        ServiceError::InvalidRequest(format!("{name} must be a YYYY-MM-DD date, got '{raw}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inclusive_range() {
        let range = DateRange::from_params(Some("2024-01-01"), Some(" 2024-01-31 ")).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(
            range.between("(date_time->>'date')::date"),
            "(date_time->>'date')::date BETWEEN '2024-01-01' AND '2024-01-31'"
        );
    }

    #[test]
    fn single_day_range_is_allowed() {
        assert!(DateRange::from_params(Some("2024-03-05"), Some("2024-03-05")).is_ok());
    }

    #[test]
    fn rejects_missing_or_malformed_dates() {
        let missing = DateRange::from_params(None, Some("2024-01-01")).unwrap_err();
        assert_eq!(missing.to_string(), "invalid request: startDate is required");

        let malformed =
            DateRange::from_params(Some("2024-01-01"), Some("2024-01-01' OR 1=1 --")).unwrap_err();
        assert!(malformed.to_string().contains("endDate must be a YYYY-MM-DD date"));
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::from_params(Some("2024-02-01"), Some("2024-01-01")).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }
}
