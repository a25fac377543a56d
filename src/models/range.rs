use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::external::price_provider::PriceProviderError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive calendar-day window for a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PriceProviderError> {
        if start > end {
            return Err(PriceProviderError::InvalidRange(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds, as sent by the dashboard's date pickers.
    pub fn parse(start: &str, end: &str) -> Result<Self, PriceProviderError> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        Self::new(start, end)
    }

    /// One year back from `today`, the default dashboard window.
    pub fn trailing_year(today: NaiveDate) -> Self {
        let start = today.checked_sub_days(Days::new(365)).unwrap_or(NaiveDate::MIN);
        Self { start, end: today }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, PriceProviderError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
        PriceProviderError::InvalidRange(format!("unparseable date '{}': {}", value, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_range() {
        let range = DateRange::parse("2024-01-01", "2024-06-30").unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
    }

    #[test]
    fn test_single_day_range_is_valid() {
        assert!(DateRange::parse("2024-01-01", "2024-01-01").is_ok());
    }

    #[test]
    fn test_start_after_end_is_rejected() {
        let err = DateRange::parse("2024-06-30", "2024-01-01").unwrap_err();
        assert!(matches!(err, PriceProviderError::InvalidRange(_)));
    }

    #[test]
    fn test_unparseable_date_is_rejected() {
        let err = DateRange::parse("yesterday", "2024-01-01").unwrap_err();
        assert!(matches!(err, PriceProviderError::InvalidRange(_)));

        let err = DateRange::parse("2024-01-01", "2024-13-01").unwrap_err();
        assert!(matches!(err, PriceProviderError::InvalidRange(_)));
    }

    #[test]
    fn test_trailing_year() {
        let today = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let range = DateRange::trailing_year(today);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.end, today);
    }
}
