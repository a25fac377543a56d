use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{error, info};

use crate::errors::AppError;
use crate::external::price_provider::HistoryProvider;
use crate::models::{ChangeAlert, DateRange, LiveQuote, PriceSeries, TrackedSymbols};
use crate::services::change_detector;
use crate::services::freshness_cache::{Cached, FreshnessCache};

const CSV_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Trim and upper-case a ticker from a request path.
pub fn normalize_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = raw.trim().to_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 16
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    if !valid {
        return Err(AppError::Validation(format!("invalid symbol '{}'", raw)));
    }
    Ok(symbol)
}

/// Resolve optional `YYYY-MM-DD` bounds. A missing start defaults to a year
/// before today and a missing end to today, as the dashboard's date pickers do.
pub fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<DateRange, AppError> {
    let default = DateRange::trailing_year(today);
    let start = match start.filter(|s| !s.trim().is_empty()) {
        Some(s) => DateRange::parse(s, s)?.start,
        None => default.start,
    };
    let end = match end.filter(|s| !s.trim().is_empty()) {
        Some(s) => DateRange::parse(s, s)?.end,
        None => default.end,
    };
    Ok(DateRange::new(start, end)?)
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub async fn get_history(
    cache: &FreshnessCache,
    provider: &dyn HistoryProvider,
    symbol: &str,
    range: DateRange,
) -> Result<Cached<Arc<PriceSeries>>, AppError> {
    cache
        .get_series(provider, symbol, range)
        .await
        .map_err(|e| {
            error!("Failed to load price history for {}: {}", symbol, e);
            AppError::from(e)
        })
}

pub async fn latest_alert(
    cache: &FreshnessCache,
    provider: &dyn HistoryProvider,
    symbol: &str,
    range: DateRange,
    threshold_pct: f64,
) -> Result<Option<ChangeAlert>, AppError> {
    let history = get_history(cache, provider, symbol, range).await?;
    let alert = change_detector::check(&history.value, threshold_pct);
    if let Some(alert) = &alert {
        info!("{}", alert);
    }
    Ok(alert)
}

/// Latest polled quote for a tracked symbol.
pub fn latest_quote(
    cache: &FreshnessCache,
    symbols: &TrackedSymbols,
    symbol: &str,
) -> Result<LiveQuote, AppError> {
    if !symbols.contains(symbol) {
        return Err(AppError::UnknownSymbol(symbol.to_string()));
    }
    cache
        .get_live(symbol)
        .ok_or_else(|| AppError::NoData(format!("{} (not polled yet)", symbol)))
}

/// Render a series as `Date,Open,High,Low,Close,Volume` CSV.
pub fn series_to_csv(series: &PriceSeries) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let to_error = |e: csv::Error| AppError::Validation(format!("CSV export failed: {}", e));

    writer
        .write_record(["Date", "Open", "High", "Low", "Close", "Volume"])
        .map_err(to_error)?;

    for point in series.points() {
        writer
            .write_record([
                point.timestamp.format(CSV_DATE_FORMAT).to_string(),
                point.open.to_string(),
                point.high.to_string(),
                point.low.to_string(),
                point.close.to_string(),
                point.volume.to_string(),
            ])
            .map_err(to_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Validation(format!("CSV export failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PricePoint, Symbol};
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk.b").unwrap(), "BRK.B");
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
        assert!(normalize_symbol("").is_err());
        assert!(normalize_symbol("AA PL").is_err());
        assert!(normalize_symbol("../etc").is_err());
    }

    #[test]
    fn test_resolve_range_defaults() {
        let today = day(2024, 12, 31);

        let range = resolve_range(None, None, today).unwrap();
        assert_eq!(range, DateRange::trailing_year(today));

        let range = resolve_range(Some("2024-06-01"), None, today).unwrap();
        assert_eq!(range.start, day(2024, 6, 1));
        assert_eq!(range.end, today);

        let range = resolve_range(None, Some("2024-06-01"), today).unwrap();
        assert_eq!(range.start, day(2024, 1, 1));
        assert_eq!(range.end, day(2024, 6, 1));

        let range = resolve_range(Some(""), Some(" "), today).unwrap();
        assert_eq!(range, DateRange::trailing_year(today));
    }

    #[test]
    fn test_resolve_range_rejects_inverted_or_garbage() {
        let today = day(2024, 12, 31);
        assert!(matches!(
            resolve_range(Some("2024-06-01"), Some("2024-05-01"), today),
            Err(AppError::InvalidRange(_))
        ));
        assert!(matches!(
            resolve_range(Some("06/01/2024"), None, today),
            Err(AppError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_latest_quote_checks_tracked_symbols() {
        let cache = FreshnessCache::default();
        let symbols = TrackedSymbols::new(vec![Symbol {
            ticker: "AAPL".into(),
            name: "Apple".into(),
        }])
        .unwrap();

        assert!(matches!(
            latest_quote(&cache, &symbols, "TSLA"),
            Err(AppError::UnknownSymbol(_))
        ));
        assert!(matches!(latest_quote(&cache, &symbols, "AAPL"), Err(AppError::NoData(_))));

        cache.put_live(LiveQuote::new("AAPL", 191.0));
        assert_eq!(latest_quote(&cache, &symbols, "AAPL").unwrap().price, 191.0);
    }

    #[test]
    fn test_series_to_csv() {
        let series = PriceSeries::new(
            "AAPL",
            vec![PricePoint {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap(),
                open: 187.15,
                high: 188.44,
                low: 183.89,
                close: 185.64,
                volume: 82488700,
            }],
        );

        let csv = String::from_utf8(series_to_csv(&series).unwrap()).unwrap();
        assert_eq!(
            csv,
            "Date,Open,High,Low,Close,Volume\n2024-01-02 14:30:00,187.15,188.44,183.89,185.64,82488700\n"
        );
    }
}
