use crate::external::price_provider::{HistoryProvider, PriceProviderError};
use crate::models::{DateRange, PricePoint, PriceSeries};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime};
use serde::Deserialize;
use tracing::debug;

/// Yahoo Finance chart API - no API key required.
pub struct YahooFinanceProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooFinanceProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    // Absent entirely when the range holds no trading days
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct YahooQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Unix-second bounds covering every bar dated within `range`.
fn period_bounds(range: DateRange) -> (i64, i64) {
    let start = range.start.and_time(NaiveTime::MIN).and_utc().timestamp();
    // period2 is exclusive upstream, so ask through the start of the next day
    let end = range
        .end
        .checked_add_days(Days::new(1))
        .unwrap_or(range.end)
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp();
    (start, end)
}

fn at(values: &[Option<f64>], idx: usize) -> Option<f64> {
    values.get(idx).copied().flatten()
}

fn parse_chart(symbol: &str, body: YahooChartResponse) -> Result<PriceSeries, PriceProviderError> {
    if let Some(error) = body.chart.error {
        if error.description.contains("No data found") {
            return Err(PriceProviderError::NoData(symbol.to_string()));
        }
        return Err(PriceProviderError::Unavailable(error.description));
    }

    let result = body
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| PriceProviderError::NoData(symbol.to_string()))?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    // Bars with a null close are market holidays or halted sessions
    let points: Vec<PricePoint> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(idx, ts)| {
            let close = at(&quote.close, idx)?;
            let timestamp = DateTime::from_timestamp(*ts, 0)?;
            Some(PricePoint {
                timestamp,
                open: at(&quote.open, idx).unwrap_or(close),
                high: at(&quote.high, idx).unwrap_or(close),
                low: at(&quote.low, idx).unwrap_or(close),
                close,
                volume: quote.volume.get(idx).copied().flatten().unwrap_or(0),
            })
        })
        .collect();

    if points.is_empty() {
        return Err(PriceProviderError::NoData(symbol.to_string()));
    }

    Ok(PriceSeries::new(symbol, points))
}

#[async_trait]
impl HistoryProvider for YahooFinanceProvider {
    async fn fetch_history(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<PriceSeries, PriceProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let (period1, period2) = period_bounds(range);

        debug!("Requesting Yahoo chart for {} ({} to {})", symbol, range.start, range.end);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("interval", "1d".to_string()),
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PriceProviderError::Unavailable(e.to_string()))?;

        if resp.status().as_u16() == 404 {
            return Err(PriceProviderError::NoData(symbol.to_string()));
        }
        if !resp.status().is_success() {
            return Err(PriceProviderError::Unavailable(format!("HTTP {}", resp.status())));
        }

        let body: YahooChartResponse = resp
            .json()
            .await
            .map_err(|e| PriceProviderError::Unavailable(e.to_string()))?;

        parse_chart(symbol, body)
    }
}
