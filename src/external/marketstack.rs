use crate::external::price_provider::{LiveQuoteProvider, PriceProviderError};
use crate::models::LiveQuote;
use async_trait::async_trait;
use serde::Deserialize;

/// Marketstack end-of-day API, used for the latest close of tracked symbols.
///
/// The access key travels as a query parameter, so it is only ever read from
/// configuration and never logged. Request pacing is the caller's job; the
/// poller holds the rate limiter so waiting never eats into a fetch timeout.
pub struct MarketstackProvider {
    client: reqwest::Client,
    base_url: String,
    access_key: String,
}

impl MarketstackProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_key: access_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarketstackResponse {
    #[serde(default)]
    data: Vec<MarketstackBar>,
    error: Option<MarketstackError>,
}

#[derive(Debug, Deserialize)]
struct MarketstackBar {
    symbol: Option<String>,
    close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketstackError {
    code: Option<String>,
    message: String,
}

fn parse_latest(symbol: &str, body: MarketstackResponse) -> Result<LiveQuote, PriceProviderError> {
    if let Some(error) = body.error {
        let code = error.code.unwrap_or_else(|| "unknown".to_string());
        return Err(PriceProviderError::Unavailable(format!("{}: {}", code, error.message)));
    }

    let bar = body
        .data
        .into_iter()
        .find(|bar| {
            bar.symbol
                .as_deref()
                .map_or(true, |s| s.eq_ignore_ascii_case(symbol))
        })
        .ok_or_else(|| PriceProviderError::NoData(symbol.to_string()))?;

    let close = bar
        .close
        .ok_or_else(|| PriceProviderError::NoData(symbol.to_string()))?;

    Ok(LiveQuote::new(symbol, close))
}

#[async_trait]
impl LiveQuoteProvider for MarketstackProvider {
    async fn fetch_live(&self, symbol: &str) -> Result<LiveQuote, PriceProviderError> {
        let url = format!("{}/eod/latest", self.base_url);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("access_key", self.access_key.as_str()),
                ("symbols", symbol),
            ])
            .send()
            .await
            // reqwest errors carry the full URL, access key included
            .map_err(|e| PriceProviderError::Unavailable(e.without_url().to_string()))?;

        let status = resp.status();
        let body: MarketstackResponse = resp
            .json()
            .await
            .map_err(|e| PriceProviderError::Unavailable(e.without_url().to_string()))?;

        if !status.is_success() && body.error.is_none() {
            return Err(PriceProviderError::Unavailable(format!("HTTP {}", status)));
        }

        parse_latest(symbol, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<LiveQuote, PriceProviderError> {
        let body: MarketstackResponse = serde_json::from_str(json).unwrap();
        parse_latest("AAPL", body)
    }

    #[test]
    fn test_parse_latest_close() {
        let quote = parse(
            r#"{"pagination":{"count":1},"data":[{"symbol":"AAPL","close":189.84,"date":"2024-05-10T00:00:00+0000"}]}"#,
        )
        .unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, 189.84);
    }

    #[test]
    fn test_empty_data_is_no_data() {
        assert_eq!(
            parse(r#"{"data":[]}"#).unwrap_err(),
            PriceProviderError::NoData("AAPL".to_string())
        );
        assert_eq!(
            parse(r#"{"data":[{"symbol":"AAPL","close":null}]}"#).unwrap_err(),
            PriceProviderError::NoData("AAPL".to_string())
        );
    }

    #[test]
    fn test_error_body_is_unavailable() {
        let err = parse(
            r#"{"error":{"code":"invalid_access_key","message":"You have not supplied a valid API Access Key."}}"#,
        )
        .unwrap_err();

        assert!(matches!(err, PriceProviderError::Unavailable(msg) if msg.starts_with("invalid_access_key")));
    }
}
