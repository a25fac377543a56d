use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use thiserror::Error;

use crate::external::price_provider::PriceProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No data found for {0}")]
    NoData(String),
    #[error("Price provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Invalid date range: {0}")]
    InvalidRange(String),
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let message = self.to_string();
        match self {
            AppError::NoData(_) | AppError::UnknownSymbol(_) => {
                (StatusCode::NOT_FOUND, message).into_response()
            }
            AppError::InvalidRange(_) | AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            AppError::ProviderUnavailable(_) => {
                let mut headers = HeaderMap::new();
                headers.insert("Retry-After", HeaderValue::from_static("60"));
                (StatusCode::BAD_GATEWAY, headers, message).into_response()
            }
        }
    }
}

impl From<PriceProviderError> for AppError {
    fn from(value: PriceProviderError) -> Self {
        match value {
            PriceProviderError::NoData(symbol) => AppError::NoData(symbol),
            PriceProviderError::Unavailable(reason) => AppError::ProviderUnavailable(reason),
            PriceProviderError::InvalidRange(reason) => AppError::InvalidRange(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NoData("AAPL".into()), StatusCode::NOT_FOUND),
            (AppError::UnknownSymbol("ZZZ".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidRange("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::ProviderUnavailable("down".into()), StatusCode::BAD_GATEWAY),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_provider_errors_map_to_kinds() {
        assert!(matches!(
            AppError::from(PriceProviderError::NoData("AAPL".into())),
            AppError::NoData(s) if s == "AAPL"
        ));
        assert!(matches!(
            AppError::from(PriceProviderError::Unavailable("timeout".into())),
            AppError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            AppError::from(PriceProviderError::InvalidRange("start after end".into())),
            AppError::InvalidRange(_)
        ));
    }
}
