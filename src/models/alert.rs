use serde::Serialize;
use std::fmt;

/// A close-to-close move that crossed the configured threshold.
///
/// Derived on demand from a series; never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeAlert {
    pub symbol: String,
    pub change_pct: f64,
    pub latest_price: f64,
    pub previous_price: f64,
    pub threshold_pct: f64,
}

impl ChangeAlert {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChangeAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "🚨 {} price changed by {:.2}% (Latest: ${:.2})",
            self.symbol, self.change_pct, self.latest_price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_message_format() {
        let alert = ChangeAlert {
            symbol: "AAPL".to_string(),
            change_pct: -6.0,
            latest_price: 94.0,
            previous_price: 100.0,
            threshold_pct: 5.0,
        };

        assert_eq!(alert.message(), "🚨 AAPL price changed by -6.00% (Latest: $94.00)");
    }
}
