use crate::models::{ChangeAlert, PriceSeries};

pub const DEFAULT_THRESHOLD_PCT: f64 = 5.0;

/// Compare the two most recent closes of `series` and return an alert when
/// the absolute percentage move is at least `threshold_pct`.
///
/// Needs two bars. A previous close of zero, or any non-finite result, is
/// suppressed rather than reported.
pub fn check(series: &PriceSeries, threshold_pct: f64) -> Option<ChangeAlert> {
    let (prev, last) = series.last_two()?;

    if prev.close == 0.0 {
        return None;
    }

    let change_pct = (last.close - prev.close) / prev.close * 100.0;
    if !change_pct.is_finite() || change_pct.abs() < threshold_pct {
        return None;
    }

    Some(ChangeAlert {
        symbol: series.symbol().to_string(),
        change_pct,
        latest_price: last.close,
        previous_price: prev.close,
        threshold_pct,
    })
}
