// =============================================================================
// Price Statistics
// =============================================================================
//
// Summary statistics over the closing prices of a validated series.
// `std` is the population standard deviation (divide by N), so a one-bar
// series has std 0. A constant series reports its close as the mean, with
// std exactly 0.

use crate::indicators::bollinger::is_flat;
use crate::price_series::PriceSeries;
use crate::types::PriceStatistics;

/// Summarise the closes of `series`.
pub fn summarize(series: &PriceSeries) -> PriceStatistics {
    let closes = series.closes();
    let n = closes.len() as f64;

    let (mean, std) = if is_flat(&closes) {
        (closes[0], 0.0)
    } else {
        let mean = closes.iter().sum::<f64>() / n;
        let variance = closes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    };

    let min = closes.iter().copied().fold(f64::INFINITY, f64::min);
    let max = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    PriceStatistics {
        mean,
        std,
        min,
        max,
        median: median(closes),
    }
}

/// Median of a non-empty slice; mean of the two middle values for even
/// lengths.
fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
