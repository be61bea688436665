// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), where σ is the sample standard deviation of
// the trailing window.
//
//   bandwidth = (upper - lower) / middle        (0 when middle == 0)
//   percent_b = (close - lower) / (upper - lower)  (0.5 when the band is flat)
//
// The window shrinks to the available history. A window where every close is
// identical (including a one-close window) is a flat band at that close; it
// is detected from min == max rather than from the computed deviation, which
// carries rounding noise for prices with no exact binary representation.
// =============================================================================

use crate::types::BollingerBands;

/// Calculate Bollinger Bands as of the last close.
///
/// Returns `None` only for empty input or `period == 0`.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerBands> {
    if closes.is_empty() || period == 0 {
        return None;
    }

    let window = &closes[closes.len() - period.min(closes.len())..];
    let n = window.len() as f64;

    let (middle, std_dev) = if is_flat(window) {
        (window[0], 0.0)
    } else {
        let middle = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / (n - 1.0);
        (middle, variance.sqrt())
    };

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;

    let bandwidth = if middle == 0.0 {
        0.0
    } else {
        (upper - lower) / middle
    };

    let last_close = closes[closes.len() - 1];
    let percent_b = if upper == lower {
        0.5
    } else {
        (last_close - lower) / (upper - lower)
    };

    Some(BollingerBands {
        upper,
        middle,
        lower,
        bandwidth,
        percent_b,
    })
}

/// Every value in `window` is the same.
pub(crate) fn is_flat(window: &[f64]) -> bool {
    window.windows(2).all(|w| w[0] == w[1])
}
