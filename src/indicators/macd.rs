// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
// MACD = EMA(fast) - EMA(slow), both over closing prices.
//
// Each EMA shrinks its period to the available history, so a 15-bar series
// still yields a value: EMA(12) runs normally while EMA(26) degrades to the
// 15-bar SMA. Below `fast` bars both sides are the plain mean and MACD is 0.
// =============================================================================

use super::ema::ema_with_fallback;

/// MACD line value as of the last close. Empty input yields 0.0.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize) -> f64 {
    match (
        ema_with_fallback(closes, fast),
        ema_with_fallback(closes, slow),
    ) {
        (Some(fast_ema), Some(slow_ema)) => fast_ema - slow_ema,
        _ => 0.0,
    }
}
