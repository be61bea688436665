// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
//   alpha = 2 / (period + 1)
//   EMA_t = alpha * close_t + (1 - alpha) * EMA_{t-1}
//
// Seeded with the SMA of the first `period` closes, so the first value lands
// on index `period - 1`.
// =============================================================================

/// EMA series over `closes`. Empty when `period` is zero or longer than the
/// history; a non-finite step truncates the series.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let (head, tail) = closes.split_at(period);
    let seed = head.iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut series = Vec::with_capacity(tail.len() + 1);
    series.push(seed);

    let mut current = seed;
    for &close in tail {
        current = alpha * close + (1.0 - alpha) * current;
        if !current.is_finite() {
            break;
        }
        series.push(current);
    }

    series
}

/// EMA as of the last close. With fewer than `period` closes the period
/// shrinks to the history length, which makes the value the plain mean.
pub fn ema_with_fallback(closes: &[f64], period: usize) -> Option<f64> {
    if closes.is_empty() || period == 0 {
        return None;
    }
    calculate_ema(closes, period.min(closes.len())).last().copied()
}
