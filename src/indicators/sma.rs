// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// SMA_t = mean(close_{t-period+1} ..= close_t)
//
// When the history is shorter than `period`, the reported value uses every
// close available (window = min(period, len)) instead of returning nothing.
// =============================================================================

/// Compute the full SMA series for `closes` and `period`.
///
/// Each output element corresponds to a close starting at index `period - 1`.
/// Returns an empty vec when `period == 0` or there are fewer than `period`
/// closes.
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let period_f = period as f64;
    let mut sum: f64 = closes[..period].iter().sum();
    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(sum / period_f);

    for i in period..closes.len() {
        sum += closes[i] - closes[i - period];
        result.push(sum / period_f);
    }

    result
}

/// SMA as of the last close, shrinking the window to the available history.
///
/// Returns `None` only for empty input or `period == 0`.
pub fn sma_with_fallback(closes: &[f64], period: usize) -> Option<f64> {
    if closes.is_empty() || period == 0 {
        return None;
    }
    let window = &closes[closes.len() - period.min(closes.len())..];
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_empty_input() {
        assert!(calculate_sma(&[], 3).is_empty());
        assert!(sma_with_fallback(&[], 3).is_none());
    }

    #[test]
    fn sma_period_zero() {
        assert!(calculate_sma(&[1.0, 2.0], 0).is_empty());
        assert!(sma_with_fallback(&[1.0, 2.0], 0).is_none());
    }

    #[test]
    fn sma_series_known_values() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        let sma = calculate_sma(&closes, 3);
        assert_eq!(sma.len(), 3);
        for (got, want) in sma.iter().zip([2.0, 3.0, 4.0]) {
            assert!((got - want).abs() < 1e-10, "got {got}, expected {want}");
        }
    }

    #[test]
    fn sma_last_three_of_five() {
        let closes = [100.0, 102.0, 101.0, 105.0, 103.0];
        let value = sma_with_fallback(&closes, 3).unwrap();
        assert!((value - 103.0).abs() < 1e-10);
    }

    #[test]
    fn sma_shrinks_window_for_short_history() {
        let closes = [10.0, 20.0, 30.0];
        let value = sma_with_fallback(&closes, 200).unwrap();
        assert!((value - 20.0).abs() < 1e-10);
    }
}
