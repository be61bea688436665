// =============================================================================
// Relative Strength Index (RSI) - Wilder's Smoothing
// =============================================================================
//
// Average gain and average loss over consecutive close-to-close changes are
// seeded with the plain mean of the first `period` changes, then smoothed
// with alpha = 1 / period:
//
//   avg = (avg * (period - 1) + x) / period
//   RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//
// Short histories shrink the period to `len - 1` changes. With fewer than two
// closes there is no change at all and the neutral value 50 is reported.
// =============================================================================

/// RSI reported when it cannot be computed (fewer than two closes) and for a
/// perfectly flat window.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Running Wilder averages of gains and losses.
#[derive(Debug, Clone, Copy)]
struct WilderAverages {
    period: f64,
    gain: f64,
    loss: f64,
}

impl WilderAverages {
    /// Seed from the first `seed.len()` changes.
    fn seed(seed: &[f64]) -> Self {
        let period = seed.len() as f64;
        Self {
            period,
            gain: seed.iter().map(|d| d.max(0.0)).sum::<f64>() / period,
            loss: seed.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period,
        }
    }

    fn push(&mut self, change: f64) {
        let carry = self.period - 1.0;
        self.gain = (self.gain * carry + change.max(0.0)) / self.period;
        self.loss = (self.loss * carry + (-change).max(0.0)) / self.period;
    }

    /// RSI for the current averages; `None` if the arithmetic went non-finite.
    fn rsi(&self) -> Option<f64> {
        let value = match (self.gain == 0.0, self.loss == 0.0) {
            (true, true) => NEUTRAL_RSI,
            (_, true) => 100.0,
            _ => 100.0 - 100.0 / (1.0 + self.gain / self.loss),
        };
        value.is_finite().then_some(value)
    }
}

/// Full RSI series: one value per close from index `period` onwards.
///
/// Empty when `period` is zero or there are not `period + 1` closes.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let (seed, rest) = changes.split_at(period);

    let mut averages = WilderAverages::seed(seed);
    let mut series = Vec::with_capacity(rest.len() + 1);

    let Some(first) = averages.rsi() else {
        return series;
    };
    series.push(first);

    for &change in rest {
        averages.push(change);
        match averages.rsi() {
            Some(value) => series.push(value),
            None => break,
        }
    }

    series
}

/// Look-back actually used for `len` closes: `min(period, len - 1)`.
/// Zero means RSI is undefined.
pub fn effective_period(len: usize, period: usize) -> usize {
    period.min(len.saturating_sub(1))
}

/// RSI as of the last close. Never fails: see [`effective_period`] and
/// [`NEUTRAL_RSI`].
pub fn rsi_with_fallback(closes: &[f64], period: usize) -> f64 {
    match effective_period(closes.len(), period) {
        0 => NEUTRAL_RSI,
        window => calculate_rsi(closes, window)
            .last()
            .copied()
            .unwrap_or(NEUTRAL_RSI),
    }
}
