// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the technical indicators reported
// for a price series. Each indicator is computed independently and degrades on
// short history (shrinking windows, neutral values) instead of failing, so one
// indicator can never abort the others.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

use serde::{Deserialize, Serialize};

use crate::price_series::PriceSeries;
use crate::types::{BollingerBands, TechnicalIndicators};

/// SMA windows reported in [`TechnicalIndicators`] (`sma_20`, `sma_50`, `sma_200`).
pub const SMA_WINDOWS: [usize; 3] = [20, 50, 200];

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_std_dev() -> f64 {
    2.0
}

/// Look-back parameters for the configurable indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,

    /// Band half-width in standard deviations (k).
    #[serde(default = "default_bollinger_std_dev")]
    pub bollinger_std_dev: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            bollinger_period: default_bollinger_period(),
            bollinger_std_dev: default_bollinger_std_dev(),
        }
    }
}

/// Compute every reported indicator as of the last bar of `series`.
pub fn compute_indicators(series: &PriceSeries, params: &IndicatorParams) -> TechnicalIndicators {
    let closes = series.closes();
    let last_close = series.last().close;

    // A validated series is never empty, so the fallbacks below only guard
    // against zero periods slipping past config validation.
    let sma = |period: usize| sma::sma_with_fallback(&closes, period).unwrap_or(last_close);

    let bollinger_bands = bollinger::calculate_bollinger(
        &closes,
        params.bollinger_period,
        params.bollinger_std_dev,
    )
    .unwrap_or(BollingerBands {
        upper: last_close,
        middle: last_close,
        lower: last_close,
        bandwidth: 0.0,
        percent_b: 0.5,
    });

    TechnicalIndicators {
        rsi: rsi::rsi_with_fallback(&closes, params.rsi_period),
        macd: macd::calculate_macd(&closes, params.macd_fast, params.macd_slow),
        sma_20: sma(SMA_WINDOWS[0]),
        sma_50: sma(SMA_WINDOWS[1]),
        sma_200: sma(SMA_WINDOWS[2]),
        bollinger_bands,
    }
}

// =============================================================================
// Per-bar indicator frame (used by the CSV export)
// =============================================================================

/// Rolling indicator values aligned one-to-one with the bars of a series.
/// A cell is `None` until its window has filled.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub sma: [Vec<Option<f64>>; 3],
    pub rsi: Vec<Option<f64>>,
}

/// Build the per-bar frame. Window sizes shrink to the history length exactly
/// as the scalar indicators do.
pub fn indicator_frame(series: &PriceSeries, params: &IndicatorParams) -> IndicatorFrame {
    let closes = series.closes();
    let len = closes.len();

    let sma = SMA_WINDOWS.map(|period| {
        let window = period.min(len);
        align(sma::calculate_sma(&closes, window), len)
    });

    let rsi_window = rsi::effective_period(len, params.rsi_period);
    let rsi = if rsi_window == 0 {
        vec![None; len]
    } else {
        align(rsi::calculate_rsi(&closes, rsi_window), len)
    };

    IndicatorFrame { sma, rsi }
}

/// Right-align `values` against a series of `len` bars, padding the front
/// with `None`.
fn align(values: Vec<f64>, len: usize) -> Vec<Option<f64>> {
    let pad = len.saturating_sub(values.len());
    std::iter::repeat(None)
        .take(pad)
        .chain(values.into_iter().map(Some))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_series::tests::series_from_closes;

    #[test]
    fn default_params() {
        let p = IndicatorParams::default();
        assert_eq!(p.rsi_period, 14);
        assert_eq!((p.macd_fast, p.macd_slow), (12, 26));
        assert_eq!(p.bollinger_period, 20);
        assert!((p.bollinger_std_dev - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn params_partial_json_fills_defaults() {
        let p: IndicatorParams = serde_json::from_str(r#"{"rsi_period": 7}"#).unwrap();
        assert_eq!(p.rsi_period, 7);
        assert_eq!(p.macd_slow, 26);
    }

    #[test]
    fn single_bar_degrades_everywhere() {
        let series = series_from_closes(&[50.0]);
        let ind = compute_indicators(&series, &IndicatorParams::default());
        assert_eq!(ind.rsi, rsi::NEUTRAL_RSI);
        assert_eq!(ind.macd, 0.0);
        assert_eq!(ind.sma_20, 50.0);
        assert_eq!(ind.sma_50, 50.0);
        assert_eq!(ind.sma_200, 50.0);
        assert_eq!(ind.bollinger_bands.percent_b, 0.5);
        assert_eq!(ind.bollinger_bands.bandwidth, 0.0);
    }

    #[test]
    fn long_series_values_are_finite_and_bounded() {
        let closes: Vec<f64> = (0..300)
            .map(|i| 100.0 + 10.0 * (i as f64 / 7.0).sin() + i as f64 * 0.05)
            .collect();
        let series = series_from_closes(&closes);
        let ind = compute_indicators(&series, &IndicatorParams::default());
        assert!((0.0..=100.0).contains(&ind.rsi));
        for v in [
            ind.macd,
            ind.sma_20,
            ind.sma_50,
            ind.sma_200,
            ind.bollinger_bands.upper,
            ind.bollinger_bands.lower,
            ind.bollinger_bands.bandwidth,
            ind.bollinger_bands.percent_b,
        ] {
            assert!(v.is_finite());
        }
        let expected_sma_200 = closes[100..].iter().sum::<f64>() / 200.0;
        assert!((ind.sma_200 - expected_sma_200).abs() < 1e-9);
    }

    #[test]
    fn frame_aligns_with_bars() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let series = series_from_closes(&closes);
        let frame = indicator_frame(&series, &IndicatorParams::default());

        assert_eq!(frame.sma[0].len(), 30);
        assert!(frame.sma[0][18].is_none());
        assert!((frame.sma[0][19].unwrap() - 10.5).abs() < 1e-10);

        // 30 bars < 50: window shrinks to 30, only the last cell is filled.
        assert!(frame.sma[1][28].is_none());
        assert!((frame.sma[1][29].unwrap() - 15.5).abs() < 1e-10);

        assert_eq!(frame.rsi.len(), 30);
        assert!(frame.rsi[13].is_none());
        assert!((frame.rsi[14].unwrap() - 100.0).abs() < 1e-10);
    }

    #[test]
    fn frame_single_bar() {
        let series = series_from_closes(&[7.0]);
        let frame = indicator_frame(&series, &IndicatorParams::default());
        assert_eq!(frame.sma[2], vec![Some(7.0)]);
        assert_eq!(frame.rsi, vec![None]);
    }
}
