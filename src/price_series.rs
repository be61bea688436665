// =============================================================================
// PriceSeries - validated, date-ordered OHLCV history for one instrument
// =============================================================================
//
// Construction is the only validation point. Once a PriceSeries exists it is
// guaranteed to be:
//   - non-empty,
//   - sorted strictly ascending by date (no duplicates),
//   - made of bars with finite prices inside [MIN_PRICE, MAX_PRICE] and
//     low <= open,close <= high.
//
// Downstream code (indicators, statistics) relies on these guarantees and
// never re-checks them.
// =============================================================================

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::error::DataError;
use crate::types::PriceBar;

/// Largest accepted price. Sums and squared deviations over any realistic
/// history stay well inside f64 range below this.
pub const MAX_PRICE: f64 = 1e15;

/// Smallest accepted price. Keeps ratios such as Bollinger bandwidth
/// (spread / middle) finite.
pub const MIN_PRICE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validate `bars` and build a series. Bars may arrive in any order; they
    /// are sorted by date before the duplicate check.
    pub fn new(ticker: impl Into<String>, mut bars: Vec<PriceBar>) -> Result<Self, DataError> {
        let ticker = ticker.into();

        if bars.is_empty() {
            return Err(DataError::Empty { ticker });
        }

        for bar in &bars {
            if let Some(reason) = bar_violation(bar) {
                return Err(DataError::InvalidBar {
                    ticker,
                    date: bar.date,
                    reason,
                });
            }
        }

        bars.sort_by_key(|b| b.date);

        if let Some(pair) = bars.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(DataError::DuplicateDate {
                ticker,
                date: pair[0].date,
            });
        }

        Ok(Self { ticker, bars })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Closing prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn first(&self) -> &PriceBar {
        &self.bars[0]
    }

    /// The most recent bar. Never panics: the series is non-empty.
    pub fn last(&self) -> &PriceBar {
        &self.bars[self.bars.len() - 1]
    }

    /// (first date, last date) covered by the series.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        (self.first().date, self.last().date)
    }

    /// Hex SHA-256 over every bar's exact field values. Two series with the
    /// same hash produce identical analyses.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for bar in &self.bars {
            hasher.update(bar.date.to_string().as_bytes());
            for value in [bar.open, bar.high, bar.low, bar.close] {
                hasher.update(value.to_bits().to_le_bytes());
            }
            hasher.update(bar.volume.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Describe the first invariant `bar` breaks, if any.
fn bar_violation(bar: &PriceBar) -> Option<String> {
    let prices = [
        ("open", bar.open),
        ("high", bar.high),
        ("low", bar.low),
        ("close", bar.close),
    ];

    for (name, value) in prices {
        if !value.is_finite() {
            return Some(format!("{name} is not a finite number"));
        }
        if value <= 0.0 {
            return Some(format!("{name} {value} must be positive"));
        }
        if !(MIN_PRICE..=MAX_PRICE).contains(&value) {
            return Some(format!(
                "{name} {value} outside supported range [{MIN_PRICE:e}, {MAX_PRICE:e}]"
            ));
        }
    }

    if bar.low > bar.high {
        return Some(format!("low {} exceeds high {}", bar.low, bar.high));
    }
    if bar.open < bar.low || bar.open > bar.high {
        return Some(format!(
            "open {} outside range [{}, {}]",
            bar.open, bar.low, bar.high
        ));
    }
    if bar.close < bar.low || bar.close > bar.high {
        return Some(format!(
            "close {} outside range [{}, {}]",
            bar.close, bar.low, bar.high
        ));
    }

    None
}
