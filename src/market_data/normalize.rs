// =============================================================================
// Boundary normalisation - raw feed rows to PriceBar
// =============================================================================
//
// The chart feed returns parallel arrays (timestamp, open, high, low, close,
// volume) in which any cell may be null: halted sessions, the still-forming
// live bar, or plain gaps. Rows with any missing price are dropped here.
//
// Timestamps are exchange-local session opens expressed as UTC epoch seconds,
// so the exchange's GMT offset is applied before taking the calendar date.
// When the feed emits two rows for the same date (live bar appended after the
// official one) the later row wins.
// =============================================================================

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::types::PriceBar;

/// One `indicators.quote[0]` block of the chart payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHistory {
    pub bars: Vec<PriceBar>,
    /// Rows dropped for missing or unusable values.
    pub skipped: usize,
}

/// Map parallel chart arrays into date-ordered bars.
pub fn normalize_chart(timestamps: &[i64], quote: &RawQuote, gmt_offset: i64) -> NormalizedHistory {
    let mut bars: Vec<PriceBar> = Vec::with_capacity(timestamps.len());
    let mut skipped = 0;

    for (i, &ts) in timestamps.iter().enumerate() {
        let cell = |col: &[Option<f64>]| col.get(i).copied().flatten().filter(|v| v.is_finite());

        let (Some(open), Some(high), Some(low), Some(close)) = (
            cell(&quote.open),
            cell(&quote.high),
            cell(&quote.low),
            cell(&quote.close),
        ) else {
            skipped += 1;
            continue;
        };

        let Some(date) = session_date(ts, gmt_offset) else {
            skipped += 1;
            continue;
        };

        let bar = PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume: cell(&quote.volume).map(normalize_volume).unwrap_or(0),
        };

        bars.push(bar);
    }

    // Stable sort keeps feed order within a date, so the later row survives.
    bars.sort_by_key(|b| b.date);
    bars.dedup_by(|later, earlier| {
        if later.date == earlier.date {
            *earlier = *later;
            skipped += 1;
            true
        } else {
            false
        }
    });

    NormalizedHistory { bars, skipped }
}

fn session_date(ts: i64, gmt_offset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts.checked_add(gmt_offset)?, 0).map(|dt| dt.date_naive())
}

/// Volumes arrive as floats; clamp to a non-negative whole number of shares.
fn normalize_volume(raw: f64) -> u64 {
    if raw <= 0.0 {
        0
    } else {
        raw.round() as u64
    }
}
