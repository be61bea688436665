// =============================================================================
// Market data collaborator
// =============================================================================
//
// Everything that talks to a price feed lives behind `MarketDataProvider`.
// Implementations are responsible for turning loosely-typed upstream payloads
// into validated-shape `PriceBar` / `CompanyInfo` values; the analysis engine
// never sees nullable or partial data.
// =============================================================================

pub mod normalize;
pub mod yahoo;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};

use crate::error::ServiceError;
use crate::types::{CompanyInfo, PriceBar, StockQuote};

pub use yahoo::YahooClient;

/// Inclusive calendar range of daily bars to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HistoryRange {
    /// The `days` calendar days ending at `end` (inclusive).
    pub fn trailing_days(end: NaiveDate, days: u32) -> Self {
        let start = end
            .checked_sub_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Resolve a company name or symbol to a ticker. `Ok(None)` when nothing
    /// matches.
    async fn search(&self, query: &str) -> Result<Option<String>, ServiceError>;

    /// Daily bars for `ticker` within `range`, oldest first.
    async fn history(
        &self,
        ticker: &str,
        range: &HistoryRange,
    ) -> Result<Vec<PriceBar>, ServiceError>;

    async fn company_info(&self, ticker: &str) -> Result<CompanyInfo, ServiceError>;

    async fn quote(&self, ticker: &str) -> Result<StockQuote, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_days_spans_back_from_end() {
        let end = NaiveDate::from_ymd_opt(2025, 1, 17).unwrap();
        let range = HistoryRange::trailing_days(end, 365);
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 18).unwrap());
        assert_eq!(range.end, end);
    }
}
