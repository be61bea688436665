// =============================================================================
// Shared types used across the stock analysis service
// =============================================================================
//
// These are the boundary shapes: what the market data collaborator hands to
// the engine (PriceBar, CompanyInfo) and what the engine hands back to the API
// layer (AnalysisResult). Field names match the JSON schema consumed by the
// frontend, so renaming a field here is a wire-format change.
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One trading-period record for a single instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    #[serde(deserialize_with = "deserialize_bar_date")]
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Accepts either `YYYY-MM-DD` or an RFC 3339 timestamp and keeps the
/// calendar date.
fn deserialize_bar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_bar_date(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid date '{raw}': expected YYYY-MM-DD or an RFC 3339 timestamp"
        ))
    })
}

pub fn parse_bar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.date_naive())
}

/// Company metadata. Passed through the engine untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_high: Option<f64>,
    #[serde(default)]
    pub fifty_two_week_low: Option<f64>,
}

impl CompanyInfo {
    /// Minimal metadata when nothing but the symbol is known.
    pub fn bare(ticker: impl Into<String>) -> Self {
        let ticker = ticker.into();
        Self {
            name: ticker.clone(),
            ticker,
            sector: None,
            industry: None,
            market_cap: None,
            fifty_two_week_high: None,
            fifty_two_week_low: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub bandwidth: f64,
    pub percent_b: f64,
}

/// Most-recent indicator values. Every field is always populated; short
/// histories degrade to shorter windows or neutral values instead of nulls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub rsi: f64,
    pub macd: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    pub bollinger_bands: BollingerBands,
}

/// Summary statistics over the closing prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// The engine's output for one request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub company_info: CompanyInfo,
    pub current_price: f64,
    pub technical_indicators: TechnicalIndicators,
    pub price_statistics: PriceStatistics,
    pub historical_prices: Vec<PriceBar>,
}

/// AnalysisResult wrapped with the service-level fields the API returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub analysis: AnalysisResult,
    /// Export kind ("csv", "json", "text") to written file path.
    pub output_files: BTreeMap<String, String>,
    /// Wall-clock seconds spent serving the request.
    pub execution_time: f64,
    pub analysis_date: DateTime<Utc>,
}

/// Basic quote and profile information for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub volume: Option<u64>,
    pub avg_volume: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_accepts_plain_date() {
        let json = r#"{"date":"2024-01-02","open":50,"high":51,"low":49,"close":50,"volume":1000}"#;
        let bar: PriceBar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bar.volume, 1000);
        assert!((bar.close - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bar_accepts_rfc3339_timestamp() {
        let json = r#"{"date":"2025-01-17T14:30:00Z","open":173.85,"high":175.1,"low":173.15,"close":174.5,"volume":12500000}"#;
        let bar: PriceBar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2025, 1, 17).unwrap());
    }

    #[test]
    fn bar_rejects_garbage_date() {
        let json = r#"{"date":"17/01/2025","open":1,"high":1,"low":1,"close":1,"volume":1}"#;
        assert!(serde_json::from_str::<PriceBar>(json).is_err());
    }

    #[test]
    fn bar_serialises_date_only() {
        let bar = PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 7,
        };
        let value = serde_json::to_value(bar).unwrap();
        assert_eq!(value["date"], "2024-03-05");
    }

    #[test]
    fn company_info_optional_fields_default_to_none() {
        let info: CompanyInfo =
            serde_json::from_str(r#"{"name":"Apple Inc.","ticker":"AAPL"}"#).unwrap();
        assert_eq!(info.sector, None);
        assert_eq!(info.market_cap, None);
        let value = serde_json::to_value(&info).unwrap();
        assert!(value["fifty_two_week_low"].is_null());
    }
}
