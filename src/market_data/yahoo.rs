// =============================================================================
// Yahoo Finance client - chart history, symbol search, quote summary
// =============================================================================
//
// Three public endpoints are used:
//   - v8/finance/chart/{ticker}       daily OHLCV history + basic meta
//   - v1/finance/search               company name -> symbol
//   - v10/finance/quoteSummary/{t}    profile, price and summary modules
//
// quoteSummary is frequently refused without a session crumb, so company info
// and quotes fall back to the chart endpoint's `meta` block when it fails.
//
// Transport failures, 429s and 5xx responses are retried with exponential
// backoff; everything else surfaces immediately.
// =============================================================================

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::normalize::{normalize_chart, RawQuote};
use super::{HistoryRange, MarketDataProvider};
use crate::error::ServiceError;
use crate::runtime_config::YahooConfig;
use crate::types::{CompanyInfo, PriceBar, StockQuote};

// =============================================================================
// Retry policy
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): min_backoff doubled per
    /// attempt, capped at max_backoff.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.min_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

// =============================================================================
// Wire payloads
// =============================================================================

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<RawQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<f64>,
    #[serde(default)]
    fifty_two_week_high: Option<f64>,
    #[serde(default)]
    fifty_two_week_low: Option<f64>,
    #[serde(default, rename = "gmtoffset")]
    gmt_offset: i64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Debug, Deserialize)]
struct SearchQuote {
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    result: Option<Vec<SummaryResult>>,
    #[serde(default)]
    error: Option<YahooError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResult {
    #[serde(default)]
    asset_profile: Option<AssetProfile>,
    #[serde(default)]
    price: Option<PriceModule>,
    #[serde(default)]
    summary_detail: Option<SummaryDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetProfile {
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    industry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    market_cap: Option<RawValue>,
    #[serde(default)]
    regular_market_price: Option<RawValue>,
    #[serde(default)]
    regular_market_volume: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(default)]
    fifty_two_week_high: Option<RawValue>,
    #[serde(default)]
    fifty_two_week_low: Option<RawValue>,
    #[serde(default, rename = "forwardPE")]
    forward_pe: Option<RawValue>,
    #[serde(default)]
    dividend_yield: Option<RawValue>,
    #[serde(default)]
    volume: Option<RawValue>,
    #[serde(default)]
    average_volume: Option<RawValue>,
    #[serde(default)]
    market_cap: Option<RawValue>,
}

/// Numeric fields come wrapped as `{"raw": 1.23, "fmt": "1.23"}` or `{}`.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    (*value).and_then(|v| v.raw).filter(|v| v.is_finite())
}

fn whole(value: Option<f64>) -> Option<u64> {
    value.filter(|v| *v >= 0.0).map(|v| v.round() as u64)
}

// =============================================================================
// Client
// =============================================================================

#[derive(Clone)]
pub struct YahooClient {
    client: reqwest::Client,
    chart_url: Url,
    search_url: Url,
    summary_url: Url,
    retry: RetryPolicy,
}

impl YahooClient {
    pub fn new(config: &YahooConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let parse = |name: &str, raw: &str| {
            Url::parse(raw).with_context(|| format!("invalid {name} URL '{raw}'"))
        };

        debug!(chart_url = %config.chart_url, "YahooClient initialised");

        Ok(Self {
            client,
            chart_url: parse("chart", &config.chart_url)?,
            search_url: parse("search", &config.search_url)?,
            summary_url: parse("quote summary", &config.summary_url)?,
            retry: RetryPolicy {
                max_attempts: config.max_attempts,
                min_backoff: Duration::from_millis(config.min_backoff_ms),
                max_backoff: Duration::from_millis(config.max_backoff_ms),
            },
        })
    }

    // -------------------------------------------------------------------------
    // Transport helpers
    // -------------------------------------------------------------------------

    /// `base` with `ticker` appended as one percent-encoded path segment.
    fn endpoint(base: &Url, ticker: &str) -> Result<Url, ServiceError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::Upstream(format!("{base} cannot take a path segment")))?
            .pop_if_empty()
            .push(ticker);
        Ok(url)
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
        subject: &str,
    ) -> Result<T, ServiceError> {
        let resp = self.client.get(url.clone()).query(query).send().await?;

        if let Some(err) = status_error(resp.status(), subject) {
            return Err(err);
        }

        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Upstream(format!("malformed response for {subject}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        query: &[(&str, String)],
        subject: &str,
    ) -> Result<T, ServiceError> {
        let mut attempt = 1;
        loop {
            match self.get_json_once(url, query, subject).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        subject,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_chart(
        &self,
        ticker: &str,
        query: &[(&str, String)],
    ) -> Result<ChartResult, ServiceError> {
        let url = Self::endpoint(&self.chart_url, ticker)?;
        let envelope: ChartEnvelope = self.get_json(&url, query, ticker).await?;
        first_result(envelope.chart.result, envelope.chart.error, ticker)
    }

    async fn fetch_summary(&self, ticker: &str) -> Result<SummaryResult, ServiceError> {
        let url = Self::endpoint(&self.summary_url, ticker)?;
        let query = [("modules", "assetProfile,price,summaryDetail".to_string())];
        let envelope: SummaryEnvelope = self.get_json(&url, &query, ticker).await?;
        first_result(
            envelope.quote_summary.result,
            envelope.quote_summary.error,
            ticker,
        )
    }

    /// Chart meta for the last few sessions; the cheapest way to confirm a
    /// symbol and read its headline numbers.
    async fn fetch_meta(&self, ticker: &str) -> Result<ChartMeta, ServiceError> {
        let query = [
            ("range", "5d".to_string()),
            ("interval", "1d".to_string()),
        ];
        Ok(self.fetch_chart(ticker, &query).await?.meta)
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    #[instrument(skip(self), name = "yahoo::search")]
    async fn search(&self, query: &str) -> Result<Option<String>, ServiceError> {
        let params = [
            ("q", query.to_string()),
            ("quotesCount", "1".to_string()),
            ("newsCount", "0".to_string()),
            ("listsCount", "0".to_string()),
        ];
        let resp: SearchResponse = self.get_json(&self.search_url, &params, query).await?;
        let symbol = resp.quotes.into_iter().find_map(|q| q.symbol);
        debug!(?symbol, "search completed");
        Ok(symbol)
    }

    #[instrument(skip(self), name = "yahoo::history")]
    async fn history(
        &self,
        ticker: &str,
        range: &HistoryRange,
    ) -> Result<Vec<PriceBar>, ServiceError> {
        let query = [
            ("period1", epoch_seconds(range.start).to_string()),
            (
                "period2",
                epoch_seconds(range.end.checked_add_days(Days::new(1)).unwrap_or(range.end))
                    .to_string(),
            ),
            ("interval", "1d".to_string()),
        ];
        let chart = self.fetch_chart(ticker, &query).await?;
        let quote = chart.indicators.quote.into_iter().next().unwrap_or_default();

        let normalized = normalize_chart(&chart.timestamp, &quote, chart.meta.gmt_offset);
        if normalized.skipped > 0 {
            debug!(skipped = normalized.skipped, "dropped incomplete or repeated rows");
        }
        debug!(bars = normalized.bars.len(), "history fetched");
        Ok(normalized.bars)
    }

    #[instrument(skip(self), name = "yahoo::company_info")]
    async fn company_info(&self, ticker: &str) -> Result<CompanyInfo, ServiceError> {
        match self.fetch_summary(ticker).await {
            Ok(summary) => Ok(summary_to_company(ticker, &summary)),
            Err(e) => {
                warn!(error = %e, "quote summary unavailable, using chart metadata");
                Ok(meta_to_company(ticker, self.fetch_meta(ticker).await?))
            }
        }
    }

    #[instrument(skip(self), name = "yahoo::quote")]
    async fn quote(&self, ticker: &str) -> Result<StockQuote, ServiceError> {
        match self.fetch_summary(ticker).await {
            Ok(summary) => Ok(summary_to_quote(ticker, &summary)),
            Err(e) => {
                warn!(error = %e, "quote summary unavailable, using chart metadata");
                Ok(meta_to_quote(self.fetch_meta(ticker).await?))
            }
        }
    }
}

// =============================================================================
// Pure mapping helpers
// =============================================================================

/// Map an HTTP status to the service error it represents, if any.
fn status_error(status: StatusCode, subject: &str) -> Option<ServiceError> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(ServiceError::RateLimited)
    } else if status == StatusCode::NOT_FOUND {
        Some(ServiceError::NotFound(format!("No data found for {subject}")))
    } else {
        Some(ServiceError::Upstream(format!(
            "market data request for {subject} returned {status}"
        )))
    }
}

fn first_result<T>(
    result: Option<Vec<T>>,
    error: Option<YahooError>,
    ticker: &str,
) -> Result<T, ServiceError> {
    if let Some(err) = error {
        return Err(if err.code.eq_ignore_ascii_case("Not Found") {
            ServiceError::NotFound(format!("No data found for {ticker}"))
        } else {
            ServiceError::Upstream(format!("{}: {}", err.code, err.description))
        });
    }
    result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ServiceError::NotFound(format!("No data found for {ticker}")))
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn summary_to_company(ticker: &str, summary: &SummaryResult) -> CompanyInfo {
    let profile = summary.asset_profile.as_ref();
    let price = summary.price.as_ref();
    let detail = summary.summary_detail.as_ref();

    CompanyInfo {
        name: price
            .and_then(|p| p.long_name.clone().or_else(|| p.short_name.clone()))
            .unwrap_or_else(|| ticker.to_string()),
        ticker: ticker.to_string(),
        sector: profile.and_then(|p| p.sector.clone()),
        industry: profile.and_then(|p| p.industry.clone()),
        market_cap: price
            .and_then(|p| raw(&p.market_cap))
            .or_else(|| detail.and_then(|d| raw(&d.market_cap))),
        fifty_two_week_high: detail.and_then(|d| raw(&d.fifty_two_week_high)),
        fifty_two_week_low: detail.and_then(|d| raw(&d.fifty_two_week_low)),
    }
}

fn summary_to_quote(ticker: &str, summary: &SummaryResult) -> StockQuote {
    let company = summary_to_company(ticker, summary);
    let price = summary.price.as_ref();
    let detail = summary.summary_detail.as_ref();

    StockQuote {
        symbol: company.ticker,
        name: Some(company.name),
        sector: company.sector,
        industry: company.industry,
        current_price: price.and_then(|p| raw(&p.regular_market_price)),
        market_cap: company.market_cap,
        pe_ratio: detail.and_then(|d| raw(&d.forward_pe)),
        dividend_yield: detail.and_then(|d| raw(&d.dividend_yield)),
        fifty_two_week_high: company.fifty_two_week_high,
        fifty_two_week_low: company.fifty_two_week_low,
        volume: whole(
            detail
                .and_then(|d| raw(&d.volume))
                .or_else(|| price.and_then(|p| raw(&p.regular_market_volume))),
        ),
        avg_volume: whole(detail.and_then(|d| raw(&d.average_volume))),
    }
}

fn meta_to_company(ticker: &str, meta: ChartMeta) -> CompanyInfo {
    CompanyInfo {
        name: meta
            .long_name
            .or(meta.short_name)
            .unwrap_or_else(|| ticker.to_string()),
        ticker: ticker.to_string(),
        sector: None,
        industry: None,
        market_cap: None,
        fifty_two_week_high: meta.fifty_two_week_high,
        fifty_two_week_low: meta.fifty_two_week_low,
    }
}

fn meta_to_quote(meta: ChartMeta) -> StockQuote {
    StockQuote {
        name: meta.long_name.or(meta.short_name),
        current_price: meta.regular_market_price,
        fifty_two_week_high: meta.fifty_two_week_high,
        fifty_two_week_low: meta.fifty_two_week_low,
        volume: whole(meta.regular_market_volume),
        symbol: meta.symbol,
        sector: None,
        industry: None,
        market_cap: None,
        pe_ratio: None,
        dividend_yield: None,
        avg_volume: None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const CHART_FIXTURE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "AAPL",
                    "longName": "Apple Inc.",
                    "regularMarketPrice": 174.5,
                    "regularMarketVolume": 12500000,
                    "fiftyTwoWeekHigh": 182.94,
                    "fiftyTwoWeekLow": 124.17,
                    "gmtoffset": -18000
                },
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open":   [185.0, null, 182.1],
                        "high":   [186.0, null, 183.0],
                        "low":    [183.5, null, 180.9],
                        "close":  [185.6, null, 181.9],
                        "volume": [82488700, null, 58414500]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    const SUMMARY_FIXTURE: &str = r#"{
        "quoteSummary": {
            "result": [{
                "assetProfile": { "sector": "Technology", "industry": "Consumer Electronics" },
                "price": {
                    "longName": "Apple Inc.",
                    "marketCap": { "raw": 3000000000000, "fmt": "3T" },
                    "regularMarketPrice": { "raw": 174.5, "fmt": "174.50" }
                },
                "summaryDetail": {
                    "fiftyTwoWeekHigh": { "raw": 182.94 },
                    "fiftyTwoWeekLow": { "raw": 124.17 },
                    "forwardPE": { "raw": 28.1 },
                    "dividendYield": {},
                    "volume": { "raw": 12500000 },
                    "averageVolume": { "raw": 55000000 }
                }
            }],
            "error": null
        }
    }"#;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            min_backoff: Duration::from_secs(4),
            max_backoff: Duration::from_secs(10),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.backoff(1), Duration::from_secs(4));
        assert_eq!(p.backoff(2), Duration::from_secs(8));
        assert_eq!(p.backoff(3), Duration::from_secs(10));
        assert_eq!(p.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn status_mapping() {
        assert!(status_error(StatusCode::OK, "AAPL").is_none());
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "AAPL"),
            Some(ServiceError::RateLimited)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "AAPL"),
            Some(ServiceError::NotFound(_))
        ));
        let err = status_error(StatusCode::BAD_GATEWAY, "AAPL").unwrap();
        assert!(err.is_retryable());
    }

    #[test]
    fn chart_fixture_normalizes_to_bars() {
        let envelope: ChartEnvelope = serde_json::from_str(CHART_FIXTURE).unwrap();
        let chart = first_result(envelope.chart.result, envelope.chart.error, "AAPL").unwrap();
        let quote = chart.indicators.quote.into_iter().next().unwrap();
        let out = normalize_chart(&chart.timestamp, &quote, chart.meta.gmt_offset);

        assert_eq!(out.bars.len(), 2);
        assert_eq!(out.skipped, 1);
        assert_eq!(out.bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(out.bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        assert_eq!(out.bars[1].volume, 58_414_500);
    }

    #[test]
    fn chart_error_not_found_maps_to_not_found() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let envelope: ChartEnvelope = serde_json::from_str(json).unwrap();
        let err = first_result(envelope.chart.result, envelope.chart.error, "ZZZZ").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(msg) if msg.contains("ZZZZ")));
    }

    #[test]
    fn meta_fallback_builds_company_info() {
        let envelope: ChartEnvelope = serde_json::from_str(CHART_FIXTURE).unwrap();
        let chart = first_result(envelope.chart.result, envelope.chart.error, "AAPL").unwrap();
        let info = meta_to_company("AAPL", chart.meta);
        assert_eq!(info.name, "Apple Inc.");
        assert_eq!(info.fifty_two_week_high, Some(182.94));
        assert_eq!(info.sector, None);
    }

    #[test]
    fn summary_fixture_maps_company_and_quote() {
        let envelope: SummaryEnvelope = serde_json::from_str(SUMMARY_FIXTURE).unwrap();
        let summary = first_result(
            envelope.quote_summary.result,
            envelope.quote_summary.error,
            "AAPL",
        )
        .unwrap();

        let info = summary_to_company("AAPL", &summary);
        assert_eq!(info.name, "Apple Inc.");
        assert_eq!(info.sector.as_deref(), Some("Technology"));
        assert_eq!(info.industry.as_deref(), Some("Consumer Electronics"));
        assert_eq!(info.market_cap, Some(3.0e12));
        assert_eq!(info.fifty_two_week_low, Some(124.17));

        let quote = summary_to_quote("AAPL", &summary);
        assert_eq!(quote.current_price, Some(174.5));
        assert_eq!(quote.pe_ratio, Some(28.1));
        assert_eq!(quote.dividend_yield, None);
        assert_eq!(quote.volume, Some(12_500_000));
        assert_eq!(quote.avg_volume, Some(55_000_000));
    }

    #[test]
    fn search_payload_picks_first_symbol() {
        let json = r#"{"quotes":[{"symbol":"MSFT","shortname":"Microsoft"},{"symbol":"MSF.DE"}]}"#;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        let symbol = resp.quotes.into_iter().find_map(|q| q.symbol);
        assert_eq!(symbol.as_deref(), Some("MSFT"));
    }

    #[test]
    fn endpoint_encodes_ticker_segment() {
        let base = Url::parse("https://query1.finance.yahoo.com/v8/finance/chart").unwrap();
        let url = YahooClient::endpoint(&base, "^GSPC").unwrap();
        assert_eq!(
            url.as_str(),
            "https://query1.finance.yahoo.com/v8/finance/chart/%5EGSPC"
        );
    }

    #[test]
    fn epoch_seconds_is_utc_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(epoch_seconds(date), 1_704_153_600);
    }
}
