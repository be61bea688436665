// =============================================================================
// StockService - fetch, validate, analyse, cache, export
// =============================================================================
//
// The only place that knows about every collaborator. The market data
// provider is injected as a trait object so the HTTP layer and tests can run
// against an in-memory feed.
//
// Pipeline for one request:
//   1. Validate input, resolve company name -> ticker.
//   2. Fetch history and company info concurrently.
//   3. Validate into a PriceSeries (engine errors abort here).
//   4. Serve from cache or assemble a fresh AnalysisResult.
//   5. Export files when enabled, wrap into an AnalysisReport.
// =============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::analysis::assemble;
use crate::cache::{AnalysisCache, AnalysisKey};
use crate::error::ServiceError;
use crate::indicators::IndicatorParams;
use crate::market_data::{HistoryRange, MarketDataProvider};
use crate::output::OutputManager;
use crate::price_series::PriceSeries;
use crate::runtime_config::AppConfig;
use crate::types::{AnalysisReport, AnalysisResult, CompanyInfo, PriceBar, StockQuote};

/// Inputs up to this length that contain no lower-case letters are taken to
/// be ticker symbols already.
const MAX_TICKER_LEN: usize = 5;

pub struct StockService {
    provider: Arc<dyn MarketDataProvider>,
    cache: AnalysisCache,
    output: Option<Arc<OutputManager>>,
    params: IndicatorParams,
    default_history_days: u32,
    max_history_days: u32,
}

impl StockService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &AppConfig) -> Result<Self> {
        let output = if config.export_outputs {
            let manager = OutputManager::new(&config.output_dir)?;
            info!(dir = %manager.output_dir().display(), "analysis exports enabled");
            Some(Arc::new(manager))
        } else {
            None
        };

        Ok(Self {
            provider,
            cache: AnalysisCache::new(config.cache_capacity),
            output,
            params: config.indicators.clone(),
            default_history_days: config.default_history_days,
            max_history_days: config.max_history_days,
        })
    }

    pub fn cached_analyses(&self) -> usize {
        self.cache.len()
    }

    // -------------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------------

    /// Full analysis for a company name or ticker over the trailing `days`
    /// calendar days (configured default when `None`).
    #[instrument(skip(self), name = "service::analyze_stock")]
    pub async fn analyze_stock(
        &self,
        company_input: &str,
        days: Option<u32>,
    ) -> Result<AnalysisReport, ServiceError> {
        let started = Instant::now();

        let company_input = non_blank(company_input, "Company input must be a non-empty string")?;
        let days = days.unwrap_or(self.default_history_days);
        if days == 0 || days > self.max_history_days {
            return Err(ServiceError::InvalidInput(format!(
                "days must be between 1 and {}",
                self.max_history_days
            )));
        }

        info!("starting analysis");
        let ticker = self.resolve_ticker(company_input).await?;
        let range = HistoryRange::trailing_days(Utc::now().date_naive(), days);

        let (history, company) = tokio::join!(
            self.provider.history(&ticker, &range),
            self.provider.company_info(&ticker),
        );
        let bars = history?;
        let mut company_info = company.unwrap_or_else(|e| {
            warn!(ticker = %ticker, error = %e, "company info unavailable, using bare metadata");
            CompanyInfo::bare(ticker.as_str())
        });
        company_info.ticker = ticker.clone();

        let series = PriceSeries::new(ticker, bars)?;
        self.run_pipeline(series, company_info, started).await
    }

    /// Analyse caller-supplied bars; no fetching or ticker resolution.
    #[instrument(skip(self, bars, company_info), fields(ticker = %company_info.ticker, bars = bars.len()), name = "service::analyze_bars")]
    pub async fn analyze_bars(
        &self,
        bars: Vec<PriceBar>,
        company_info: CompanyInfo,
    ) -> Result<AnalysisReport, ServiceError> {
        let started = Instant::now();
        non_blank(&company_info.ticker, "company_info.ticker must be a non-empty string")?;

        let series = PriceSeries::new(company_info.ticker.clone(), bars)?;
        self.run_pipeline(series, company_info, started).await
    }

    #[instrument(skip(self), name = "service::stock_quote")]
    pub async fn stock_quote(&self, ticker: &str) -> Result<StockQuote, ServiceError> {
        let ticker = non_blank(ticker, "ticker must be a non-empty string")?.to_uppercase();
        self.provider.quote(&ticker).await
    }

    #[instrument(skip(self), name = "service::search_company")]
    pub async fn search_company(&self, query: &str) -> Result<String, ServiceError> {
        let query = non_blank(query, "search query must be a non-empty string")?;
        self.provider
            .search(query)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Could not find ticker symbol for {query}")))
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn resolve_ticker(&self, input: &str) -> Result<String, ServiceError> {
        if looks_like_ticker(input) {
            return Ok(input.to_string());
        }
        let ticker = self.search_company(input).await?;
        debug!(input, ticker = %ticker, "resolved company to ticker");
        Ok(ticker)
    }

    async fn run_pipeline(
        &self,
        series: PriceSeries,
        company_info: CompanyInfo,
        started: Instant,
    ) -> Result<AnalysisReport, ServiceError> {
        let key = AnalysisKey::for_series(&series);

        let analysis = match self.cache.get(&key).filter(|hit| hit.company_info == company_info) {
            Some(hit) => {
                debug!(key = %key, "analysis cache hit");
                hit
            }
            None => {
                let fresh = Arc::new(assemble(&series, company_info, &self.params));
                self.cache.insert(key, Arc::clone(&fresh));
                fresh
            }
        };

        let ticker = series.ticker().to_string();
        let bars = series.len();
        let analysis_date = Utc::now();
        let output_files = match &self.output {
            Some(output) => {
                self.export(Arc::clone(output), Arc::clone(&analysis), series, analysis_date)
                    .await?
            }
            None => BTreeMap::new(),
        };

        let execution_time = started.elapsed().as_secs_f64();
        info!(
            ticker = %ticker,
            bars,
            current_price = analysis.current_price,
            rsi = analysis.technical_indicators.rsi,
            execution_time,
            "analysis complete"
        );

        Ok(AnalysisReport {
            analysis: (*analysis).clone(),
            output_files,
            execution_time,
            analysis_date,
        })
    }

    /// File writes run on the blocking pool, off the async workers.
    async fn export(
        &self,
        output: Arc<OutputManager>,
        analysis: Arc<AnalysisResult>,
        series: PriceSeries,
        at: DateTime<Utc>,
    ) -> Result<BTreeMap<String, String>, ServiceError> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || output.save_analysis(&analysis, &series, &params, at))
            .await
            .map_err(|e| ServiceError::Export(anyhow::Error::new(e).context("export task failed")))?
            .map_err(ServiceError::Export)
    }
}

fn non_blank<'a>(value: &'a str, message: &str) -> Result<&'a str, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ServiceError::InvalidInput(message.to_string()))
    } else {
        Ok(trimmed)
    }
}

/// Short, with at least one letter and no lower-case letters: "AAPL",
/// "BRK-B". Anything else goes through search.
fn looks_like_ticker(input: &str) -> bool {
    input.chars().count() <= MAX_TICKER_LEN
        && input.chars().any(char::is_alphabetic)
        && !input.chars().any(char::is_lowercase)
}
