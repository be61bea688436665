// =============================================================================
// Error taxonomy
// =============================================================================
//
// DataError is the engine's only failure mode: structurally invalid input.
// Short histories are never an error; the indicator code degrades instead.
//
// ServiceError covers everything around the engine (fetching, resolving
// tickers, exporting). Only transport-level failures are retryable.
// =============================================================================

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("no price data for {ticker}")]
    Empty { ticker: String },

    #[error("invalid bar for {ticker} on {date}: {reason}")]
    InvalidBar {
        ticker: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("duplicate bar for {ticker} on {date}")]
    DuplicateDate { ticker: String, date: NaiveDate },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("market data provider rate limit exceeded")]
    RateLimited,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("failed to write analysis outputs: {0:#}")]
    Export(anyhow::Error),
}

impl ServiceError {
    /// Whether the fetch collaborator should try the request again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Network(_) | Self::Upstream(_)
        )
    }
}
