// =============================================================================
// Analysis cache
// =============================================================================
//
// Finished AnalysisResults keyed by the exact input series. The engine is
// deterministic, so a hit is interchangeable with a fresh computation.
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;

use crate::price_series::PriceSeries;
use crate::types::AnalysisResult;

// ---------------------------------------------------------------------------
// Cache key
// ---------------------------------------------------------------------------

/// Identifies one exact input series. Two fetches that return the same bars
/// hash identically, so a repeat request inside the same session is served
/// without recomputing indicators.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct AnalysisKey {
    pub ticker: String,
    pub first: NaiveDate,
    pub last: NaiveDate,
    pub content_hash: String,
}

impl AnalysisKey {
    pub fn for_series(series: &PriceSeries) -> Self {
        let (first, last) = series.date_range();
        Self {
            ticker: series.ticker().to_string(),
            first,
            last,
            content_hash: series.content_hash(),
        }
    }
}

impl std::fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}..{}#{}",
            self.ticker,
            self.first,
            self.last,
            &self.content_hash[..self.content_hash.len().min(12)]
        )
    }
}

// ---------------------------------------------------------------------------
// AnalysisCache -- bounded FIFO of finished results
// ---------------------------------------------------------------------------

/// Thread-safe bounded cache of analysis results. Oldest insertions are
/// evicted first once `capacity` is reached; a capacity of 0 disables the
/// cache entirely.
pub struct AnalysisCache {
    inner: RwLock<CacheInner>,
    capacity: usize,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<AnalysisKey, Arc<AnalysisResult>>,
    order: VecDeque<AnalysisKey>,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            capacity,
        }
    }

    pub fn get(&self, key: &AnalysisKey) -> Option<Arc<AnalysisResult>> {
        self.inner.read().entries.get(key).cloned()
    }

    /// Insert `result` under `key`, evicting the oldest entries to stay
    /// within capacity. Re-inserting an existing key replaces the value
    /// without changing its eviction position.
    pub fn insert(&self, key: AnalysisKey, result: Arc<AnalysisResult>) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.write();
        if inner.entries.insert(key.clone(), result).is_none() {
            inner.order.push_back(key);
        }
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
