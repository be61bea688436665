// =============================================================================
// Runtime Configuration - service settings loaded at startup
// =============================================================================
//
// Every tunable lives here: HTTP surface, export behaviour, indicator
// look-backs and the market data client. Settings come from a JSON file,
// then a handful of environment variables override deployment-specific
// values (bind address, output directory, log format).
//
// All fields carry `#[serde(default)]` so that adding new fields never breaks
// loading an older config file.
//
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::indicators::IndicatorParams;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_project_name() -> String {
    "Stock Analysis API".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_history_days() -> u32 {
    365
}

fn default_max_history_days() -> u32 {
    3650
}

fn default_cache_capacity() -> usize {
    64
}

fn default_chart_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart".to_string()
}

fn default_search_url() -> String {
    "https://query2.finance.yahoo.com/v1/finance/search".to_string()
}

fn default_summary_url() -> String {
    "https://query2.finance.yahoo.com/v10/finance/quoteSummary".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_min_backoff_ms() -> u64 {
    4_000
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

// =============================================================================
// LogFormat
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => bail!("unknown log format '{other}' (expected 'pretty' or 'json')"),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

// =============================================================================
// YahooConfig
// =============================================================================

/// Endpoints and transport settings for the Yahoo Finance client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YahooConfig {
    #[serde(default = "default_chart_url")]
    pub chart_url: String,

    #[serde(default = "default_search_url")]
    pub search_url: String,

    #[serde(default = "default_summary_url")]
    pub summary_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt up to `max_backoff_ms`.
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            chart_url: default_chart_url(),
            search_url: default_search_url(),
            summary_url: default_summary_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

// =============================================================================
// AppConfig
// =============================================================================

/// Top-level configuration for the stock analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    // --- HTTP surface --------------------------------------------------------

    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Path prefix every route is mounted under.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Exports -------------------------------------------------------------

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Write CSV / JSON / text files for every analysis.
    #[serde(default = "default_true")]
    pub export_outputs: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    // --- Analysis ------------------------------------------------------------

    /// History window used when a request does not specify `days`.
    #[serde(default = "default_history_days")]
    pub default_history_days: u32,

    #[serde(default = "default_max_history_days")]
    pub max_history_days: u32,

    /// Finished analyses kept in memory. 0 disables the cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default)]
    pub indicators: IndicatorParams,

    // --- Market data ---------------------------------------------------------

    #[serde(default)]
    pub yahoo: YahooConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            api_prefix: default_api_prefix(),
            bind_addr: default_bind_addr(),
            output_dir: default_output_dir(),
            export_outputs: true,
            log_format: LogFormat::Pretty,
            default_history_days: default_history_days(),
            max_history_days: default_max_history_days(),
            cache_capacity: default_cache_capacity(),
            indicators: IndicatorParams::default(),
            yahoo: YahooConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            api_prefix = %config.api_prefix,
            bind_addr = %config.bind_addr,
            "config loaded"
        );

        Ok(config)
    }

    /// Apply `STOCK_API_*` overrides through `lookup` (normally
    /// `std::env::var(..).ok()`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("STOCK_API_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(dir) = lookup("STOCK_API_OUTPUT_DIR") {
            self.output_dir = dir;
        }
        if let Some(raw) = lookup("STOCK_API_EXPORT_OUTPUTS") {
            self.export_outputs = parse_flag(&raw)
                .with_context(|| format!("invalid STOCK_API_EXPORT_OUTPUTS '{raw}'"))?;
        }
        if let Some(raw) = lookup("STOCK_API_LOG_FORMAT") {
            self.log_format = raw.parse()?;
        }
        Ok(())
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        let ind = &self.indicators;
        if ind.rsi_period == 0
            || ind.macd_fast == 0
            || ind.macd_slow == 0
            || ind.bollinger_period == 0
        {
            bail!("indicator periods must be positive: {ind:?}");
        }
        if ind.macd_fast >= ind.macd_slow {
            bail!(
                "macd_fast ({}) must be shorter than macd_slow ({})",
                ind.macd_fast,
                ind.macd_slow
            );
        }
        if !(ind.bollinger_std_dev.is_finite() && ind.bollinger_std_dev > 0.0) {
            bail!("bollinger_std_dev must be positive, got {}", ind.bollinger_std_dev);
        }
        if !self.api_prefix.starts_with('/') {
            bail!("api_prefix must start with '/', got '{}'", self.api_prefix);
        }
        if self.default_history_days == 0 || self.max_history_days == 0 {
            bail!("history day limits must be positive");
        }
        if self.default_history_days > self.max_history_days {
            bail!(
                "default_history_days ({}) exceeds max_history_days ({})",
                self.default_history_days,
                self.max_history_days
            );
        }
        if self.yahoo.max_attempts == 0 {
            bail!("yahoo.max_attempts must be at least 1");
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.project_name, "Stock Analysis API");
        assert_eq!(cfg.api_prefix, "/api/v1");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.output_dir, "output");
        assert!(cfg.export_outputs);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.default_history_days, 365);
        assert_eq!(cfg.cache_capacity, 64);
        assert_eq!(cfg.yahoo.user_agent, "Mozilla/5.0");
        assert_eq!(cfg.yahoo.max_attempts, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "api_prefix": "/v2",
            "log_format": "json",
            "indicators": { "rsi_period": 9 },
            "yahoo": { "timeout_secs": 3 }
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.api_prefix, "/v2");
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.indicators.rsi_period, 9);
        assert_eq!(cfg.indicators.macd_slow, 26);
        assert_eq!(cfg.yahoo.timeout_secs, 3);
        assert_eq!(cfg.yahoo.max_backoff_ms, 10_000);
    }

    #[test]
    fn load_reads_file_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "cache_capacity": 0 }"#).unwrap();

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.cache_capacity, 0);

        assert!(AppConfig::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = AppConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(env(&[
            ("STOCK_API_BIND_ADDR", "127.0.0.1:9000"),
            ("STOCK_API_OUTPUT_DIR", "/tmp/exports"),
            ("STOCK_API_EXPORT_OUTPUTS", "false"),
            ("STOCK_API_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.output_dir, "/tmp/exports");
        assert!(!cfg.export_outputs);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_env_values_are_errors() {
        let mut cfg = AppConfig::default();
        assert!(cfg
            .apply_overrides(env(&[("STOCK_API_EXPORT_OUTPUTS", "maybe")]))
            .is_err());
        assert!(cfg
            .apply_overrides(env(&[("STOCK_API_LOG_FORMAT", "xml")]))
            .is_err());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let cases: Vec<fn(&mut AppConfig)> = vec![
            |c| c.indicators.rsi_period = 0,
            |c| c.indicators.bollinger_period = 0,
            |c| c.indicators.macd_fast = 26,
            |c| c.indicators.bollinger_std_dev = 0.0,
            |c| c.api_prefix = "api".into(),
            |c| c.default_history_days = 0,
            |c| c.max_history_days = 100,
            |c| c.yahoo.max_attempts = 0,
        ];
        for mutate in cases {
            let mut cfg = AppConfig::default();
            mutate(&mut cfg);
            assert!(cfg.validate().is_err(), "accepted {cfg:?}");
        }
    }
}
