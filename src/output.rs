// =============================================================================
// Analysis exports - CSV, JSON and plain-text summaries on disk
// =============================================================================
//
// Each analysis produces three files sharing one timestamp:
//   {TICKER}_analysis_{ts}.csv   per-bar OHLCV plus rolling SMA/RSI columns
//   {TICKER}_summary_{ts}.json   the AnalysisResult, pretty-printed
//   {TICKER}_summary_{ts}.txt    human-readable summary
//
// Every file goes through the same atomic tmp + rename write as the runtime
// config, so a reader never observes a half-written export.
// =============================================================================

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::indicators::{indicator_frame, IndicatorFrame, IndicatorParams};
use crate::price_series::PriceSeries;
use crate::types::AnalysisResult;

pub struct OutputManager {
    output_dir: PathBuf,
}

impl OutputManager {
    /// Create the manager, creating `output_dir` if it does not exist yet.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).with_context(|| {
            format!("failed to create output directory {}", output_dir.display())
        })?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write all exports for `result` and return export kind -> file path.
    pub fn save_analysis(
        &self,
        result: &AnalysisResult,
        series: &PriceSeries,
        params: &IndicatorParams,
        at: DateTime<Utc>,
    ) -> Result<BTreeMap<String, String>> {
        let stamp = at.format("%Y%m%d_%H%M%S").to_string();
        let ticker = &result.company_info.ticker;
        let mut files = BTreeMap::new();

        let csv_path = self.output_dir.join(format!("{ticker}_analysis_{stamp}.csv"));
        let frame = indicator_frame(series, params);
        write_atomic(&csv_path, &render_csv(series, &frame))?;
        files.insert("csv".to_string(), csv_path.display().to_string());

        let json_path = self.output_dir.join(format!("{ticker}_summary_{stamp}.json"));
        let json = serde_json::to_string_pretty(result)
            .context("failed to serialise analysis to JSON")?;
        write_atomic(&json_path, &json)?;
        files.insert("json".to_string(), json_path.display().to_string());

        let txt_path = self.output_dir.join(format!("{ticker}_summary_{stamp}.txt"));
        write_atomic(&txt_path, &render_text_summary(result))?;
        files.insert("text".to_string(), txt_path.display().to_string());

        info!(ticker = %ticker, dir = %self.output_dir.display(), "analysis exports written");
        Ok(files)
    }
}

/// Write to a `.tmp` sibling, then rename over `path`.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, content)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename {} into place", tmp_path.display()))?;
    Ok(())
}

// =============================================================================
// Renderers
// =============================================================================

fn render_csv(series: &PriceSeries, frame: &IndicatorFrame) -> String {
    let mut out = String::from("date,open,high,low,close,volume,sma_20,sma_50,sma_200,rsi\n");
    let cell = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();

    for (i, bar) in series.bars().iter().enumerate() {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{}",
            bar.date,
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
            cell(frame.sma[0][i]),
            cell(frame.sma[1][i]),
            cell(frame.sma[2][i]),
            cell(frame.rsi[i]),
        );
    }
    out
}

fn render_text_summary(result: &AnalysisResult) -> String {
    let info = &result.company_info;
    let ind = &result.technical_indicators;
    let stats = &result.price_statistics;
    let dollars = |v: Option<f64>| v.map(|x| format!("${x:.2}")).unwrap_or_else(|| "N/A".into());

    let mut out = String::new();
    let _ = writeln!(out, "{} ({}) Analysis", info.name, info.ticker);
    let _ = writeln!(out, "{}\n", "=".repeat(50));

    let _ = writeln!(out, "Current Technical Indicators:");
    let _ = writeln!(out, "Current Price: ${:.2}", result.current_price);
    let _ = writeln!(out, "RSI: {:.2}", ind.rsi);
    let _ = writeln!(out, "MACD: {:.4}", ind.macd);
    let _ = writeln!(out, "SMA 20: ${:.2}", ind.sma_20);
    let _ = writeln!(out, "SMA 50: ${:.2}", ind.sma_50);
    let _ = writeln!(out, "SMA 200: ${:.2}", ind.sma_200);
    let bb = &ind.bollinger_bands;
    let _ = writeln!(
        out,
        "Bollinger Bands: ${:.2} / ${:.2} / ${:.2} (%B {:.2})\n",
        bb.lower, bb.middle, bb.upper, bb.percent_b
    );

    let _ = writeln!(out, "Price Statistics:");
    for (label, value) in [
        ("Mean", stats.mean),
        ("Std", stats.std),
        ("Min", stats.min),
        ("Max", stats.max),
        ("Median", stats.median),
    ] {
        let _ = writeln!(out, "{label}: {value:.2}");
    }

    let _ = writeln!(out, "\nCompany Information:");
    let _ = writeln!(out, "Sector: {}", info.sector.as_deref().unwrap_or("N/A"));
    let _ = writeln!(out, "Industry: {}", info.industry.as_deref().unwrap_or("N/A"));
    let _ = writeln!(
        out,
        "Market Cap: {}",
        info.market_cap
            .map(|v| format!("${}", group_thousands(v)))
            .unwrap_or_else(|| "N/A".into())
    );
    let _ = writeln!(out, "52 Week High: {}", dollars(info.fifty_two_week_high));
    let _ = writeln!(out, "52 Week Low: {}", dollars(info.fifty_two_week_low));
    out
}

/// `1234567.891` -> `1,234,567.89`
fn group_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}
