// =============================================================================
// Analysis assembly
// =============================================================================
//
// Validated series + company metadata in, one immutable AnalysisResult out.
// No I/O, no clock, no logging: identical input always yields bit-identical
// output, which is what makes the service-level cache sound.
// =============================================================================

use crate::indicators::{compute_indicators, IndicatorParams};
use crate::price_series::PriceSeries;
use crate::statistics::summarize;
use crate::types::{AnalysisResult, CompanyInfo};

/// Analyse a validated series.
pub fn assemble(
    series: &PriceSeries,
    company_info: CompanyInfo,
    params: &IndicatorParams,
) -> AnalysisResult {
    AnalysisResult {
        company_info,
        current_price: series.last().close,
        technical_indicators: compute_indicators(series, params),
        price_statistics: summarize(series),
        historical_prices: series.bars().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use crate::indicators::rsi::NEUTRAL_RSI;
    use crate::price_series::tests::{bar, day};
    use crate::types::PriceBar;
    use chrono::NaiveDate;

    fn company(ticker: &str) -> CompanyInfo {
        CompanyInfo {
            name: "Example Corp".into(),
            ticker: ticker.into(),
            sector: Some("Technology".into()),
            industry: None,
            market_cap: Some(1.5e12),
            fifty_two_week_high: Some(120.0),
            fifty_two_week_low: None,
        }
    }

    /// Validate `bars` under the company's ticker, then analyse them.
    fn analyse(bars: Vec<PriceBar>, info: CompanyInfo) -> Result<AnalysisResult, DataError> {
        let series = PriceSeries::new(info.ticker.clone(), bars)?;
        Ok(assemble(&series, info, &IndicatorParams::default()))
    }

    fn wavy_bars(n: u32) -> Vec<PriceBar> {
        (0..n)
            .map(|i| bar(i, 100.0 + 5.0 * (i as f64 / 3.0).sin() + i as f64 * 0.1))
            .collect()
    }

    #[test]
    fn single_bar_scenario() {
        let only = PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 50.0,
            high: 51.0,
            low: 49.0,
            close: 50.0,
            volume: 1000,
        };
        let result = analyse(vec![only], company("ABC")).unwrap();

        assert_eq!(result.current_price, 50.0);
        let stats = result.price_statistics;
        for v in [stats.mean, stats.min, stats.max, stats.median] {
            assert_eq!(v, 50.0);
        }
        assert_eq!(stats.std, 0.0);
        assert_eq!(result.technical_indicators.rsi, NEUTRAL_RSI);
        assert_eq!(result.technical_indicators.bollinger_bands.percent_b, 0.5);
        assert_eq!(result.historical_prices, vec![only]);
    }

    #[test]
    fn halted_stock_reports_flat_band() {
        let bars: Vec<PriceBar> = (0..20).map(|i| bar(i, 187.37)).collect();
        let result = analyse(bars, company("ABC")).unwrap();

        let bands = &result.technical_indicators.bollinger_bands;
        assert_eq!(bands.upper, bands.lower);
        assert_eq!(bands.bandwidth, 0.0);
        assert_eq!(bands.percent_b, 0.5);
        assert_eq!(result.price_statistics.mean, 187.37);
        assert_eq!(result.price_statistics.std, 0.0);
    }

    #[test]
    fn extreme_accepted_prices_stay_finite() {
        use crate::price_series::{MAX_PRICE, MIN_PRICE};

        let bars: Vec<PriceBar> = (0..250)
            .map(|i| bar(i, if i % 2 == 0 { MAX_PRICE / 2.0 } else { MIN_PRICE * 2.0 }))
            .collect();
        let result = analyse(bars, company("ABC")).unwrap();

        let ind = &result.technical_indicators;
        let bands = &ind.bollinger_bands;
        let stats = &result.price_statistics;
        for value in [
            ind.rsi,
            ind.macd,
            ind.sma_20,
            ind.sma_50,
            ind.sma_200,
            bands.upper,
            bands.middle,
            bands.lower,
            bands.bandwidth,
            bands.percent_b,
            stats.mean,
            stats.std,
            stats.min,
            stats.max,
            stats.median,
        ] {
            assert!(value.is_finite(), "non-finite output {value}");
        }
        let json = serde_json::to_string(&(ind, stats)).unwrap();
        assert!(!json.contains("null"), "{json}");
    }

    #[test]
    fn invalid_bar_aborts_with_ticker() {
        let mut bad = bar(1, 55.0);
        bad.low = 60.0;
        bad.high = 50.0;
        let err = analyse(vec![bar(0, 50.0), bad], company("ABC")).unwrap_err();
        assert_eq!(
            err,
            DataError::InvalidBar {
                ticker: "ABC".into(),
                date: day(1),
                reason: "low 60 exceeds high 50".into(),
            }
        );
    }

    #[test]
    fn empty_bars_abort() {
        let err = analyse(Vec::new(), company("ABC")).unwrap_err();
        assert!(matches!(err, DataError::Empty { .. }));
    }

    #[test]
    fn current_price_is_latest_close_after_sorting() {
        let mut bars = wavy_bars(40);
        bars.reverse();
        let latest = bars[0].close;
        let result = analyse(bars, company("ABC")).unwrap();
        assert_eq!(result.current_price, latest);
        assert_eq!(result.historical_prices.first().unwrap().date, day(0));
    }

    #[test]
    fn deterministic_output() {
        let series = PriceSeries::new("ABC", wavy_bars(250)).unwrap();
        let params = IndicatorParams::default();
        let a = assemble(&series, company("ABC"), &params);
        let b = assemble(&series, company("ABC"), &params);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn company_info_passes_through() {
        let info = company("XYZ");
        let result = analyse(wavy_bars(5), info.clone()).unwrap();
        assert_eq!(result.company_info, info);
    }

    #[test]
    fn json_round_trip_preserves_numbers() {
        let result = analyse(wavy_bars(120), company("ABC")).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();

        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        let (x, y) = (&result.technical_indicators, &back.technical_indicators);
        assert!(close(x.rsi, y.rsi));
        assert!(close(x.macd, y.macd));
        assert!(close(x.sma_20, y.sma_20));
        assert!(close(x.sma_200, y.sma_200));
        assert!(close(x.bollinger_bands.percent_b, y.bollinger_bands.percent_b));
        assert!(close(result.price_statistics.std, back.price_statistics.std));
        assert!(close(result.current_price, back.current_price));
        assert_eq!(result.historical_prices.len(), back.historical_prices.len());
    }

    #[test]
    fn output_has_boundary_shape() {
        let result = analyse(wavy_bars(3), company("ABC")).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        let ind = &value["technical_indicators"];
        for key in ["rsi", "macd", "sma_20", "sma_50", "sma_200"] {
            assert!(ind[key].is_number(), "{key} missing");
        }
        for key in ["upper", "middle", "lower", "bandwidth", "percent_b"] {
            assert!(ind["bollinger_bands"][key].is_number(), "{key} missing");
        }
        for key in ["mean", "std", "min", "max", "median"] {
            assert!(value["price_statistics"][key].is_number(), "{key} missing");
        }
        assert_eq!(value["historical_prices"][0]["date"], "2024-01-01");
    }
}
