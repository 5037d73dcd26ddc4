use crate::data::MarketSeries;
use crate::error::Result;
use crate::genes::primitives::{
    clip, close, compute, high, low, previous, rolling_max, rolling_min, sma, true_range, wilder,
};
use crate::genes::traits::{param, period, GeneKind, GeneParams, ParamSpec};
use super::require_bars;

/// Keltner-style bands of `multiplier` ATRs around the close SMA; a close
/// outside the bands votes with the move.
pub struct Atr;

impl GeneKind for Atr {
    fn alias(&self) -> &'static str { "atr" }
    fn ui_name(&self) -> &'static str { "Average True Range Bands" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 5.0, 50.0, 14.0),
            ParamSpec::float("multiplier", 0.5, 4.0, 2.0),
        ]
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("period").map_or(14, |p| *p as usize) + 1
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let period = period(params, "period")?;
        let multiplier = param(params, "multiplier")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        let [atr, middle] = compute(
            series,
            [wilder(true_range(high(), low(), close()), period), sma(close(), period)],
        )?;
        Ok((0..series.len())
            .map(|i| {
                let band = multiplier * atr[i];
                if middle[i].is_nan() || !(band > 0.0) {
                    0.0
                } else {
                    clip((series.close[i] - middle[i]) / band)
                }
            })
            .collect())
    }
}

/// Breakout from the range of the last `consolidation_periods` bars,
/// measured in ATRs and scaled by `breakout_threshold`.
pub struct VolatilityBreakout;

impl GeneKind for VolatilityBreakout {
    fn alias(&self) -> &'static str { "volatility_breakout" }
    fn ui_name(&self) -> &'static str { "Volatility Breakout" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 5.0, 50.0, 20.0),
            ParamSpec::float("breakout_threshold", 0.5, 3.0, 1.5),
            ParamSpec::integer("consolidation_periods", 2.0, 20.0, 5.0),
        ]
    }

    fn cross_rules(&self, params: &GeneParams) -> Vec<String> {
        let period = params.get("period").copied().unwrap_or(0.0);
        let consolidation = params.get("consolidation_periods").copied().unwrap_or(0.0);
        if consolidation >= period {
            vec![format!(
                "volatility_breakout: consolidation_periods must be shorter than period (got {} >= {})",
                consolidation, period
            )]
        } else {
            Vec::new()
        }
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        let period = params.get("period").map_or(20, |p| *p as usize);
        let consolidation = params.get("consolidation_periods").map_or(5, |p| *p as usize);
        period.max(consolidation) + 1
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let atr_period = period(params, "period")?;
        let threshold = param(params, "breakout_threshold")?;
        let consolidation = period(params, "consolidation_periods")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        // The range excludes the bar being judged.
        let [atr, prior_high, prior_low] = compute(
            series,
            [
                wilder(true_range(high(), low(), close()), atr_period),
                previous(rolling_max(high(), consolidation)),
                previous(rolling_min(low(), consolidation)),
            ],
        )?;

        let mut out = vec![0.0; series.len()];
        for i in 0..series.len() {
            let (ceiling, floor, unit) = (prior_high[i], prior_low[i], atr[i]);
            if ceiling.is_nan() || !(unit > 0.0) {
                continue;
            }
            let close = series.close[i];
            let excursion = if close > ceiling {
                (close - ceiling) / unit
            } else if close < floor {
                (close - floor) / unit
            } else {
                0.0
            };
            out[i] = clip(excursion / threshold);
        }
        Ok(out)
    }
}
