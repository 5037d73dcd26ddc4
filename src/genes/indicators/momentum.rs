use crate::data::MarketSeries;
use crate::error::Result;
use crate::genes::primitives::{
    clip, close, compute, high, low, oscillator_vote, rolling_max, rolling_min, rsi, sign, sma,
};
use crate::genes::traits::{param, period, GeneKind, GeneParams, ParamSpec};
use polars::prelude::{lit, when};
use super::require_bars;

pub struct Rsi;

impl GeneKind for Rsi {
    fn alias(&self) -> &'static str { "rsi" }
    fn ui_name(&self) -> &'static str { "Relative Strength Index" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 2.0, 50.0, 14.0),
            ParamSpec::float("overbought", 55.0, 90.0, 70.0),
            ParamSpec::float("oversold", 10.0, 45.0, 30.0),
        ]
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("period").map_or(14, |p| *p as usize) + 1
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let period = period(params, "period")?;
        let overbought = param(params, "overbought")?;
        let oversold = param(params, "oversold")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        let [line] = compute(series, [rsi(close(), period)])?;
        Ok(line
            .into_iter()
            .map(|value| oscillator_vote(value, overbought, oversold, 100.0))
            .collect())
    }
}

pub struct Stochastic;

impl Stochastic {
    /// %K and its %D smoothing; a flat range reads 50.
    pub fn lines(series: &MarketSeries, k_period: usize, d_period: usize) -> Result<(Vec<f64>, Vec<f64>)> {
        let lowest = rolling_min(low(), k_period);
        let range = rolling_max(high(), k_period) - lowest.clone();
        let k = when(range.clone().eq(lit(0.0)))
            .then(lit(50.0))
            .otherwise(lit(100.0) * (close() - lowest) / range);
        let d = sma(k.clone(), d_period);
        let [k, d] = compute(series, [k, d])?;
        Ok((k, d))
    }
}

impl GeneKind for Stochastic {
    fn alias(&self) -> &'static str { "stochastic" }
    fn ui_name(&self) -> &'static str { "Stochastic Oscillator" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("k_period", 5.0, 30.0, 14.0),
            ParamSpec::integer("d_period", 2.0, 10.0, 3.0),
            ParamSpec::float("overbought", 60.0, 95.0, 80.0),
            ParamSpec::float("oversold", 5.0, 40.0, 20.0),
        ]
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("k_period").map_or(14, |p| *p as usize)
            + params.get("d_period").map_or(3, |p| *p as usize)
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let k_period = period(params, "k_period")?;
        let d_period = period(params, "d_period")?;
        let overbought = param(params, "overbought")?;
        let oversold = param(params, "oversold")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        let (k, d) = Self::lines(series, k_period, d_period)?;
        Ok(k.iter()
            .zip(&d)
            .map(|(&k, &d)| {
                if k.is_nan() || d.is_nan() {
                    0.0
                } else {
                    clip(0.7 * oscillator_vote(k, overbought, oversold, 100.0) + 0.3 * sign(k - d))
                }
            })
            .collect())
    }
}
