use crate::data::MarketSeries;
use crate::error::Result;
use crate::genes::primitives::{clip, close, compute, ema, rolling_std, sma};
use crate::genes::traits::{param, period, GeneKind, GeneParams, ParamSpec};
use super::require_bars;

/// Trend follower: votes by how far price sits from its average, measured in
/// units of `distance`.
pub struct MovingAverage;

impl GeneKind for MovingAverage {
    fn alias(&self) -> &'static str { "moving_average" }
    fn ui_name(&self) -> &'static str { "Moving Average Distance" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 5.0, 200.0, 20.0),
            ParamSpec::float("distance", 0.005, 0.1, 0.02),
            // 0 = simple, 1 = exponential
            ParamSpec::integer("ma_type", 0.0, 1.0, 0.0),
        ]
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("period").map_or(20, |p| *p as usize)
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let period = period(params, "period")?;
        let distance = param(params, "distance")?;
        let ma_type = param(params, "ma_type")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        let line = if ma_type >= 1.0 {
            ema(close(), period)
        } else {
            sma(close(), period)
        };
        let [average] = compute(series, [line])?;
        Ok(series
            .close
            .iter()
            .zip(&average)
            .map(|(&price, &ma)| {
                if ma.is_nan() || ma == 0.0 {
                    0.0
                } else {
                    clip(((price - ma) / ma) / distance)
                }
            })
            .collect())
    }
}

pub struct Macd;

impl GeneKind for Macd {
    fn alias(&self) -> &'static str { "macd" }
    fn ui_name(&self) -> &'static str { "MACD Histogram" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("fast_period", 2.0, 50.0, 12.0),
            ParamSpec::integer("slow_period", 5.0, 100.0, 26.0),
            ParamSpec::integer("signal_period", 2.0, 30.0, 9.0),
        ]
    }

    fn cross_rules(&self, params: &GeneParams) -> Vec<String> {
        let fast = params.get("fast_period").copied().unwrap_or(0.0);
        let slow = params.get("slow_period").copied().unwrap_or(0.0);
        if slow - fast < 2.0 {
            vec![format!(
                "macd: slow_period must exceed fast_period by at least 2 (got fast={} slow={})",
                fast, slow
            )]
        } else {
            Vec::new()
        }
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("slow_period").map_or(26, |p| *p as usize)
            + params.get("signal_period").map_or(9, |p| *p as usize)
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let fast = period(params, "fast_period")?;
        let slow = period(params, "slow_period")?;
        let signal_period = period(params, "signal_period")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        let macd = ema(close(), fast) - ema(close(), slow);
        let [histogram] = compute(series, [macd.clone() - ema(macd, signal_period)])?;

        Ok((0..series.len())
            .map(|i| {
                let histogram = histogram[i];
                let price = series.close[i];
                if histogram.is_nan() || price == 0.0 {
                    0.0
                } else {
                    // Histogram in half-percent steps of price.
                    clip((histogram / price * 200.0).tanh())
                }
            })
            .collect())
    }
}

/// Mean reversion inside the bands: the upper band sells, the lower band buys.
pub struct Bollinger;

impl GeneKind for Bollinger {
    fn alias(&self) -> &'static str { "bollinger" }
    fn ui_name(&self) -> &'static str { "Bollinger Bands" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 5.0, 50.0, 20.0),
            ParamSpec::float("std_dev", 1.0, 3.5, 2.0),
        ]
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("period").map_or(20, |p| *p as usize)
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let period = period(params, "period")?;
        let width = param(params, "std_dev")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        let [middle, deviation] = compute(series, [sma(close(), period), rolling_std(close(), period)])?;
        Ok((0..series.len())
            .map(|i| {
                let half_band = width * deviation[i];
                if middle[i].is_nan() || !(half_band > 0.0) {
                    0.0
                } else {
                    clip(-(series.close[i] - middle[i]) / half_band)
                }
            })
            .collect())
    }
}
