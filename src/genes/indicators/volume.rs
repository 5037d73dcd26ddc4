use crate::data::MarketSeries;
use crate::error::Result;
use crate::genes::primitives::{change, close, compute, obv, previous, sign, sma, volume};
use crate::genes::traits::{param, period, GeneKind, GeneParams, ParamSpec};
use super::require_bars;

/// On-balance volume against price over `period` bars: agreement follows the
/// move at half strength, divergence fades it.
pub struct Obv;

impl GeneKind for Obv {
    fn alias(&self) -> &'static str { "obv" }
    fn ui_name(&self) -> &'static str { "On-Balance Volume" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::integer("period", 5.0, 50.0, 20.0)]
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("period").map_or(20, |p| *p as usize) + 1
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let period = period(params, "period")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        let [price_change, volume_change] = compute(
            series,
            [change(close(), period), change(obv(close(), volume()), period)],
        )?;
        Ok(price_change
            .iter()
            .zip(&volume_change)
            .map(|(&price, &flow)| {
                let (price_move, volume_move) = (sign(price), sign(flow));
                if price_move != 0.0 && volume_move != 0.0 && price_move != volume_move {
                    -price_move
                } else {
                    0.5 * price_move
                }
            })
            .collect())
    }
}

/// A volume spike of at least `threshold` times the trailing average votes
/// in the direction of the bar's close-to-close move.
pub struct VolumeSpike;

impl GeneKind for VolumeSpike {
    fn alias(&self) -> &'static str { "volume" }
    fn ui_name(&self) -> &'static str { "Volume Spike" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::integer("period", 5.0, 50.0, 20.0),
            ParamSpec::float("threshold", 1.1, 4.0, 1.5),
        ]
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("period").map_or(20, |p| *p as usize) + 1
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let period = period(params, "period")?;
        let threshold = param(params, "threshold")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        // Trailing average excludes the bar being judged.
        let [average] = compute(series, [previous(sma(volume(), period))])?;
        let mut out = vec![0.0; series.len()];
        for i in 1..series.len() {
            let baseline = average[i];
            if baseline.is_nan() || !(baseline > 0.0) {
                continue;
            }
            let ratio = series.volume[i] / baseline;
            if ratio >= threshold {
                let strength = (ratio / (2.0 * threshold)).min(1.0);
                out[i] = sign(series.close[i] - series.close[i - 1]) * strength;
            }
        }
        Ok(out)
    }
}
