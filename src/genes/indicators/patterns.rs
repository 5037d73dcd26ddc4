use crate::data::MarketSeries;
use crate::error::Result;
use crate::genes::primitives::{change, clip, close, compute, sign};
use crate::genes::traits::{param, period, GeneKind, GeneParams, ParamSpec};
use super::require_bars;

#[derive(Debug, Clone, Copy)]
struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl Candle {
    fn at(series: &MarketSeries, i: usize) -> Self {
        Self {
            open: series.open[i],
            high: series.high[i],
            low: series.low[i],
            close: series.close[i],
        }
    }

    fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    fn range(&self) -> f64 {
        self.high - self.low
    }

    fn bullish(&self) -> bool {
        self.close > self.open
    }

    fn bearish(&self) -> bool {
        self.close < self.open
    }

    /// Body as a share of the bar's range; `None` for a zero-range bar.
    fn body_share(&self) -> Option<f64> {
        let range = self.range();
        (range > 0.0).then(|| self.body() / range)
    }
}

/// Thresholds of the pattern detectors.
#[derive(Debug, Clone, Copy)]
struct Thresholds {
    doji: f64,
    shadow_ratio: f64,
    engulfing_size: f64,
    star_body: f64,
    harami_size: f64,
}

impl Thresholds {
    fn is_doji(&self, bar: &Candle) -> bool {
        bar.body_share().is_some_and(|share| share < self.doji)
    }

    /// Small body in the upper part of the range over a long lower shadow.
    fn is_hammer_shape(&self, bar: &Candle) -> bool {
        match bar.body_share() {
            Some(share) => {
                let body_position = (bar.open.min(bar.close) - bar.low) / bar.range();
                share < self.shadow_ratio && body_position > 0.6
            }
            None => false,
        }
    }

    /// +1 bullish engulfing, -1 bearish engulfing, 0 otherwise.
    fn engulfing(&self, prev: &Candle, curr: &Candle) -> f64 {
        if curr.body() < prev.body() * self.engulfing_size {
            return 0.0;
        }
        if prev.bearish() && curr.bullish() && curr.open < prev.close && curr.close > prev.open {
            1.0
        } else if prev.bullish() && curr.bearish() && curr.open > prev.close && curr.close < prev.open {
            -1.0
        } else {
            0.0
        }
    }

    /// +1 morning star, -1 evening star, 0 otherwise.
    fn star(&self, first: &Candle, second: &Candle, third: &Candle) -> f64 {
        let small_middle = second.body_share().is_some_and(|share| share < self.star_body);
        if !small_middle {
            return 0.0;
        }
        if first.bearish() && third.bullish() && second.close < first.close && third.open > second.close {
            1.0
        } else if first.bullish() && third.bearish() && second.close > first.close && third.open < second.close {
            -1.0
        } else {
            0.0
        }
    }

    /// +1 bullish harami, -1 bearish harami, 0 otherwise.
    fn harami(&self, prev: &Candle, curr: &Candle) -> f64 {
        let prev_body = prev.body();
        if prev_body <= 0.0 || curr.body() / prev_body > self.harami_size {
            return 0.0;
        }
        let (top, bottom) = (prev.open.max(prev.close), prev.open.min(prev.close));
        if prev.bearish() && curr.bullish() && curr.open > bottom && curr.close < top {
            1.0
        } else if prev.bullish() && curr.bearish() && curr.open < top && curr.close > bottom {
            -1.0
        } else {
            0.0
        }
    }
}

/// Classic reversal patterns: doji, hammer / hanging man, engulfing,
/// morning / evening star and harami. Each detected pattern adds
/// `pattern_weight` times its strength; the hammer shape reads bullish after
/// a decline over `trend_period` bars and bearish after a rise.
pub struct Candlestick;

impl GeneKind for Candlestick {
    fn alias(&self) -> &'static str { "candlestick" }
    fn ui_name(&self) -> &'static str { "Candlestick Patterns" }

    fn param_specs(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::float("doji_threshold", 0.05, 0.2, 0.1),
            ParamSpec::float("shadow_ratio", 0.2, 0.5, 0.3),
            ParamSpec::float("engulfing_size", 1.0, 2.0, 1.1),
            ParamSpec::float("star_body_size", 0.1, 0.5, 0.3),
            ParamSpec::float("harami_size", 0.2, 0.8, 0.5),
            ParamSpec::float("pattern_weight", 0.1, 1.0, 0.5),
            ParamSpec::integer("trend_period", 2.0, 20.0, 5.0),
        ]
    }

    fn lookback(&self, params: &GeneParams) -> usize {
        params.get("trend_period").map_or(5, |p| *p as usize).max(2) + 1
    }

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>> {
        let thresholds = Thresholds {
            doji: param(params, "doji_threshold")?,
            shadow_ratio: param(params, "shadow_ratio")?,
            engulfing_size: param(params, "engulfing_size")?,
            star_body: param(params, "star_body_size")?,
            harami_size: param(params, "harami_size")?,
        };
        let weight = param(params, "pattern_weight")?;
        let trend_period = period(params, "trend_period")?;
        require_bars(self.alias(), series, self.lookback(params))?;

        let [trend] = compute(series, [change(close(), trend_period)])?;

        let mut out = vec![0.0; series.len()];
        for i in 2..series.len() {
            let (first, prev, curr) = (Candle::at(series, i - 2), Candle::at(series, i - 1), Candle::at(series, i));
            let mut vote = 0.0;

            if thresholds.is_doji(&curr) {
                vote += sign(curr.close - curr.open) * weight * 0.5;
            }
            if thresholds.is_hammer_shape(&curr) {
                // Trend into the pattern, measured up to the prior bar.
                vote -= sign(trend[i - 1]) * weight;
            }
            vote += thresholds.engulfing(&prev, &curr) * weight * 1.5;
            vote += thresholds.star(&first, &prev, &curr) * weight * 2.0;
            vote += thresholds.harami(&prev, &curr) * weight;

            out[i] = clip(vote);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketDataKey;

    fn series(bars: &[(f64, f64, f64, f64)]) -> MarketSeries {
        let mut series = MarketSeries::new(MarketDataKey::new("binance", "TEST", "1d"));
        for (i, &(o, h, l, c)) in bars.iter().enumerate() {
            series.push(i as i64, o, h, l, c, 1_000.0);
        }
        series
    }

    fn declining(n: usize) -> Vec<(f64, f64, f64, f64)> {
        (0..n)
            .map(|i| {
                let open = 100.0 * (1.0 - i as f64 * 0.01);
                let close = open * 0.99;
                (open, open * 1.01, close * 0.98, close)
            })
            .collect()
    }

    fn rising(n: usize) -> Vec<(f64, f64, f64, f64)> {
        (0..n)
            .map(|i| {
                let open = 100.0 * (1.0 + i as f64 * 0.01);
                let close = open * 1.01;
                (open, close * 1.01, open * 0.98, close)
            })
            .collect()
    }

    fn last_signal(bars: &[(f64, f64, f64, f64)]) -> f64 {
        let signals = Candlestick.signals(&series(bars), &Candlestick.default_params()).unwrap();
        assert_eq!(signals.len(), bars.len());
        assert!(signals.iter().all(|s| (-1.0..=1.0).contains(s)));
        signals[bars.len() - 1]
    }

    #[test]
    fn hammer_after_a_decline_buys() {
        let mut bars = declining(19);
        let open = bars[18].3;
        let close = open * 1.005;
        bars.push((open, close * 1.002, open * 0.95, close));
        assert!(last_signal(&bars) > 0.0);
    }

    #[test]
    fn hanging_man_after_a_rise_sells() {
        let mut bars = rising(19);
        let open = bars[18].3;
        let close = open * 1.005;
        bars.push((open, close * 1.002, open * 0.95, close));
        assert!(last_signal(&bars) < 0.0);
    }

    #[test]
    fn bullish_engulfing_buys_strongly() {
        let mut bars = rising(10);
        bars.push((105.0, 105.5, 101.5, 102.0));
        bars.push((101.0, 107.0, 100.5, 106.5));
        assert_eq!(last_signal(&bars), 0.75);
    }

    #[test]
    fn bearish_engulfing_sells_strongly() {
        let mut bars = declining(10);
        bars.push((100.0, 103.5, 99.5, 103.0));
        bars.push((104.0, 104.5, 98.0, 98.5));
        assert_eq!(last_signal(&bars), -0.75);
    }

    #[test]
    fn flat_bars_vote_nothing() {
        let bars = vec![(100.0, 100.0, 100.0, 100.0); 12];
        assert!(last_signal(&bars) == 0.0);
    }

    #[test]
    fn short_series_is_insufficient() {
        let result = Candlestick.signals(&series(&declining(3)), &Candlestick.default_params());
        assert!(result.unwrap_err().to_string().contains("insufficient data"));
    }
}
