//! Indicator lines as polars expressions over the OHLCV columns, and the
//! per-bar helpers that turn evaluated lines into votes.
//!
//! Lines are evaluated with [`compute`]; bars inside a warm-up window come
//! back as `NaN`.

use crate::data::MarketSeries;
use crate::error::{MarketDnaError, Result};
use polars::prelude::{col, lit, when, DataFrame, DataType, EWMOptions, Expr, IntoLazy, RollingOptionsFixedWindow};

pub fn open() -> Expr {
    col("open")
}

pub fn high() -> Expr {
    col("high")
}

pub fn low() -> Expr {
    col("low")
}

pub fn close() -> Expr {
    col("close")
}

pub fn volume() -> Expr {
    col("volume")
}

fn window(period: usize) -> RollingOptionsFixedWindow {
    RollingOptionsFixedWindow {
        window_size: period.max(1),
        min_periods: period.max(1),
        ..Default::default()
    }
}

pub fn sma(values: Expr, period: usize) -> Expr {
    values.rolling_mean(window(period))
}

/// Exponential moving average, alpha = 2 / (period + 1).
pub fn ema(values: Expr, period: usize) -> Expr {
    smoothed(values, period, 2.0 / (period as f64 + 1.0))
}

/// Wilder's smoothing (alpha = 1 / period), as used by RSI and ATR.
pub fn wilder(values: Expr, period: usize) -> Expr {
    smoothed(values, period, 1.0 / period.max(1) as f64)
}

fn smoothed(values: Expr, period: usize, alpha: f64) -> Expr {
    values.ewm_mean(EWMOptions {
        alpha,
        adjust: false,
        min_periods: period.max(1),
        ..Default::default()
    })
}

/// Sample standard deviation over a trailing window.
pub fn rolling_std(values: Expr, period: usize) -> Expr {
    values.rolling_std(window(period))
}

pub fn rolling_max(values: Expr, period: usize) -> Expr {
    values.rolling_max(window(period))
}

pub fn rolling_min(values: Expr, period: usize) -> Expr {
    values.rolling_min(window(period))
}

/// The value one bar earlier.
pub fn previous(values: Expr) -> Expr {
    lagged(values, 1)
}

pub fn lagged(values: Expr, bars: usize) -> Expr {
    values.shift(lit(bars as i64))
}

/// `values` minus its value `bars` earlier.
pub fn change(values: Expr, bars: usize) -> Expr {
    values.clone() - lagged(values, bars)
}

fn larger(a: Expr, b: Expr) -> Expr {
    when(a.clone().gt_eq(b.clone())).then(a).otherwise(b)
}

/// True range; the first bar falls back to its own close.
pub fn true_range(high: Expr, low: Expr, close: Expr) -> Expr {
    let prior_close = previous(close.clone()).fill_null(close);
    let span = high.clone() - low.clone();
    let up = (high - prior_close.clone()).abs();
    let down = (low - prior_close).abs();
    larger(span, larger(up, down))
}

/// Wilder RSI in [0, 100]; a flat window yields `NaN`.
pub fn rsi(close: Expr, period: usize) -> Expr {
    let delta = change(close, 1);
    let gain = when(delta.clone().gt(lit(0.0)))
        .then(delta.clone())
        .otherwise(lit(0.0));
    let loss = when(delta.clone().lt(lit(0.0)))
        .then(delta.abs())
        .otherwise(lit(0.0));
    let rs = wilder(gain, period) / wilder(loss, period);
    lit(100.0) - lit(100.0) / (lit(1.0) + rs)
}

/// Running on-balance volume.
pub fn obv(close: Expr, volume: Expr) -> Expr {
    let prior = previous(close.clone());
    when(close.clone().gt(prior.clone()))
        .then(volume.clone())
        .when(close.lt(prior))
        .then(lit(0.0) - volume)
        .otherwise(lit(0.0))
        .cum_sum(false)
}

/// Evaluates `lines` over the series, one vector per line in input order.
pub fn compute<const N: usize>(series: &MarketSeries, lines: [Expr; N]) -> Result<[Vec<f64>; N]> {
    let names: Vec<String> = (0..N).map(|i| format!("line_{}", i)).collect();
    let selected: Vec<Expr> = lines
        .into_iter()
        .zip(&names)
        .map(|(line, name)| line.alias(name.as_str()))
        .collect();
    let frame = series.to_frame()?.lazy().select(selected).collect()?;

    let mut out = Vec::with_capacity(N);
    for name in &names {
        out.push(column_values(&frame, name)?);
    }
    out.try_into()
        .map_err(|_| MarketDnaError::EvaluationFailure("indicator frame lost a line".to_string()))
}

fn column_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = frame.column(name)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Map an oscillator reading onto a contrarian vote: overbought sells,
/// oversold buys, the neutral band scales linearly between +/- 0.5.
pub fn oscillator_vote(value: f64, overbought: f64, oversold: f64, top: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let vote = if value > overbought {
        -0.5 - 0.5 * (value - overbought) / (top - overbought).max(f64::EPSILON)
    } else if value < oversold {
        0.5 + 0.5 * (oversold - value) / oversold.max(f64::EPSILON)
    } else {
        let mid = (overbought + oversold) / 2.0;
        (mid - value) / (overbought - oversold).max(f64::EPSILON)
    };
    clip(vote)
}

pub fn clip(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
