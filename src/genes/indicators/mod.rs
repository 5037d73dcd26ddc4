pub mod momentum;
pub mod patterns;
pub mod trend;
pub mod volatility;
pub mod volume;

pub use momentum::{Rsi, Stochastic};
pub use patterns::Candlestick;
pub use trend::{Bollinger, Macd, MovingAverage};
pub use volatility::{Atr, VolatilityBreakout};
pub use volume::{Obv, VolumeSpike};

use crate::data::MarketSeries;
use crate::error::{MarketDnaError, Result};

/// Fails when the series cannot cover the warm-up window.
pub(crate) fn require_bars(alias: &str, series: &MarketSeries, lookback: usize) -> Result<()> {
    if series.len() <= lookback {
        return Err(MarketDnaError::EvaluationFailure(format!(
            "insufficient data: {} needs more than {} bars, series has {}",
            alias,
            lookback,
            series.len()
        )));
    }
    Ok(())
}
