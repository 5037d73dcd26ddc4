use crate::error::{MarketDnaError, Result};
use polars::df;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Required OHLCV columns for market data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequiredColumn {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl RequiredColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::Open, Self::High, Self::Low, Self::Close, Self::Volume]
    }

    /// Common alternative column names
    pub fn aliases(&self) -> Vec<&'static str> {
        match self {
            Self::Open => vec!["open", "Open", "OPEN", "o"],
            Self::High => vec!["high", "High", "HIGH", "h"],
            Self::Low => vec!["low", "Low", "LOW", "l"],
            Self::Close => vec!["close", "Close", "CLOSE", "c"],
            Self::Volume => vec!["volume", "Volume", "VOLUME", "vol", "Vol", "v"],
        }
    }
}

/// Identifies one OHLCV series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarketDataKey {
    pub exchange: String,
    pub symbol: String,
    pub timeframe: String,
}

impl MarketDataKey {
    pub fn new(exchange: &str, symbol: &str, timeframe: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        }
    }
}

impl fmt::Display for MarketDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.exchange, self.symbol, self.timeframe)
    }
}

/// Column-oriented OHLCV bars in ascending timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSeries {
    pub key: MarketDataKey,
    pub timestamps: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl MarketSeries {
    pub fn new(key: MarketDataKey) -> Self {
        Self {
            key,
            timestamps: Vec::new(),
            open: Vec::new(),
            high: Vec::new(),
            low: Vec::new(),
            close: Vec::new(),
            volume: Vec::new(),
        }
    }

    pub fn push(&mut self, timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) {
        self.timestamps.push(timestamp);
        self.open.push(open);
        self.high.push(high);
        self.low.push(low);
        self.close.push(close);
        self.volume.push(volume);
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// The bars as a polars frame with lowercase OHLCV column names.
    pub fn to_frame(&self) -> Result<DataFrame> {
        Ok(df! {
            "timestamp" => self.timestamps.as_slice(),
            "open" => self.open.as_slice(),
            "high" => self.high.as_slice(),
            "low" => self.low.as_slice(),
            "close" => self.close.as_slice(),
            "volume" => self.volume.as_slice(),
        }?)
    }

    /// Rejects ragged columns and broken bar geometry.
    pub fn check(&self) -> Result<()> {
        let n = self.len();
        if [self.timestamps.len(), self.open.len(), self.high.len(), self.low.len(), self.volume.len()]
            .iter()
            .any(|&len| len != n)
        {
            return Err(MarketDnaError::DataLoading(format!(
                "{}: columns have different lengths",
                self.key
            )));
        }
        for i in 0..n {
            let (o, h, l, c) = (self.open[i], self.high[i], self.low[i], self.close[i]);
            if h < l || h < o || h < c || l > o || l > c {
                return Err(MarketDnaError::DataLoading(format!(
                    "{}: invalid bar at row {} (o={} h={} l={} c={})",
                    self.key, i, o, h, l, c
                )));
            }
        }
        Ok(())
    }
}

/// Read-only supplier of OHLCV bars.
pub trait MarketDataSource: Send + Sync {
    /// Fails with `DataLoading` when nothing is stored for `key`.
    fn load(&self, key: &MarketDataKey) -> Result<Arc<MarketSeries>>;
}
