#![allow(dead_code)]

use marketdna::config::{AppConfig, PopulationConfig, RetryConfig};
use marketdna::data::{InMemoryMarketData, MarketDataKey, MarketSeries};
use marketdna::App;
use std::sync::Arc;

pub const SYMBOL: &str = "BTCUSDT";
pub const TIMEFRAME: &str = "1h";

pub fn key(symbol: &str) -> MarketDataKey {
    MarketDataKey::new("binance", symbol, TIMEFRAME)
}

/// Trend plus two overlapping cycles, so both trend and oscillator genes trade.
pub fn synthetic_series(symbol: &str, bars: usize) -> MarketSeries {
    let mut series = MarketSeries::new(key(symbol));
    let mut previous: f64 = 100.0;
    for i in 0..bars {
        let t = i as f64;
        let close = 100.0 + 0.05 * t + 6.0 * (t / 12.0).sin() + 2.0 * (t / 3.7).cos();
        let open = previous;
        let high = open.max(close) + 0.4;
        let low = open.min(close) - 0.4;
        let volume = 1_000.0 + 400.0 * (t / 7.0).sin().abs();
        series.push(1_700_000_000 + i as i64 * 3_600, open, high, low, close, volume);
        previous = close;
    }
    series
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.evolution.seed = Some(42);
    config.evolution.retry = RetryConfig {
        max_retries: 1,
        initial_delay_ms: 1,
        max_delay_ms: 1,
    };
    config.backtesting.workers = 2;
    config
}

pub fn population_config(max_size: u32) -> PopulationConfig {
    PopulationConfig {
        max_size,
        ..Default::default()
    }
}

/// In-memory app with `bars` of synthetic data for `SYMBOL`.
pub fn app_with_market(bars: usize) -> (App, Arc<InMemoryMarketData>) {
    let market = Arc::new(InMemoryMarketData::new());
    market.insert(synthetic_series(SYMBOL, bars)).unwrap();
    let app = App::in_memory(test_config(), market.clone()).unwrap();
    (app, market)
}
