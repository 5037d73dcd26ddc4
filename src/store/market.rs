use super::Store;
use crate::data::{MarketDataKey, MarketDataSource, MarketSeries};
use crate::error::{MarketDnaError, Result};
use rusqlite::{params, Connection};
use std::sync::Arc;

/// Reads bars from the `market_data` table.
///
/// Only OHLCV is used; any precomputed indicator columns are left to other
/// consumers since genes derive their own signals.
pub struct SqliteMarketData {
    store: Arc<Store>,
}

impl SqliteMarketData {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl MarketDataSource for SqliteMarketData {
    fn load(&self, key: &MarketDataKey) -> Result<Arc<MarketSeries>> {
        let series = self.store.with_conn(|conn| load_series(conn, key))?;
        if series.is_empty() {
            return Err(MarketDnaError::DataLoading(format!("no market data stored for {}", key)));
        }
        series.check()?;
        log::debug!("Loaded {} bars for {} from market_data", series.len(), key);
        Ok(Arc::new(series))
    }
}

pub fn load_series(conn: &Connection, key: &MarketDataKey) -> Result<MarketSeries> {
    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, open, high, low, close, volume FROM market_data
         WHERE exchange = ?1 AND symbol = ?2 AND timeframe = ?3
         ORDER BY timestamp",
    )?;
    let mut rows = stmt.query(params![key.exchange, key.symbol, key.timeframe])?;

    let mut series = MarketSeries::new(key.clone());
    while let Some(row) = rows.next()? {
        series.push(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?);
    }
    Ok(series)
}

/// Writes bars, replacing any already stored at the same timestamps.
pub fn insert_series(conn: &Connection, series: &MarketSeries) -> Result<usize> {
    series.check()?;
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO market_data (exchange, symbol, timeframe, timestamp, open, high, low, close, volume)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    let key = &series.key;
    for i in 0..series.len() {
        stmt.execute(params![
            key.exchange,
            key.symbol,
            key.timeframe,
            series.timestamps[i],
            series.open[i],
            series.high[i],
            series.low[i],
            series.close[i],
            series.volume[i],
        ])?;
    }
    Ok(series.len())
}

impl Store {
    pub fn insert_market_data(&self, series: &MarketSeries) -> Result<usize> {
        self.with_tx(|tx| insert_series(tx, series))
    }
}
