use crate::error::{MarketDnaError, Result};
use super::types::{MarketDataKey, MarketDataSource, MarketSeries};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Series held in process, for tools and tests.
#[derive(Default)]
pub struct InMemoryMarketData {
    series: RwLock<HashMap<MarketDataKey, Arc<MarketSeries>>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, series: MarketSeries) -> Result<()> {
        series.check()?;
        let mut map = self
            .series
            .write()
            .map_err(|_| MarketDnaError::InvalidState("market data lock poisoned".to_string()))?;
        map.insert(series.key.clone(), Arc::new(series));
        Ok(())
    }

    pub fn remove(&self, key: &MarketDataKey) -> Result<()> {
        let mut map = self
            .series
            .write()
            .map_err(|_| MarketDnaError::InvalidState("market data lock poisoned".to_string()))?;
        map.remove(key);
        Ok(())
    }
}

impl MarketDataSource for InMemoryMarketData {
    fn load(&self, key: &MarketDataKey) -> Result<Arc<MarketSeries>> {
        let map = self
            .series
            .read()
            .map_err(|_| MarketDnaError::InvalidState("market data lock poisoned".to_string()))?;
        map.get(key)
            .cloned()
            .ok_or_else(|| MarketDnaError::DataLoading(format!("No market data for {}", key)))
    }
}
