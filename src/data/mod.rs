pub mod cache;
pub mod connectors;

pub use cache::IndicatorCache;
pub use connectors::{
    CsvConnector, CsvMarketData, DataValidator, InMemoryMarketData, MarketDataKey,
    MarketDataSource, MarketSeries,
};
