mod csv;
mod memory;
mod types;
mod validator;

pub use csv::{CsvConnector, CsvMarketData};
pub use memory::InMemoryMarketData;
pub use types::{MarketDataKey, MarketDataSource, MarketSeries, RequiredColumn};
pub use validator::DataValidator;
