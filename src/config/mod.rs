pub mod traits;
pub mod evolution;
pub mod population;
pub mod backtesting;
pub mod trade_management;
pub mod storage;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use evolution::{EvolutionConfig, RetryConfig};
pub use population::{PopulationConfig, PopulationSpec};
pub use backtesting::{BacktestingConfig, FitnessWeights};
pub use trade_management::TradeManagementConfig;
pub use storage::{MarketSource, StorageConfig};
pub use traits::ConfigSection;
