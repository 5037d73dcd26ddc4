use super::traits::ConfigSection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub market_source: MarketSource,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("marketdna.db"),
            market_source: MarketSource::Sqlite,
        }
    }
}

/// Where OHLCV bars are read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketSource {
    /// The `market_data` table of the population database.
    Sqlite,
    /// `{dir}/{exchange}_{symbol}_{timeframe}.csv` files.
    Csv { dir: PathBuf },
}

impl ConfigSection for StorageConfig {
    fn section_name() -> &'static str {
        "storage"
    }

    fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.database_path.as_os_str().is_empty() {
            violations.push("database_path must not be empty".to_string());
        }
        if let MarketSource::Csv { dir } = &self.market_source {
            if dir.as_os_str().is_empty() {
                violations.push("market_source.dir must not be empty".to_string());
            }
        }
        violations
    }
}
