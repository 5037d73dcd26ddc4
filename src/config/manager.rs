use super::{
    backtesting::BacktestingConfig,
    evolution::EvolutionConfig,
    population::{PopulationConfig, PopulationSpec},
    storage::StorageConfig,
    trade_management::TradeManagementConfig,
    traits::ConfigSection,
};
use crate::error::{MarketDnaError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

pub const ENV_PREFIX: &str = "MARKETDNA";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub population: PopulationConfig,
    pub backtesting: BacktestingConfig,
    pub trade_management: TradeManagementConfig,
    pub storage: StorageConfig,
    pub populations: Vec<PopulationSpec>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        collect::<EvolutionConfig>(&mut violations, &self.evolution);
        collect::<PopulationConfig>(&mut violations, &self.population);
        collect::<BacktestingConfig>(&mut violations, &self.backtesting);
        collect::<TradeManagementConfig>(&mut violations, &self.trade_management);
        collect::<StorageConfig>(&mut violations, &self.storage);
        for spec in &self.populations {
            if let Some(config) = &spec.config {
                for violation in config.violations() {
                    violations.push(format!("populations.{}: {}", spec.name, violation));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(MarketDnaError::Validation(violations))
        }
    }
}

fn collect<S: ConfigSection>(violations: &mut Vec<String>, section: &S) {
    for violation in section.violations() {
        violations.push(format!("{}.{}", S::section_name(), violation));
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Loads a TOML or JSON file layered with `MARKETDNA__SECTION__KEY`
    /// environment overrides.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| MarketDnaError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| MarketDnaError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.write()? = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = self.get()?;
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| MarketDnaError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| MarketDnaError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> Result<AppConfig> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| MarketDnaError::InvalidState("configuration lock poisoned".to_string()))
    }

    /// Applies `f` to a copy and only keeps it when it validates.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get()?;
        f(&mut candidate);
        candidate.validate()?;
        *self.write()? = candidate;
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, AppConfig>> {
        self.config
            .write()
            .map_err(|_| MarketDnaError::InvalidState("configuration lock poisoned".to_string()))
    }
}
