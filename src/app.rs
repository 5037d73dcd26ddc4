use crate::config::{AppConfig, MarketSource};
use crate::data::{CsvMarketData, MarketDataSource};
use crate::engines::evaluation::FitnessEvaluator;
use crate::engines::generation::EvolutionController;
use crate::error::Result;
use crate::genes::GeneRegistry;
use crate::population::{EvolutionService, PopulationLocks, PopulationManager};
use crate::store::{PopulationRecord, SqliteMarketData, Store};
use crate::types::PopulationStatus;
use std::sync::Arc;

/// Everything a running process needs, wired from one `AppConfig`.
pub struct App {
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub registry: Arc<GeneRegistry>,
    pub controller: Arc<EvolutionController>,
    pub manager: Arc<PopulationManager>,
    pub service: EvolutionService,
}

impl App {
    /// Opens the configured database and market source.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(Store::open(&config.storage.database_path)?);
        let market: Arc<dyn MarketDataSource> = match &config.storage.market_source {
            MarketSource::Sqlite => Arc::new(SqliteMarketData::new(Arc::clone(&store))),
            MarketSource::Csv { dir } => Arc::new(CsvMarketData::new(dir.clone())),
        };
        log::info!(
            "Opened {} with {:?} market data",
            config.storage.database_path.display(),
            config.storage.market_source
        );
        Self::assemble(config, store, market)
    }

    /// A throwaway database with the given market source.
    pub fn in_memory(config: AppConfig, market: Arc<dyn MarketDataSource>) -> Result<Self> {
        let store = Arc::new(Store::open_in_memory()?);
        Self::assemble(config, store, market)
    }

    pub fn assemble(config: AppConfig, store: Arc<Store>, market: Arc<dyn MarketDataSource>) -> Result<Self> {
        let registry = Arc::new(GeneRegistry::new());
        let locks = Arc::new(PopulationLocks::new());
        let evaluator = FitnessEvaluator::new(
            Arc::clone(&registry),
            config.backtesting.clone(),
            config.trade_management.clone(),
        )?;
        log::debug!(
            "{} gene types registered, {} evaluation workers",
            registry.len(),
            evaluator.workers()
        );

        let controller = Arc::new(EvolutionController::new(
            Arc::clone(&store),
            market,
            Arc::clone(&registry),
            evaluator,
            config.evolution.clone(),
            Arc::clone(&locks),
        ));
        let manager = Arc::new(PopulationManager::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            config.evolution.clone(),
            locks,
        ));
        let service = EvolutionService::new(Arc::clone(&controller), Arc::clone(&manager));

        Ok(Self {
            config,
            store,
            registry,
            controller,
            manager,
            service,
        })
    }

    /// Creates every configured population that does not exist yet and
    /// returns the active ones.
    pub fn ensure_populations(&self) -> Result<Vec<PopulationRecord>> {
        for spec in &self.config.populations {
            if self.manager.find_by_name(&spec.name)?.is_some() {
                continue;
            }
            let config = spec.config.clone().unwrap_or_else(|| self.config.population.clone());
            self.manager
                .create_population(&spec.name, &spec.symbol, &spec.timeframe, &config)?;
        }
        Ok(self
            .manager
            .list_populations()?
            .into_iter()
            .filter(|p| p.status == PopulationStatus::Active)
            .collect())
    }
}
