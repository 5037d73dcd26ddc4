use super::PopulationLocks;
use crate::config::{population::TIMEFRAMES, ConfigSection, EvolutionConfig, PopulationConfig};
use crate::engines::generation::{
    operators::{population_rng, seed_chromosomes},
    Chromosome, GenomeShape,
};
use crate::error::{MarketDnaError, Result};
use crate::genes::GeneRegistry;
use crate::store::{chromosomes, history, populations, HistoryRecord, PopulationRecord, Store};
use crate::types::{ChromosomeStatus, PopulationStatus};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Snapshot returned by [`PopulationManager::get_status`].
#[derive(Debug, Clone, Serialize)]
pub struct PopulationStatusReport {
    pub id: i64,
    pub name: String,
    pub status: PopulationStatus,
    pub current_generation: u32,
    pub diversity_score: f64,
    pub performance_score: f64,
    pub config: PopulationConfig,
    pub chromosome_counts: BTreeMap<ChromosomeStatus, usize>,
    pub latest_best_fitness: Option<f64>,
    pub latest_avg_fitness: Option<f64>,
}

impl PopulationStatusReport {
    pub fn count(&self, status: ChromosomeStatus) -> usize {
        self.chromosome_counts.get(&status).copied().unwrap_or(0)
    }
}

/// Operator-facing population CRUD.
pub struct PopulationManager {
    store: Arc<Store>,
    registry: Arc<GeneRegistry>,
    evolution: EvolutionConfig,
    locks: Arc<PopulationLocks>,
}

impl PopulationManager {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<GeneRegistry>,
        evolution: EvolutionConfig,
        locks: Arc<PopulationLocks>,
    ) -> Self {
        Self {
            store,
            registry,
            evolution,
            locks,
        }
    }

    /// Creates an `active` population at generation 0 with up to `max_size`
    /// seeded chromosomes awaiting evaluation.
    ///
    /// Every problem with the input is reported at once.
    pub fn create_population(
        &self,
        name: &str,
        symbol: &str,
        timeframe: &str,
        config: &PopulationConfig,
    ) -> Result<PopulationRecord> {
        let mut violations = Vec::new();
        if name.trim().is_empty() {
            violations.push("name must not be empty".to_string());
        }
        if symbol.trim().is_empty() {
            violations.push("symbol must not be empty".to_string());
        }
        if !TIMEFRAMES.contains(&timeframe) {
            violations.push(format!(
                "timeframe must be one of {} (got '{}')",
                TIMEFRAMES.join(", "),
                timeframe
            ));
        }
        violations.extend(config.violations());
        if !name.trim().is_empty() && self.store.with_conn(|conn| populations::find_by_name(conn, name))?.is_some() {
            violations.push(format!("a population named '{}' already exists", name));
        }
        if !violations.is_empty() {
            return Err(MarketDnaError::Validation(violations));
        }

        let shape = GenomeShape::from(&self.evolution);
        let (id, seeded) = self.store.with_tx(|tx| {
            let id = populations::insert(tx, name, symbol, timeframe, config)?;
            let mut rng = population_rng(self.evolution.seed, id, 0);
            let mut seeds: Vec<Chromosome> = seed_chromosomes(
                id,
                0,
                config.max_size as usize,
                &self.registry,
                &shape,
                &HashSet::new(),
                &mut rng,
            );
            for seed in seeds.iter_mut() {
                chromosomes::insert(tx, seed, &self.registry)?;
            }
            Ok((id, seeds.len()))
        })?;

        log::info!(
            "Created population {} '{}' ({} {}) with {} seeded chromosomes",
            id,
            name,
            symbol,
            timeframe,
            seeded
        );
        self.get_population(id)
    }

    pub fn get_population(&self, id: i64) -> Result<PopulationRecord> {
        self.store.with_conn(|conn| populations::require(conn, id))
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<PopulationRecord>> {
        self.store.with_conn(|conn| populations::find_by_name(conn, name))
    }

    pub fn list_populations(&self) -> Result<Vec<PopulationRecord>> {
        self.store.with_conn(populations::list)
    }

    pub fn get_status(&self, id: i64) -> Result<PopulationStatusReport> {
        self.store.with_conn(|conn| {
            let population = populations::require(conn, id)?;
            let counts = chromosomes::count_by_status(conn, id)?;
            let latest = history::latest(conn, id)?;
            Ok(PopulationStatusReport {
                id: population.id,
                name: population.name,
                status: population.status,
                current_generation: population.current_generation,
                diversity_score: population.diversity_score,
                performance_score: population.performance_score,
                config: population.config,
                chromosome_counts: counts,
                latest_best_fitness: latest.as_ref().map(|h| h.best_fitness),
                latest_avg_fitness: latest.as_ref().map(|h| h.avg_fitness),
            })
        })
    }

    pub fn pause(&self, id: i64) -> Result<()> {
        self.change_status(id, PopulationStatus::Paused)
    }

    pub fn resume(&self, id: i64) -> Result<()> {
        self.change_status(id, PopulationStatus::Active)
    }

    /// Soft retire. An archived population keeps its rows but never evolves again.
    pub fn archive(&self, id: i64) -> Result<()> {
        self.change_status(id, PopulationStatus::Archived)
    }

    fn change_status(&self, id: i64, status: PopulationStatus) -> Result<()> {
        self.locks.with(id, || {
            self.store.with_tx(|tx| {
                let population = populations::require(tx, id)?;
                if population.status == PopulationStatus::Archived && status != PopulationStatus::Archived {
                    return Err(MarketDnaError::InvalidState(format!(
                        "population {} is archived and cannot become {}",
                        id, status
                    )));
                }
                populations::set_status(tx, id, status)
            })
        })?;
        log::info!("Population {} is now {}", id, status);
        Ok(())
    }

    /// Hard delete of the population with its chromosomes, genes and history.
    pub fn delete_population(&self, id: i64) -> Result<()> {
        self.locks.with(id, || self.store.with_conn(|conn| populations::delete(conn, id)))?;
        log::info!("Deleted population {}", id);
        Ok(())
    }

    pub fn generation_history(&self, id: i64) -> Result<Vec<HistoryRecord>> {
        self.store.with_conn(|conn| {
            populations::require(conn, id)?;
            history::list(conn, id)
        })
    }

    pub fn best_chromosomes(&self, id: i64, limit: usize) -> Result<Vec<Chromosome>> {
        self.store.with_conn(|conn| {
            populations::require(conn, id)?;
            chromosomes::best(conn, id, limit)
        })
    }

    pub fn chromosomes(&self, id: i64, statuses: &[ChromosomeStatus]) -> Result<Vec<Chromosome>> {
        self.store.with_conn(|conn| {
            populations::require(conn, id)?;
            chromosomes::list(conn, id, statuses)
        })
    }

    pub fn get_chromosome(&self, chromosome_id: i64) -> Result<Chromosome> {
        self.store.with_conn(|conn| chromosomes::require(conn, chromosome_id))
    }
}
