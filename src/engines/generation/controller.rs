use crate::config::EvolutionConfig;
use crate::data::{MarketDataSource, MarketSeries};
use crate::engines::evaluation::{EvaluationOutcome, FitnessEvaluator};
use crate::engines::generation::{
    genome::Chromosome,
    mutation::{MutationStats, Mutator},
    operators::{population_rng, seed_chromosomes, GenomeShape},
    progress::ProgressCallback,
    reproduction::{breed, BreedingSettings, BreedingStats},
    selection::{select_survivors, SelectionStats, SurvivorSettings},
};
use crate::error::{MarketDnaError, Result};
use crate::genes::GeneRegistry;
use crate::population::PopulationLocks;
use crate::store::{chromosomes, history, populations, NewHistoryRecord, PopulationRecord, Store};
use crate::types::{ChromosomeStatus, PopulationStatus};
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

/// Where a population's cycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Idle,
    Seeding,
    Evaluating,
    Selecting,
    Reproducing,
    Mutating,
    Recording,
    /// Retrying the phase that just failed.
    Degraded,
    /// Operator stop; terminal until reset.
    Stopped,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Evaluating => "evaluating",
            Self::Selecting => "selecting",
            Self::Reproducing => "reproducing",
            Self::Mutating => "mutating",
            Self::Recording => "recording",
            Self::Degraded => "degraded",
            Self::Stopped => "stopped",
        }
    }

    fn is_working(&self) -> bool {
        !matches!(self, Self::Idle | Self::Degraded | Self::Stopped)
    }

    pub fn can_transition_to(&self, next: CyclePhase) -> bool {
        use CyclePhase::*;
        match (*self, next) {
            (Idle, Seeding) | (Idle, Evaluating) | (Idle, Stopped) => true,
            (Seeding, Evaluating)
            | (Evaluating, Selecting)
            | (Selecting, Reproducing)
            | (Reproducing, Mutating)
            | (Mutating, Recording)
            | (Recording, Idle) => true,
            (from, Degraded) => from.is_working(),
            (Degraded, to) => to.is_working(),
            _ => false,
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one completed generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub population_id: i64,
    pub generation: u32,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub diversity: f64,
    pub seeded: usize,
    pub evaluated: usize,
    pub evaluation_failures: usize,
    pub survivors: usize,
    pub retired: usize,
    pub offspring: usize,
    pub skipped_duplicates: usize,
    pub degraded_retries: u32,
    pub duration_ms: u64,
}

struct Selected {
    survivors: Vec<Chromosome>,
    retired: Vec<Chromosome>,
    stats: SelectionStats,
    known: HashSet<String>,
}

struct Recorded {
    offspring: usize,
    skipped_duplicates: usize,
}

/// Drives populations through
/// `idle → seeding → evaluating → selecting → reproducing → mutating → recording → idle`.
pub struct EvolutionController {
    store: Arc<Store>,
    market: Arc<dyn MarketDataSource>,
    registry: Arc<GeneRegistry>,
    evaluator: FitnessEvaluator,
    config: EvolutionConfig,
    locks: Arc<PopulationLocks>,
    phases: Mutex<HashMap<i64, CyclePhase>>,
}

impl EvolutionController {
    pub fn new(
        store: Arc<Store>,
        market: Arc<dyn MarketDataSource>,
        registry: Arc<GeneRegistry>,
        evaluator: FitnessEvaluator,
        config: EvolutionConfig,
        locks: Arc<PopulationLocks>,
    ) -> Self {
        Self {
            store,
            market,
            registry,
            evaluator,
            config,
            locks,
            phases: Mutex::new(HashMap::new()),
        }
    }

    pub fn phase(&self, population_id: i64) -> CyclePhase {
        let phases = self.phases.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        phases.get(&population_id).copied().unwrap_or(CyclePhase::Idle)
    }

    fn transition(&self, population_id: i64, next: CyclePhase) -> Result<()> {
        let mut phases = self.phases.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = phases.get(&population_id).copied().unwrap_or(CyclePhase::Idle);
        if !current.can_transition_to(next) {
            return Err(MarketDnaError::InvalidState(format!(
                "population {} cannot move from {} to {}",
                population_id, current, next
            )));
        }
        phases.insert(population_id, next);
        Ok(())
    }

    fn force_phase(&self, population_id: i64, phase: CyclePhase) {
        let mut phases = self.phases.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        phases.insert(population_id, phase);
    }

    /// Operator stop. Only an idle population can be stopped; a running
    /// cycle finishes its bookkeeping first.
    pub fn stop(&self, population_id: i64) -> Result<()> {
        self.locks.with(population_id, || self.transition(population_id, CyclePhase::Stopped))
    }

    /// Clears a stop so the population can evolve again.
    pub fn reset(&self, population_id: i64) {
        self.locks.with(population_id, || {
            if self.phase(population_id) == CyclePhase::Stopped {
                self.force_phase(population_id, CyclePhase::Idle);
            }
        })
    }

    /// Runs one full generation for an active population.
    ///
    /// Retryable failures degrade the phase and retry it with backoff. When
    /// retries run out, or the failure cannot be retried, the population is
    /// paused and `EvolutionHalted` is returned. Evaluations already saved
    /// stay; survivors, offspring and the history row land together or not
    /// at all.
    pub fn run_generation(
        &self,
        population_id: i64,
        callback: &mut dyn ProgressCallback,
    ) -> Result<GenerationSummary> {
        self.locks.with(population_id, || self.cycle(population_id, callback))
    }

    fn cycle(&self, population_id: i64, callback: &mut dyn ProgressCallback) -> Result<GenerationSummary> {
        let phase = self.phase(population_id);
        if phase != CyclePhase::Idle {
            return Err(MarketDnaError::InvalidState(format!(
                "population {} is {}, not idle",
                population_id, phase
            )));
        }
        let population = self.store.with_conn(|conn| populations::require(conn, population_id))?;
        if population.status != PopulationStatus::Active {
            return Err(MarketDnaError::InvalidState(format!(
                "population {} is {} and cannot evolve",
                population_id, population.status
            )));
        }

        let started = Instant::now();
        let generation = population.current_generation + 1;
        callback.on_generation_start(population_id, generation);
        let mut retries = 0u32;

        let seeded = if population.current_generation == 0 {
            self.run_phase(population_id, CyclePhase::Seeding, callback, &mut retries, || {
                self.seed(&population, &mut self.rng_for(population_id, generation, CyclePhase::Seeding))
            })?
        } else {
            0
        };

        let outcomes = self.run_phase(population_id, CyclePhase::Evaluating, callback, &mut retries, || {
            self.evaluate(&population)
        })?;
        let evaluated = outcomes.len();
        let evaluation_failures = outcomes.iter().filter(|o| o.is_failure()).count();
        for i in 0..evaluated {
            callback.on_chromosome_evaluated(population_id, i + 1, evaluated);
        }

        let selected = self.run_phase(population_id, CyclePhase::Selecting, callback, &mut retries, || {
            self.select(&population)
        })?;

        let count = (population.config.max_size as usize).saturating_sub(selected.survivors.len());
        let settings = self.breeding_settings(&population);
        let brood = self.run_phase(population_id, CyclePhase::Reproducing, callback, &mut retries, || {
            breed(
                population_id,
                &selected.survivors,
                count,
                &selected.known,
                &settings,
                &self.registry,
                &mut self.rng_for(population_id, generation, CyclePhase::Reproducing),
            )
        })?;
        let breeding_stats = brood.stats.clone();

        let mutator = Mutator::new(&self.registry, population.config.mutation_rate, self.config.max_weight_delta)
            .with_structural(self.config.structural_mutation_rate, settings.shape);
        let (offspring, mutation_stats) =
            self.run_phase(population_id, CyclePhase::Mutating, callback, &mut retries, || {
                let mut offspring = brood.offspring.clone();
                let mut rng = self.rng_for(population_id, generation, CyclePhase::Mutating);
                let stats = mutator.mutate_offspring(&mut offspring, &selected.known, &mut rng);
                Ok((offspring, stats))
            })?;

        let best_fitness = selected
            .survivors
            .iter()
            .map(Chromosome::fitness_or_zero)
            .fold(0.0, f64::max);
        let avg_fitness = if selected.survivors.is_empty() {
            0.0
        } else {
            selected.survivors.iter().map(Chromosome::fitness_or_zero).sum::<f64>() / selected.survivors.len() as f64
        };
        let diversity = selected.stats.diversity.clamp(0.0, 1.0);

        let recorded = self.run_phase(population_id, CyclePhase::Recording, callback, &mut retries, || {
            self.record(
                &population,
                generation,
                &selected,
                &offspring,
                HistoryStats {
                    best_fitness,
                    avg_fitness,
                    diversity,
                    seeded,
                    evaluated,
                    evaluation_failures,
                    breeding: &breeding_stats,
                    mutation: &mutation_stats,
                },
            )
        })?;
        self.transition(population_id, CyclePhase::Idle)?;
        callback.on_phase(population_id, CyclePhase::Idle);

        let summary = GenerationSummary {
            population_id,
            generation,
            best_fitness,
            avg_fitness,
            diversity,
            seeded,
            evaluated,
            evaluation_failures,
            survivors: selected.survivors.len(),
            retired: selected.retired.len(),
            offspring: recorded.offspring,
            skipped_duplicates: recorded.skipped_duplicates,
            degraded_retries: retries,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        callback.on_generation_complete(&summary);
        Ok(summary)
    }

    /// Generator for one phase. With a configured seed a retried phase
    /// replays exactly the same draws.
    fn rng_for(&self, population_id: i64, generation: u32, phase: CyclePhase) -> StdRng {
        population_rng(self.config.seed, population_id, (u64::from(generation) << 8) ^ phase as u64)
    }

    fn breeding_settings(&self, population: &PopulationRecord) -> BreedingSettings {
        BreedingSettings {
            selection_pressure: population.config.selection_pressure as usize,
            max_duplicate_retries: self.config.max_duplicate_retries,
            max_mate_attempts: self.config.max_mate_attempts,
            contribution_guided: self.config.contribution_guided,
            shape: GenomeShape::from(&self.config),
        }
    }

    /// Runs one phase, degrading and retrying on retryable failures.
    fn run_phase<T, F>(
        &self,
        population_id: i64,
        phase: CyclePhase,
        callback: &mut dyn ProgressCallback,
        retries: &mut u32,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        self.transition(population_id, phase)?;
        callback.on_phase(population_id, phase);

        let retry = &self.config.retry;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match op() {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !error.is_retryable() || attempt > retry.max_retries {
                return Err(self.halt(population_id, phase, attempt, error));
            }

            let delay = retry.delay_for(attempt);
            log::warn!(
                "Population {}: {} failed (attempt {}/{}), retrying in {:?}: {}",
                population_id,
                phase,
                attempt,
                retry.max_retries + 1,
                delay,
                error
            );
            self.transition(population_id, CyclePhase::Degraded)?;
            callback.on_phase(population_id, CyclePhase::Degraded);
            *retries += 1;
            thread::sleep(delay);
            self.transition(population_id, phase)?;
            callback.on_phase(population_id, phase);
        }
    }

    /// Pauses the population and reports the halt.
    fn halt(&self, population_id: i64, phase: CyclePhase, attempts: u32, error: MarketDnaError) -> MarketDnaError {
        log::error!(
            "Population {}: evolution halted during {} after {} attempt(s): {}",
            population_id,
            phase,
            attempts,
            error
        );
        if let Err(e) = self
            .store
            .with_conn(|conn| populations::set_status(conn, population_id, PopulationStatus::Paused))
        {
            log::error!("Population {}: could not pause after halt: {}", population_id, e);
        }
        self.force_phase(population_id, CyclePhase::Idle);
        MarketDnaError::EvolutionHalted {
            population_id,
            phase: phase.to_string(),
            attempts,
            reason: error.to_string(),
        }
    }

    /// Tops the population up to `max_size` with random founders.
    fn seed(&self, population: &PopulationRecord, rng: &mut StdRng) -> Result<usize> {
        self.store.with_tx(|tx| {
            let counts = chromosomes::count_by_status(tx, population.id)?;
            let live = counts.get(&ChromosomeStatus::Active).copied().unwrap_or(0)
                + counts.get(&ChromosomeStatus::Testing).copied().unwrap_or(0);
            let missing = (population.config.max_size as usize).saturating_sub(live);
            if missing == 0 {
                return Ok(0);
            }

            let known = chromosomes::fingerprints(tx, population.id)?;
            let shape = GenomeShape::from(&self.config);
            let mut seeds = seed_chromosomes(population.id, 0, missing, &self.registry, &shape, &known, rng);
            for seed in seeds.iter_mut() {
                chromosomes::insert(tx, seed, &self.registry)?;
            }
            log::info!("Population {}: seeded {} chromosomes", population.id, seeds.len());
            Ok(seeds.len())
        })
    }

    /// Scores every chromosome still waiting for a fitness and persists the results.
    fn evaluate(&self, population: &PopulationRecord) -> Result<Vec<EvaluationOutcome>> {
        let mut pending: Vec<Chromosome> = self
            .store
            .with_conn(|conn| chromosomes::list(conn, population.id, &[ChromosomeStatus::Testing, ChromosomeStatus::Active]))?
            .into_iter()
            .filter(|c| c.status == ChromosomeStatus::Testing || c.fitness.is_none())
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let series: Arc<MarketSeries> = self.market.load(&population.market_key())?;
        let outcomes = self.evaluator.evaluate_batch(&pending, &series);

        for (chromosome, outcome) in pending.iter_mut().zip(&outcomes) {
            outcome.apply_to(chromosome);
            if let Some(error) = &outcome.error {
                log::warn!(
                    "Population {}: chromosome {:?} evaluation failed: {}",
                    population.id,
                    chromosome.id,
                    error
                );
            }
        }
        self.store.with_tx(|tx| {
            for chromosome in &pending {
                chromosomes::save_evaluation(tx, chromosome)?;
            }
            Ok(())
        })?;
        Ok(outcomes)
    }

    fn select(&self, population: &PopulationRecord) -> Result<Selected> {
        let (evaluated, known) = self.store.with_conn(|conn| {
            Ok((
                chromosomes::list(conn, population.id, &[ChromosomeStatus::Active])?,
                chromosomes::fingerprints(conn, population.id)?,
            ))
        })?;

        let max_size = population.config.max_size as usize;
        let quota = (max_size as f64 * self.config.replacement_rate).ceil() as usize;
        let keep = max_size.saturating_sub(quota).max(2).min(max_size);
        let settings = SurvivorSettings {
            keep,
            diversity_fraction: self.config.diversity_fraction,
            diversity_threshold: population.config.diversity_threshold,
        };
        let selection = select_survivors(evaluated, &settings, &self.registry);
        if !selection.stats.threshold_met && selection.survivors.len() > 1 {
            log::info!(
                "Population {}: survivor diversity {:.3} stays under threshold {:.3}",
                population.id,
                selection.stats.diversity,
                population.config.diversity_threshold
            );
        }
        Ok(Selected {
            survivors: selection.survivors,
            retired: selection.retired,
            stats: selection.stats,
            known,
        })
    }

    /// One transaction: archive the retired, age the survivors, insert the
    /// offspring and append the history row.
    fn record(
        &self,
        population: &PopulationRecord,
        generation: u32,
        selected: &Selected,
        offspring: &[Chromosome],
        stats: HistoryStats<'_>,
    ) -> Result<Recorded> {
        let retired: Vec<i64> = selected.retired.iter().filter_map(|c| c.id).collect();
        let survivors: Vec<i64> = selected.survivors.iter().filter_map(|c| c.id).collect();

        self.store.with_tx(|tx| {
            chromosomes::set_status(tx, &retired, ChromosomeStatus::Archived)?;
            chromosomes::increment_age(tx, &survivors)?;

            let mut inserted = 0;
            let mut skipped = 0;
            let mut batch: HashSet<(u32, String)> = HashSet::new();
            for child in offspring {
                let key = (child.generation, child.fingerprint.clone());
                if batch.contains(&key)
                    || chromosomes::exists_in_generation(tx, population.id, child.generation, &child.fingerprint)?
                {
                    log::warn!(
                        "Population {}: skipping duplicate offspring {} in generation {}",
                        population.id,
                        child.fingerprint,
                        child.generation
                    );
                    skipped += 1;
                    continue;
                }
                let mut child = child.clone();
                chromosomes::insert(tx, &mut child, &self.registry)?;
                batch.insert(key);
                inserted += 1;
            }

            history::insert(
                tx,
                &NewHistoryRecord {
                    population_id: population.id,
                    generation,
                    best_fitness: stats.best_fitness,
                    avg_fitness: stats.avg_fitness,
                    diversity_metric: stats.diversity,
                    mutation_rate: population.config.mutation_rate,
                    generation_stats: serde_json::json!({
                        "seeded": stats.seeded,
                        "evaluated": stats.evaluated,
                        "evaluation_failures": stats.evaluation_failures,
                        "survivors": survivors.len(),
                        "retired": retired.len(),
                        "offspring": inserted,
                        "skipped_duplicates": skipped,
                    }),
                    mutation_stats: serde_json::to_value(stats.mutation)?,
                    selection_stats: serde_json::to_value(&selected.stats)?,
                    performance_breakdown: performance_breakdown(&selected.survivors, stats.breeding)?,
                },
            )?;

            Ok(Recorded {
                offspring: inserted,
                skipped_duplicates: skipped,
            })
        })
    }
}

struct HistoryStats<'a> {
    best_fitness: f64,
    avg_fitness: f64,
    diversity: f64,
    seeded: usize,
    evaluated: usize,
    evaluation_failures: usize,
    breeding: &'a BreedingStats,
    mutation: &'a MutationStats,
}

/// Best survivor's metrics, mean contribution per gene type and breeding counters.
fn performance_breakdown(survivors: &[Chromosome], breeding: &BreedingStats) -> Result<serde_json::Value> {
    let mut contributions: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for gene in survivors.iter().flat_map(|c| c.genes.iter()) {
        let entry = contributions.entry(gene.gene_type.as_str()).or_insert((0.0, 0));
        entry.0 += gene.performance_contribution;
        entry.1 += 1;
    }
    let mean_contribution: BTreeMap<&str, f64> = contributions
        .into_iter()
        .map(|(gene_type, (sum, n))| (gene_type, sum / n as f64))
        .collect();

    let best = survivors.first();
    Ok(serde_json::json!({
        "best_chromosome_id": best.and_then(|c| c.id),
        "best_metrics": best.map(|c| c.performance_metrics.clone()),
        "gene_contributions": mean_contribution,
        "breeding": serde_json::to_value(breeding)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_follow_the_cycle() {
        use CyclePhase::*;
        let cycle = [Idle, Seeding, Evaluating, Selecting, Reproducing, Mutating, Recording, Idle];
        for pair in cycle.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Idle.can_transition_to(Evaluating));
        assert!(!Seeding.can_transition_to(Selecting));
        assert!(!Recording.can_transition_to(Evaluating));
    }

    #[test]
    fn degraded_only_returns_to_work() {
        use CyclePhase::*;
        assert!(Evaluating.can_transition_to(Degraded));
        assert!(Degraded.can_transition_to(Evaluating));
        assert!(!Idle.can_transition_to(Degraded));
        assert!(!Degraded.can_transition_to(Idle));
    }

    #[test]
    fn stopped_is_terminal() {
        use CyclePhase::*;
        assert!(Idle.can_transition_to(Stopped));
        for next in [Idle, Seeding, Evaluating, Degraded] {
            assert!(!Stopped.can_transition_to(next));
        }
    }
}
