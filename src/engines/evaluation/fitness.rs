use crate::config::{BacktestingConfig, FitnessWeights, TradeManagementConfig};
use crate::data::{IndicatorCache, MarketSeries};
use crate::engines::evaluation::backtester::{combine_signals, Backtester, Deadline};
use crate::engines::generation::genome::{canonical_params, Chromosome, Gene};
use crate::error::{MarketDnaError, Result};
use crate::genes::GeneRegistry;
use crate::types::ChromosomeStatus;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Signal series memoized per evaluation pass.
const CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Evaluated,
    EvaluationFailed,
}

impl EvaluationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluated => "evaluated",
            Self::EvaluationFailed => "evaluation_failed",
        }
    }
}

/// Score of one chromosome. A failed evaluation carries fitness 0 and the error text.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
    pub fitness: f64,
    pub status: EvaluationStatus,
    pub metrics: BTreeMap<String, f64>,
    /// Ablation contribution per gene, index-aligned with the chromosome's genes.
    pub contributions: Vec<f64>,
    pub error: Option<String>,
    pub trades: usize,
    pub duration_ms: u64,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationOutcome {
    fn failed(error: String, started: Instant) -> Self {
        Self {
            fitness: 0.0,
            status: EvaluationStatus::EvaluationFailed,
            metrics: BTreeMap::new(),
            contributions: Vec::new(),
            error: Some(error),
            trades: 0,
            duration_ms: started.elapsed().as_millis() as u64,
            evaluated_at: Utc::now(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == EvaluationStatus::EvaluationFailed
    }

    /// Write the score onto the chromosome. Evaluated chromosomes, failed or
    /// not, become eligible for selection.
    pub fn apply_to(&self, chromosome: &mut Chromosome) {
        chromosome.fitness = Some(self.fitness);
        chromosome.status = ChromosomeStatus::Active;
        chromosome.last_test_date = Some(self.evaluated_at);
        chromosome.performance_metrics = serde_json::json!(self.metrics);
        chromosome.test_results = serde_json::json!({
            "status": self.status.as_str(),
            "error": self.error,
            "trades": self.trades,
            "duration_ms": self.duration_ms,
        });
        for (gene, contribution) in chromosome.genes.iter_mut().zip(&self.contributions) {
            gene.performance_contribution = *contribution;
        }
    }
}

/// Maps a metric onto `[0, 1]` before weighting.
fn squash(value: f64, scale: f64) -> f64 {
    ((value * scale).tanh() + 1.0) / 2.0
}

/// Weighted mean of the normalized metrics, in `[0, 1]`. No trades scores 0.
pub fn composite_fitness(metrics: &HashMap<String, f64>, weights: &FitnessWeights) -> f64 {
    let trades = metrics.get("num_trades").copied().unwrap_or(0.0);
    let total = weights.total();
    if trades < 1.0 || total <= 0.0 {
        return 0.0;
    }
    let metric = |name: &str| metrics.get(name).copied().filter(|v| v.is_finite()).unwrap_or(0.0);

    let sharpe = squash(metric("trade_sharpe"), 1.0);
    let total_return = squash(metric("total_return"), 10.0);
    let drawdown = (1.0 - metric("max_drawdown")).clamp(0.0, 1.0);
    let win_rate = metric("win_rate").clamp(0.0, 1.0);

    let score = (weights.sharpe * sharpe
        + weights.total_return * total_return
        + weights.drawdown * drawdown
        + weights.win_rate * win_rate)
        / total;

    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Scores chromosomes by replaying their weighted gene votes over market data.
pub struct FitnessEvaluator {
    registry: Arc<GeneRegistry>,
    config: BacktestingConfig,
    backtester: Backtester,
    pool: rayon::ThreadPool,
}

impl FitnessEvaluator {
    pub fn new(
        registry: Arc<GeneRegistry>,
        config: BacktestingConfig,
        rules: TradeManagementConfig,
    ) -> Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("fitness-{}", i));
        if config.workers > 0 {
            builder = builder.num_threads(config.workers);
        }
        let pool = builder
            .build()
            .map_err(|e| MarketDnaError::Configuration(format!("cannot build evaluation pool: {}", e)))?;

        let backtester = Backtester::new(config.initial_capital, rules, config.commission);
        Ok(Self {
            registry,
            config,
            backtester,
            pool,
        })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(Duration::from_millis(self.config.evaluation_timeout_ms))
    }

    /// Evaluate every chromosome on the worker pool. Outcomes are index-aligned
    /// with the input; a failure in one never affects the others.
    pub fn evaluate_batch(&self, chromosomes: &[Chromosome], series: &MarketSeries) -> Vec<EvaluationOutcome> {
        let cache = IndicatorCache::new(CACHE_CAPACITY);
        self.pool.install(|| {
            chromosomes
                .par_iter()
                .map(|chromosome| self.evaluate_with(chromosome, series, &cache))
                .collect()
        })
    }

    pub fn evaluate(&self, chromosome: &Chromosome, series: &MarketSeries) -> EvaluationOutcome {
        let cache = IndicatorCache::new(CACHE_CAPACITY);
        self.evaluate_with(chromosome, series, &cache)
    }

    fn evaluate_with(&self, chromosome: &Chromosome, series: &MarketSeries, cache: &IndicatorCache) -> EvaluationOutcome {
        let started = Instant::now();
        let deadline = self.deadline();

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.score(chromosome, series, cache, &deadline)));
        match result {
            Ok(Ok(mut outcome)) => {
                outcome.duration_ms = started.elapsed().as_millis() as u64;
                outcome
            }
            Ok(Err(e)) => {
                log::debug!("Chromosome {:?} failed evaluation: {}", chromosome.id, e);
                EvaluationOutcome::failed(e.to_string(), started)
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::warn!("Chromosome {:?} panicked during evaluation: {}", chromosome.id, message);
                EvaluationOutcome::failed(format!("signal function panicked: {}", message), started)
            }
        }
    }

    fn score(
        &self,
        chromosome: &Chromosome,
        series: &MarketSeries,
        cache: &IndicatorCache,
        deadline: &Deadline,
    ) -> Result<EvaluationOutcome> {
        let active: Vec<usize> = chromosome
            .genes
            .iter()
            .enumerate()
            .filter(|(_, g)| g.is_active)
            .map(|(i, _)| i)
            .collect();
        if active.is_empty() {
            return Err(MarketDnaError::EvaluationFailure("chromosome has no active genes".to_string()));
        }

        let mut signals: HashMap<usize, Arc<Vec<f64>>> = HashMap::new();
        for &i in &active {
            deadline.check("signal generation")?;
            signals.insert(i, self.gene_signals(&chromosome.genes[i], series, cache)?);
        }

        let (fitness, metrics) = self.simulate(chromosome, &active, &signals, series, deadline)?;

        let mut contributions = vec![0.0; chromosome.genes.len()];
        if self.config.compute_contributions && fitness > 0.0 {
            for &skip in &active {
                let rest: Vec<usize> = active.iter().copied().filter(|&i| i != skip).collect();
                let ablated = if rest.is_empty() {
                    Ok(0.0)
                } else {
                    self.simulate(chromosome, &rest, &signals, series, deadline).map(|(f, _)| f)
                };
                match ablated {
                    Ok(ablated) => contributions[skip] = fitness - ablated,
                    Err(e) => {
                        log::debug!("Ablation of chromosome {:?} stopped early: {}", chromosome.id, e);
                        break;
                    }
                }
            }
        }

        let trades = metrics.get("num_trades").copied().unwrap_or(0.0) as usize;
        Ok(EvaluationOutcome {
            fitness,
            status: EvaluationStatus::Evaluated,
            metrics: metrics.into_iter().filter(|(_, v)| v.is_finite()).collect(),
            contributions,
            error: None,
            trades,
            duration_ms: 0,
            evaluated_at: Utc::now(),
        })
    }

    fn simulate(
        &self,
        chromosome: &Chromosome,
        genes: &[usize],
        signals: &HashMap<usize, Arc<Vec<f64>>>,
        series: &MarketSeries,
        deadline: &Deadline,
    ) -> Result<(f64, HashMap<String, f64>)> {
        let components: Vec<(f64, &[f64])> = genes
            .iter()
            .filter_map(|i| signals.get(i).map(|s| (chromosome.genes[*i].weight, s.as_slice())))
            .collect();
        let combined = combine_signals(&components, series.len());
        let result = self.backtester.run(&combined, &series.close, deadline)?;
        let fitness = composite_fitness(&result.metrics, &self.config.fitness_weights);
        Ok((fitness, result.metrics))
    }

    fn gene_signals(&self, gene: &Gene, series: &MarketSeries, cache: &IndicatorCache) -> Result<Arc<Vec<f64>>> {
        let key = format!("{}|{}", gene.gene_type, canonical_params(&gene.params));
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }

        let kind = self.registry.get(&gene.gene_type).ok_or_else(|| {
            MarketDnaError::EvaluationFailure(format!("unknown gene type '{}'", gene.gene_type))
        })?;
        let problems = kind.validate(&gene.params);
        if !problems.is_empty() {
            return Err(MarketDnaError::EvaluationFailure(problems.join("; ")));
        }

        let values = Arc::new(kind.signals(series, &gene.params)?);
        if values.len() != series.len() {
            return Err(MarketDnaError::EvaluationFailure(format!(
                "{} produced {} signals for {} bars",
                gene.gene_type,
                values.len(),
                series.len()
            )));
        }
        cache.set(key, values.clone());
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn no_trades_scores_zero() {
        let m = metrics(&[("num_trades", 0.0), ("max_drawdown", 0.0)]);
        assert_eq!(composite_fitness(&m, &FitnessWeights::default()), 0.0);
    }

    #[test]
    fn neutral_metrics_score_the_midpoint() {
        // Sharpe and return squash to 0.5, no drawdown scores 1, half the trades won.
        let m = metrics(&[
            ("num_trades", 4.0),
            ("trade_sharpe", 0.0),
            ("total_return", 0.0),
            ("max_drawdown", 0.0),
            ("win_rate", 0.5),
        ]);
        let fitness = composite_fitness(&m, &FitnessWeights::default());
        assert!((fitness - 0.6).abs() < 1e-12);
    }

    #[test]
    fn non_finite_metrics_do_not_leak() {
        let m = metrics(&[("num_trades", 1.0), ("trade_sharpe", f64::NAN), ("win_rate", 1.0)]);
        let fitness = composite_fitness(&m, &FitnessWeights::default());
        assert!(fitness.is_finite());
        assert!((0.0..=1.0).contains(&fitness));
    }
}
