use super::traits::{check_range, ConfigSection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestingConfig {
    pub initial_capital: f64,
    /// Fraction of traded notional charged on entry and on exit.
    pub commission: f64,
    pub evaluation_timeout_ms: u64,
    /// Size of the evaluation pool; 0 uses every available core.
    pub workers: usize,
    /// Run the per-gene ablation pass after scoring a chromosome.
    pub compute_contributions: bool,
    pub fitness_weights: FitnessWeights,
}

impl Default for BacktestingConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10000.0,
            commission: 0.0,
            evaluation_timeout_ms: 5000,
            workers: 0,
            compute_contributions: true,
            fitness_weights: FitnessWeights::default(),
        }
    }
}

impl ConfigSection for BacktestingConfig {
    fn section_name() -> &'static str {
        "backtesting"
    }

    fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if !(self.initial_capital > 0.0) {
            violations.push("initial_capital must be positive".to_string());
        }
        check_range(&mut violations, "commission", self.commission, 0.0, 0.05);
        if self.evaluation_timeout_ms == 0 {
            violations.push("evaluation_timeout_ms must be positive".to_string());
        }
        violations.extend(self.fitness_weights.violations());
        violations
    }
}

/// Weights of the normalized metrics in the composite fitness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessWeights {
    pub sharpe: f64,
    pub total_return: f64,
    pub drawdown: f64,
    pub win_rate: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            sharpe: 0.4,
            total_return: 0.2,
            drawdown: 0.2,
            win_rate: 0.2,
        }
    }
}

impl FitnessWeights {
    pub fn total(&self) -> f64 {
        self.sharpe + self.total_return + self.drawdown + self.win_rate
    }

    fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        for (name, value) in [
            ("fitness_weights.sharpe", self.sharpe),
            ("fitness_weights.total_return", self.total_return),
            ("fitness_weights.drawdown", self.drawdown),
            ("fitness_weights.win_rate", self.win_rate),
        ] {
            if !(value >= 0.0) {
                violations.push(format!("{} must not be negative", name));
            }
        }
        if !(self.total() > 0.0) {
            violations.push("fitness weights must not all be zero".to_string());
        }
        violations
    }
}
