use crate::{
    config::TradeManagementConfig,
    engines::evaluation::Portfolio,
    engines::metrics::MetricsEngine,
    error::{MarketDnaError, Result},
    types::Trade,
};
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Bars simulated between two deadline checks.
const DEADLINE_STRIDE: usize = 256;

/// Wall-clock budget of one evaluation, checked cooperatively.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires: Option<Instant>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires: Instant::now().checked_add(budget),
        }
    }

    pub fn unlimited() -> Self {
        Self { expires: None }
    }

    pub fn expired(&self) -> bool {
        self.expires.is_some_and(|at| Instant::now() >= at)
    }

    pub fn check(&self, stage: &str) -> Result<()> {
        if self.expired() {
            return Err(MarketDnaError::EvaluationFailure(format!(
                "evaluation timed out during {}",
                stage
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    pub metrics: HashMap<String, f64>,
}

pub struct Backtester {
    initial_capital: f64,
    rules: TradeManagementConfig,
    commission: f64,
    metrics: MetricsEngine,
}

impl Backtester {
    pub fn new(initial_capital: f64, rules: TradeManagementConfig, commission: f64) -> Self {
        Self {
            initial_capital,
            rules,
            commission,
            metrics: MetricsEngine::new(initial_capital),
        }
    }

    /// Replay a combined per-bar vote against closing prices.
    pub fn run(&self, signal: &[f64], prices: &[f64], deadline: &Deadline) -> Result<BacktestResult> {
        if signal.len() != prices.len() {
            return Err(MarketDnaError::EvaluationFailure(format!(
                "signal has {} bars but prices have {}",
                signal.len(),
                prices.len()
            )));
        }

        let mut portfolio = Portfolio::with_rules(self.initial_capital, self.rules.clone(), self.commission);

        for (i, (&s, &price)) in signal.iter().zip(prices).enumerate() {
            if i % DEADLINE_STRIDE == 0 {
                deadline.check("simulation")?;
            }
            let s = if s.is_finite() { s } else { 0.0 };
            portfolio.process_bar(i, s, price)?;
        }
        if let (Some(last), Some(&price)) = (prices.len().checked_sub(1), prices.last()) {
            portfolio.finish(last, price)?;
        }

        let metrics = self
            .metrics
            .calculate_all(portfolio.get_trades(), portfolio.get_equity_curve());

        Ok(BacktestResult {
            trades: portfolio.get_trades().to_vec(),
            equity_curve: portfolio.get_equity_curve().to_vec(),
            metrics,
        })
    }
}

/// Weighted vote `Σ wᵢsᵢ / Σ wᵢ` per bar. Non-finite votes count as zero.
pub fn combine_signals(components: &[(f64, &[f64])], len: usize) -> Vec<f64> {
    let total_weight: f64 = components.iter().map(|(w, _)| *w).sum();
    if components.is_empty() || total_weight <= 0.0 {
        return vec![0.0; len];
    }

    (0..len)
        .map(|i| {
            let weighted: f64 = components
                .iter()
                .map(|(w, series)| {
                    let s = series.get(i).copied().unwrap_or(0.0);
                    if s.is_finite() {
                        w * s
                    } else {
                        0.0
                    }
                })
                .sum();
            weighted / total_weight
        })
        .collect()
}
