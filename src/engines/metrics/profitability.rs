// src/engines/metrics/profitability.rs
use crate::types::*;
use std::collections::HashMap;

pub struct ProfitabilityMetrics;

impl ProfitabilityMetrics {
    /// Trade-level metrics. Ratios are fractions, not percentages.
    pub fn calculate(trades: &[Trade], initial_balance: f64) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();
        metrics.insert("num_trades".to_string(), trades.len() as f64);

        if trades.is_empty() {
            return metrics;
        }

        let total_profit: f64 = trades.iter().map(|t| t.profit).sum();
        let winning_trades: Vec<&Trade> = trades.iter().filter(|t| t.profit > 0.0).collect();
        let losing_trades: Vec<&Trade> = trades.iter().filter(|t| t.profit <= 0.0).collect();

        metrics.insert("total_return".to_string(), total_profit / initial_balance);

        let win_rate = winning_trades.len() as f64 / trades.len() as f64;
        metrics.insert("win_rate".to_string(), win_rate);

        // Average win/loss
        if !winning_trades.is_empty() {
            let avg_win: f64 = winning_trades.iter().map(|t| t.profit).sum::<f64>()
                / winning_trades.len() as f64;
            metrics.insert("avg_win".to_string(), avg_win);
        }

        if !losing_trades.is_empty() {
            let avg_loss: f64 = losing_trades.iter().map(|t| t.profit.abs()).sum::<f64>()
                / losing_trades.len() as f64;
            metrics.insert("avg_loss".to_string(), avg_loss);
        }

        // Profit factor
        let gross_profit: f64 = winning_trades.iter().map(|t| t.profit).sum();
        let gross_loss: f64 = losing_trades.iter().map(|t| t.profit.abs()).sum();
        if gross_loss > 0.0 {
            metrics.insert("profit_factor".to_string(), gross_profit / gross_loss);
        }

        // Sharpe-like ratio over per-trade returns
        let returns: Vec<f64> = trades.iter().map(Trade::return_fraction).collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let std = super::risk::RiskMetrics::std_dev(&returns);
        let trade_sharpe = if std > 0.0 {
            mean / std
        } else if mean > 0.0 {
            // Identical positive trades: treat as one deviation of edge.
            1.0
        } else {
            0.0
        };
        metrics.insert("trade_sharpe".to_string(), trade_sharpe);

        metrics
    }
}
