// src/engines/metrics/risk.rs
use std::collections::HashMap;

pub struct RiskMetrics;

impl RiskMetrics {
    /// Equity-curve metrics. Drawdown is a fraction of the running peak.
    pub fn calculate(equity_curve: &[f64]) -> HashMap<String, f64> {
        let mut metrics = HashMap::new();

        if equity_curve.len() < 2 {
            return metrics;
        }

        metrics.insert("max_drawdown".to_string(), Self::max_drawdown(equity_curve));

        // Volatility (std dev of returns)
        let returns = Self::calculate_returns(equity_curve);
        let volatility = Self::std_dev(&returns);
        metrics.insert("volatility".to_string(), volatility);

        // Sharpe ratio (assuming risk-free rate = 0)
        let avg_return = returns.iter().sum::<f64>() / returns.len() as f64;
        if volatility > 0.0 {
            metrics.insert("sharpe_ratio".to_string(), avg_return / volatility);
        }

        // Sortino ratio (downside deviation)
        let downside_returns: Vec<f64> = returns.iter().filter(|&&r| r < 0.0).copied().collect();
        if !downside_returns.is_empty() {
            let downside_dev = Self::std_dev(&downside_returns);
            if downside_dev > 0.0 {
                metrics.insert("sortino_ratio".to_string(), avg_return / downside_dev);
            }
        }

        metrics
    }

    pub fn max_drawdown(equity: &[f64]) -> f64 {
        let mut max_dd = 0.0;
        let mut peak = equity[0];

        for &value in equity.iter() {
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                let dd = (peak - value) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }

        max_dd
    }

    fn calculate_returns(equity: &[f64]) -> Vec<f64> {
        equity
            .windows(2)
            .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
            .collect()
    }

    pub fn std_dev(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

        variance.sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_is_fractional() {
        let dd = RiskMetrics::max_drawdown(&[100.0, 120.0, 90.0, 130.0]);
        assert!((dd - 0.25).abs() < 1e-12);
    }

    #[test]
    fn flat_curve_has_no_sharpe() {
        let metrics = RiskMetrics::calculate(&[100.0, 100.0, 100.0]);
        assert_eq!(metrics["max_drawdown"], 0.0);
        assert!(!metrics.contains_key("sharpe_ratio"));
    }
}
