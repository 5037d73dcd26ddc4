use super::traits::{check_range, ConfigSection};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide settings of the generation cycle. Per-population knobs
/// (mutation rate, selection pressure, ...) live in `PopulationConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Share of `max_size` replaced by offspring every generation.
    pub replacement_rate: f64,
    /// Share of the survivor slots reserved for structurally distinct chromosomes.
    pub diversity_fraction: f64,
    pub min_genes: usize,
    pub max_genes: usize,
    pub seed_weight_min: f64,
    pub seed_weight_max: f64,
    pub max_weight_delta: f64,
    /// Chance per offspring of gaining or losing a whole gene.
    pub structural_mutation_rate: f64,
    pub max_duplicate_retries: usize,
    pub max_mate_attempts: usize,
    /// Favour genes with a larger ablation contribution during crossover.
    pub contribution_guided: bool,
    pub seed: Option<u64>,
    pub retry: RetryConfig,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            replacement_rate: 0.5,
            diversity_fraction: 0.2,
            min_genes: 2,
            max_genes: 5,
            seed_weight_min: 0.5,
            seed_weight_max: 2.0,
            max_weight_delta: 0.5,
            structural_mutation_rate: 0.1,
            max_duplicate_retries: 5,
            max_mate_attempts: 3,
            contribution_guided: false,
            seed: None,
            retry: RetryConfig::default(),
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        check_range(&mut violations, "replacement_rate", self.replacement_rate, 0.01, 0.9);
        check_range(&mut violations, "diversity_fraction", self.diversity_fraction, 0.0, 0.5);
        if self.min_genes == 0 || self.min_genes > self.max_genes {
            violations.push(format!(
                "min_genes must be at least 1 and not exceed max_genes (got {}..{})",
                self.min_genes, self.max_genes
            ));
        }
        check_range(&mut violations, "seed_weight_min", self.seed_weight_min, 0.1, 5.0);
        check_range(&mut violations, "seed_weight_max", self.seed_weight_max, 0.1, 5.0);
        if self.seed_weight_min > self.seed_weight_max {
            violations.push("seed_weight_min must not exceed seed_weight_max".to_string());
        }
        check_range(&mut violations, "max_weight_delta", self.max_weight_delta, 0.0, 4.9);
        check_range(&mut violations, "structural_mutation_rate", self.structural_mutation_rate, 0.0, 1.0);
        violations.extend(self.retry.violations());
        violations
    }
}

/// Backoff applied while a cycle phase is degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.initial_delay_ms > self.max_delay_ms {
            violations.push("retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string());
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(5), Duration::from_millis(1600));
        assert_eq!(retry.delay_for(6), Duration::from_millis(2000));
        assert_eq!(retry.delay_for(40), Duration::from_millis(2000));
    }

    #[test]
    fn gene_bounds_are_checked() {
        let config = EvolutionConfig {
            min_genes: 4,
            max_genes: 2,
            ..Default::default()
        };
        assert_eq!(config.violations().len(), 1);
    }

    #[test]
    fn structural_rate_is_a_probability() {
        let config = EvolutionConfig {
            structural_mutation_rate: 1.5,
            ..Default::default()
        };
        assert_eq!(config.violations().len(), 1);
        assert!(EvolutionConfig::default().violations().is_empty());
    }
}
