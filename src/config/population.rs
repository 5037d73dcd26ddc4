use super::traits::{check_range, ConfigSection};
use serde::{Deserialize, Serialize};

pub const MAX_SIZE_RANGE: (u32, u32) = (50, 500);
pub const MUTATION_RATE_RANGE: (f64, f64) = (0.001, 0.05);
pub const SELECTION_PRESSURE_RANGE: (u32, u32) = (1, 10);
pub const GENERATION_INTERVAL_RANGE: (u32, u32) = (1, 24);
pub const DIVERSITY_THRESHOLD_RANGE: (f64, f64) = (0.5, 1.0);

pub const TIMEFRAMES: [&str; 8] = ["1m", "5m", "15m", "30m", "1h", "4h", "1d", "1w"];

/// The evolutionary configuration carried by every population row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub exchange: String,
    pub max_size: u32,
    pub mutation_rate: f64,
    pub selection_pressure: u32,
    /// Hours between two generations when evolving in the background.
    pub generation_interval: u32,
    pub diversity_threshold: f64,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            exchange: "binance".to_string(),
            max_size: 100,
            mutation_rate: 0.01,
            selection_pressure: 5,
            generation_interval: 4,
            diversity_threshold: 0.7,
        }
    }
}

impl ConfigSection for PopulationConfig {
    fn section_name() -> &'static str {
        "population"
    }

    fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.exchange.trim().is_empty() {
            violations.push("exchange must not be empty".to_string());
        }
        check_range(&mut violations, "max_size", self.max_size, MAX_SIZE_RANGE.0, MAX_SIZE_RANGE.1);
        check_range(
            &mut violations,
            "mutation_rate",
            self.mutation_rate,
            MUTATION_RATE_RANGE.0,
            MUTATION_RATE_RANGE.1,
        );
        check_range(
            &mut violations,
            "selection_pressure",
            self.selection_pressure,
            SELECTION_PRESSURE_RANGE.0,
            SELECTION_PRESSURE_RANGE.1,
        );
        check_range(
            &mut violations,
            "generation_interval",
            self.generation_interval,
            GENERATION_INTERVAL_RANGE.0,
            GENERATION_INTERVAL_RANGE.1,
        );
        check_range(
            &mut violations,
            "diversity_threshold",
            self.diversity_threshold,
            DIVERSITY_THRESHOLD_RANGE.0,
            DIVERSITY_THRESHOLD_RANGE.1,
        );
        violations
    }
}

/// A population the binary makes sure exists at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSpec {
    pub name: String,
    pub symbol: String,
    pub timeframe: String,
    #[serde(default)]
    pub config: Option<PopulationConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PopulationConfig::default().violations().is_empty());
    }

    #[test]
    fn every_out_of_bound_field_is_reported() {
        let config = PopulationConfig {
            exchange: "binance".to_string(),
            max_size: 10,
            mutation_rate: 0.5,
            selection_pressure: 0,
            generation_interval: 48,
            diversity_threshold: 0.2,
        };
        let violations = config.violations();
        assert_eq!(violations.len(), 5);
        for field in [
            "max_size",
            "mutation_rate",
            "selection_pressure",
            "generation_interval",
            "diversity_threshold",
        ] {
            assert!(violations.iter().any(|v| v.starts_with(field)), "missing {}", field);
        }
    }

    #[test]
    fn nan_mutation_rate_is_rejected() {
        let config = PopulationConfig {
            mutation_rate: f64::NAN,
            ..Default::default()
        };
        assert_eq!(config.violations().len(), 1);
    }
}
