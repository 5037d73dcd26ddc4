use crate::config::PopulationConfig;
use crate::types::PopulationStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A `populations` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationRecord {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub timeframe: String,
    /// Carries the exchange alongside the evolutionary knobs.
    pub config: PopulationConfig,
    pub current_generation: u32,
    pub status: PopulationStatus,
    pub diversity_score: f64,
    pub performance_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PopulationRecord {
    pub fn market_key(&self) -> crate::data::MarketDataKey {
        crate::data::MarketDataKey::new(&self.config.exchange, &self.symbol, &self.timeframe)
    }
}

/// An `evolution_history` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub population_id: i64,
    pub generation: u32,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub diversity_metric: f64,
    pub mutation_rate: f64,
    pub generation_stats: serde_json::Value,
    pub mutation_stats: serde_json::Value,
    pub selection_stats: serde_json::Value,
    pub performance_breakdown: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Values for a history row about to be appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewHistoryRecord {
    pub population_id: i64,
    pub generation: u32,
    pub best_fitness: f64,
    pub avg_fitness: f64,
    pub diversity_metric: f64,
    pub mutation_rate: f64,
    pub generation_stats: serde_json::Value,
    pub mutation_stats: serde_json::Value,
    pub selection_stats: serde_json::Value,
    pub performance_breakdown: serde_json::Value,
}
