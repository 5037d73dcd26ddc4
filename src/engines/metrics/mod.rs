pub mod profitability;
pub mod risk;
pub mod engine;

pub use profitability::ProfitabilityMetrics;
pub use risk::RiskMetrics;
pub use engine::MetricsEngine;
