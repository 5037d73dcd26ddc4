pub mod backtester;
pub mod fitness;
pub mod portfolio;

pub use backtester::{combine_signals, BacktestResult, Backtester, Deadline};
pub use fitness::{composite_fitness, EvaluationOutcome, EvaluationStatus, FitnessEvaluator};
pub use portfolio::Portfolio;
