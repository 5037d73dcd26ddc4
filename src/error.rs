use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDnaError {
    /// Every violated constraint is listed, not just the first.
    #[error("Validation error: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Lineage error: {0}")]
    Lineage(String),

    #[error("Evaluation failure: {0}")]
    EvaluationFailure(String),

    #[error("Evolution halted for population {population_id} during {phase} after {attempts} attempt(s): {reason}")]
    EvolutionHalted {
        population_id: i64,
        phase: String,
        attempts: u32,
        reason: String,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Data loading error: {0}")]
    DataLoading(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MarketDnaError {
    /// Failures of the surrounding infrastructure that may clear up on their own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Io(_) | Self::DataLoading(_) | Self::Polars(_)
        )
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type Result<T> = std::result::Result<T, MarketDnaError>;
