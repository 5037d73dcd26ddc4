pub mod locks;
pub mod manager;
pub mod service;

pub use locks::PopulationLocks;
pub use manager::{PopulationManager, PopulationStatusReport};
pub use service::{EvolutionService, RunOptions, RunReport};
