pub mod controller;
pub mod diversity;
pub mod genome;
pub mod mutation;
pub mod operators;
pub mod progress;
pub mod reproduction;
pub mod selection;

pub use controller::{CyclePhase, EvolutionController, GenerationSummary};
pub use genome::{fingerprint, Chromosome, Gene, Genome, MutationRecord};
pub use mutation::{MutationStats, Mutator};
pub use operators::{random_genome, seed_chromosomes, GenomeShape};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, ProgressCallback, ProgressMessage};
pub use reproduction::{breed, crossover, BreedingSettings, Brood};
pub use selection::{select_survivors, tournament_selection, SurvivorSelection, SurvivorSettings};
