pub mod indicators;
pub mod primitives;
pub mod registry;
pub mod traits;

pub use registry::GeneRegistry;
pub use traits::{random_params, GeneKind, GeneParams, ParamKind, ParamSpec};

/// Bounds every persisted gene weight must respect.
pub const MIN_WEIGHT: f64 = 0.1;
pub const MAX_WEIGHT: f64 = 5.0;
