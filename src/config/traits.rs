use crate::error::{MarketDnaError, Result};
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;

    /// Every constraint the section currently violates.
    fn violations(&self) -> Vec<String>;

    fn validate(&self) -> Result<()> {
        let violations = self.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(MarketDnaError::Validation(violations))
        }
    }
}

/// Pushes a message when `value` falls outside `[min, max]`.
pub(crate) fn check_range<T>(violations: &mut Vec<String>, field: &str, value: T, min: T, max: T)
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if !(value >= min && value <= max) {
        violations.push(format!(
            "{} must be between {} and {} (got {})",
            field, min, max, value
        ));
    }
}
