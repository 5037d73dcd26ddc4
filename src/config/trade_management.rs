use super::traits::{check_range, ConfigSection};
use serde::{Deserialize, Serialize};

/// How the combined gene vote is turned into positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeManagementConfig {
    /// A position opens once the vote moves beyond +/- this level.
    pub entry_threshold: f64,
    /// An open position closes once the vote moves beyond this level against it.
    pub exit_threshold: f64,
    /// Share of available cash committed per position.
    pub position_fraction: f64,
}

impl Default for TradeManagementConfig {
    fn default() -> Self {
        Self {
            entry_threshold: 0.5,
            exit_threshold: 0.0,
            position_fraction: 0.1,
        }
    }
}

impl ConfigSection for TradeManagementConfig {
    fn section_name() -> &'static str {
        "trade_management"
    }

    fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        check_range(&mut violations, "entry_threshold", self.entry_threshold, 0.0, 1.0);
        check_range(&mut violations, "exit_threshold", self.exit_threshold, 0.0, 1.0);
        check_range(&mut violations, "position_fraction", self.position_fraction, 0.01, 1.0);
        violations
    }
}
