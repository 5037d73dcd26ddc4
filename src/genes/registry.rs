use crate::error::{MarketDnaError, Result};
use crate::genes::{
    indicators::{
        Atr, Bollinger, Candlestick, Macd, MovingAverage, Obv, Rsi, Stochastic, VolatilityBreakout, VolumeSpike,
    },
    traits::GeneKind,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Gene types known to the engine, keyed by alias.
///
/// Kept ordered so that seeded random choices over the registry are
/// reproducible.
pub struct GeneRegistry {
    kinds: BTreeMap<&'static str, Arc<dyn GeneKind>>,
}

impl Default for GeneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneRegistry {
    /// Registry with every built-in gene type.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtins();
        registry
    }

    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Adds or replaces a gene type. Intended for startup, before the registry
    /// is shared.
    pub fn register(&mut self, kind: Arc<dyn GeneKind>) {
        if self.kinds.insert(kind.alias(), kind.clone()).is_some() {
            log::warn!("Gene type '{}' registered twice, keeping the latest", kind.alias());
        }
    }

    pub fn get(&self, alias: &str) -> Option<Arc<dyn GeneKind>> {
        self.kinds.get(alias).cloned()
    }

    pub fn require(&self, alias: &str) -> Result<Arc<dyn GeneKind>> {
        self.get(alias)
            .ok_or_else(|| MarketDnaError::Validation(vec![format!("unknown gene type '{}'", alias)]))
    }

    pub fn aliases(&self) -> Vec<&'static str> {
        self.kinds.keys().copied().collect()
    }

    pub fn kinds(&self) -> Vec<Arc<dyn GeneKind>> {
        self.kinds.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    fn register_builtins(&mut self) {
        let kinds: Vec<Arc<dyn GeneKind>> = vec![
            Arc::new(Rsi),
            Arc::new(Stochastic),
            Arc::new(MovingAverage),
            Arc::new(Macd),
            Arc::new(Bollinger),
            Arc::new(Atr),
            Arc::new(VolatilityBreakout),
            Arc::new(Obv),
            Arc::new(VolumeSpike),
            Arc::new(Candlestick),
        ];
        for kind in kinds {
            self.register(kind);
        }
    }
}
