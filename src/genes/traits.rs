use crate::data::MarketSeries;
use crate::error::{MarketDnaError, Result};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

/// Named numeric parameters of one gene. Ordered so serialization and
/// fingerprints are stable.
pub type GeneParams = BTreeMap<String, f64>;

/// Whether a parameter must stay integral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Float,
}

/// Declared optimization bounds of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamSpec {
    pub const fn integer(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self { name, kind: ParamKind::Integer, min, max, default }
    }

    pub const fn float(name: &'static str, min: f64, max: f64, default: f64) -> Self {
        Self { name, kind: ParamKind::Float, min, max, default }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Snap a raw value onto the parameter's domain.
    pub fn normalize(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        match self.kind {
            ParamKind::Integer => clamped.round(),
            ParamKind::Float => round4(clamped),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.kind {
            ParamKind::Integer => rng.gen_range(self.min as i64..=self.max as i64) as f64,
            ParamKind::Float => round4(rng.gen_range(self.min..=self.max)),
        }
    }
}

/// Rounds to four decimals so values survive JSON round trips unchanged.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// A technical-indicator rule a gene can carry.
///
/// Implementations declare their parameter schema and turn OHLCV bars into a
/// per-bar vote in `[-1, 1]`: positive favours long, negative favours short.
pub trait GeneKind: Send + Sync {
    /// Identifier stored in `chromosome_genes.gene_type`.
    fn alias(&self) -> &'static str;

    fn ui_name(&self) -> &'static str;

    fn param_specs(&self) -> Vec<ParamSpec>;

    /// Relationships between parameters, checked after the per-parameter bounds.
    fn cross_rules(&self, _params: &GeneParams) -> Vec<String> {
        Vec::new()
    }

    /// Bars consumed before the first meaningful signal.
    fn lookback(&self, params: &GeneParams) -> usize;

    fn signals(&self, series: &MarketSeries, params: &GeneParams) -> Result<Vec<f64>>;

    /// Every problem with `params`; empty when valid.
    fn validate(&self, params: &GeneParams) -> Vec<String> {
        let specs = self.param_specs();
        let mut problems = Vec::new();

        for spec in &specs {
            match params.get(spec.name) {
                None => problems.push(format!("{}: missing parameter '{}'", self.alias(), spec.name)),
                Some(&value) => {
                    if !(value >= spec.min && value <= spec.max) {
                        problems.push(format!(
                            "{}: {} must be between {} and {} (got {})",
                            self.alias(),
                            spec.name,
                            spec.min,
                            spec.max,
                            value
                        ));
                    } else if spec.kind == ParamKind::Integer && value.fract() != 0.0 {
                        problems.push(format!(
                            "{}: {} must be an integer (got {})",
                            self.alias(),
                            spec.name,
                            value
                        ));
                    }
                }
            }
        }
        for name in params.keys() {
            if !specs.iter().any(|spec| spec.name == name) {
                problems.push(format!("{}: unknown parameter '{}'", self.alias(), name));
            }
        }

        if problems.is_empty() {
            problems.extend(self.cross_rules(params));
        }
        problems
    }

    fn default_params(&self) -> GeneParams {
        self.param_specs()
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default))
            .collect()
    }

    fn spec(&self, name: &str) -> Option<ParamSpec> {
        self.param_specs().into_iter().find(|spec| spec.name == name)
    }
}

/// Random parameters within bounds that also satisfy the cross rules.
/// Falls back to the defaults when sampling keeps failing.
pub fn random_params<R: Rng + ?Sized>(kind: &dyn GeneKind, rng: &mut R) -> GeneParams {
    let specs = kind.param_specs();
    for _ in 0..16 {
        let params: GeneParams = specs
            .iter()
            .map(|spec| (spec.name.to_string(), spec.sample(rng)))
            .collect();
        if kind.validate(&params).is_empty() {
            return params;
        }
    }
    kind.default_params()
}

/// Reads a parameter the caller has already validated.
pub fn param(params: &GeneParams, name: &str) -> Result<f64> {
    params
        .get(name)
        .copied()
        .ok_or_else(|| MarketDnaError::EvaluationFailure(format!("missing gene parameter '{}'", name)))
}

pub fn period(params: &GeneParams, name: &str) -> Result<usize> {
    let value = param(params, name)?;
    if value < 1.0 {
        return Err(MarketDnaError::EvaluationFailure(format!(
            "gene parameter '{}' must be a positive period (got {})",
            name, value
        )));
    }
    Ok(value as usize)
}
