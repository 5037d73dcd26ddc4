use crate::genes::GeneParams;
use crate::types::ChromosomeStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// One committed change to a gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub timestamp: DateTime<Utc>,
    pub field: String,
    pub old_value: f64,
    pub new_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    /// Row id once persisted.
    pub id: Option<i64>,
    pub gene_type: String,
    pub params: GeneParams,
    pub weight: f64,
    pub is_active: bool,
    pub performance_contribution: f64,
    /// Append-only.
    pub mutation_history: Vec<MutationRecord>,
    pub last_mutation_date: Option<DateTime<Utc>>,
}

impl Gene {
    pub fn new(gene_type: &str, params: GeneParams, weight: f64) -> Self {
        Self {
            id: None,
            gene_type: gene_type.to_string(),
            params,
            weight,
            is_active: true,
            performance_contribution: 0.0,
            mutation_history: Vec::new(),
            last_mutation_date: None,
        }
    }

    /// Canonical text used for fingerprints and cache keys.
    pub fn canonical(&self) -> String {
        format!("{}|{}|{:.4}", self.gene_type, canonical_params(&self.params), self.weight)
    }
}

pub fn canonical_params(params: &GeneParams) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={:.4}", name, value))
        .collect::<Vec<_>>()
        .join(",")
}

/// Ordered gene set of one strategy.
pub type Genome = Vec<Gene>;

/// SHA-256 over the sorted `(gene_type, parameters, weight)` tuples.
///
/// Gene order and row ids do not matter; the result is hex encoded.
pub fn fingerprint(genes: &[Gene]) -> String {
    let mut entries: Vec<String> = genes.iter().map(Gene::canonical).collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for entry in &entries {
        hasher.update(entry.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Share of the total weight carried by each gene type.
pub fn weight_distribution(genes: &[Gene]) -> serde_json::Value {
    let total: f64 = genes.iter().map(|g| g.weight).sum();
    let mut shares = BTreeMap::new();
    for gene in genes {
        let share = if total > 0.0 { gene.weight / total } else { 0.0 };
        *shares.entry(gene.gene_type.clone()).or_insert(0.0) += share;
    }
    serde_json::json!(shares)
}

/// A candidate strategy, persisted or in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chromosome {
    /// Row id once persisted.
    pub id: Option<i64>,
    pub population_id: i64,
    pub fingerprint: String,
    pub generation: u32,
    /// Generations survived.
    pub age: u32,
    pub parent1_id: Option<i64>,
    pub parent2_id: Option<i64>,
    pub status: ChromosomeStatus,
    /// `None` until evaluated.
    pub fitness: Option<f64>,
    pub performance_metrics: serde_json::Value,
    pub weight_distribution: serde_json::Value,
    pub test_results: serde_json::Value,
    pub last_test_date: Option<DateTime<Utc>>,
    pub genes: Genome,
}

impl Chromosome {
    /// A parentless chromosome awaiting evaluation.
    pub fn founder(population_id: i64, generation: u32, genes: Genome) -> Self {
        let mut chromosome = Self {
            id: None,
            population_id,
            fingerprint: String::new(),
            generation,
            age: 0,
            parent1_id: None,
            parent2_id: None,
            status: ChromosomeStatus::Testing,
            fitness: None,
            performance_metrics: serde_json::json!({}),
            weight_distribution: serde_json::json!({}),
            test_results: serde_json::json!({}),
            last_test_date: None,
            genes,
        };
        chromosome.refresh();
        chromosome
    }

    pub fn offspring(
        population_id: i64,
        generation: u32,
        parents: (Option<i64>, Option<i64>),
        genes: Genome,
    ) -> Self {
        let mut chromosome = Self::founder(population_id, generation, genes);
        chromosome.parent1_id = parents.0;
        chromosome.parent2_id = parents.1;
        chromosome
    }

    /// Recompute fingerprint and weight distribution after the genes changed.
    pub fn refresh(&mut self) {
        self.fingerprint = fingerprint(&self.genes);
        self.weight_distribution = weight_distribution(&self.genes);
    }

    pub fn fitness_or_zero(&self) -> f64 {
        self.fitness.unwrap_or(0.0)
    }

    pub fn gene(&self, gene_type: &str) -> Option<&Gene> {
        self.genes.iter().find(|g| g.gene_type == gene_type)
    }

    pub fn active_genes(&self) -> impl Iterator<Item = &Gene> {
        self.genes.iter().filter(|g| g.is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, f64)]) -> GeneParams {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn fingerprint_ignores_order_and_ids() {
        let rsi = Gene::new("rsi", params(&[("period", 14.0), ("overbought", 70.0), ("oversold", 30.0)]), 1.5);
        let mut obv = Gene::new("obv", params(&[("period", 20.0)]), 0.8);
        obv.id = Some(42);

        let a = fingerprint(&[rsi.clone(), obv.clone()]);
        let b = fingerprint(&[obv, rsi]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_changes_with_weight() {
        let gene = Gene::new("obv", params(&[("period", 20.0)]), 0.8);
        let mut heavier = gene.clone();
        heavier.weight = 0.9;
        assert_ne!(fingerprint(&[gene]), fingerprint(&[heavier]));
    }

    #[test]
    fn weight_distribution_sums_to_one() {
        let genes = vec![
            Gene::new("obv", params(&[("period", 20.0)]), 1.0),
            Gene::new("volume", params(&[("period", 20.0), ("threshold", 1.5)]), 3.0),
        ];
        let dist = weight_distribution(&genes);
        assert_eq!(dist["obv"], 0.25);
        assert_eq!(dist["volume"], 0.75);
    }
}
