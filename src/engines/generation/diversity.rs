use crate::engines::generation::genome::{Chromosome, Gene};
use crate::genes::{GeneRegistry, MAX_WEIGHT, MIN_WEIGHT};
use std::collections::BTreeSet;

/// Dissimilarity of two genes of the same type, in `[0, 1]`.
///
/// Mean over the parameters (normalized by the type's declared span) and the
/// weight (normalized by the weight bounds).
pub fn gene_distance(a: &Gene, b: &Gene, registry: &GeneRegistry) -> f64 {
    let kind = registry.get(&a.gene_type);
    let names: BTreeSet<&String> = a.params.keys().chain(b.params.keys()).collect();

    let mut total = 0.0;
    let mut terms = 0usize;
    for name in names {
        let diff = match (a.params.get(name), b.params.get(name)) {
            (Some(x), Some(y)) => {
                let span = kind
                    .as_ref()
                    .and_then(|k| k.spec(name))
                    .map(|spec| spec.span())
                    .filter(|span| *span > 0.0)
                    .unwrap_or_else(|| x.abs().max(y.abs()).max(1.0));
                ((x - y).abs() / span).min(1.0)
            }
            _ => 1.0,
        };
        total += diff;
        terms += 1;
    }

    total += ((a.weight - b.weight).abs() / (MAX_WEIGHT - MIN_WEIGHT)).min(1.0);
    terms += 1;

    total / terms as f64
}

/// Structural distance of two chromosomes, in `[0, 1]`.
///
/// Averaged over the union of gene types: a type carried by only one side
/// counts as fully distinct.
pub fn chromosome_distance(a: &Chromosome, b: &Chromosome, registry: &GeneRegistry) -> f64 {
    let types: BTreeSet<&str> = a
        .genes
        .iter()
        .chain(&b.genes)
        .map(|g| g.gene_type.as_str())
        .collect();
    if types.is_empty() {
        return 0.0;
    }

    let total: f64 = types
        .iter()
        .map(|t| match (a.gene(t), b.gene(t)) {
            (Some(x), Some(y)) => gene_distance(x, y, registry),
            _ => 1.0,
        })
        .sum();
    total / types.len() as f64
}

/// Mean pairwise distance; 0 for fewer than two chromosomes.
pub fn population_diversity(chromosomes: &[Chromosome], registry: &GeneRegistry) -> f64 {
    DistanceMatrix::new(chromosomes, registry).diversity_of(&(0..chromosomes.len()).collect::<Vec<_>>())
}

/// Symmetric pairwise distances, computed once per selection round.
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn new(chromosomes: &[Chromosome], registry: &GeneRegistry) -> Self {
        let n = chromosomes.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in i + 1..n {
                let d = chromosome_distance(&chromosomes[i], &chromosomes[j], registry);
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self { n, values }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    /// Mean pairwise distance over a subset of indices.
    pub fn diversity_of(&self, members: &[usize]) -> f64 {
        if members.len() < 2 {
            return 0.0;
        }
        let mut sum = 0.0;
        for (pos, &i) in members.iter().enumerate() {
            for &j in &members[pos + 1..] {
                sum += self.get(i, j);
            }
        }
        let pairs = members.len() * (members.len() - 1) / 2;
        (sum / pairs as f64).clamp(0.0, 1.0)
    }

    /// Distance from `candidate` to its nearest member.
    pub fn nearest(&self, candidate: usize, members: &[usize]) -> f64 {
        members
            .iter()
            .filter(|&&m| m != candidate)
            .map(|&m| self.get(candidate, m))
            .fold(f64::INFINITY, f64::min)
    }

    /// Sum of distances from `candidate` to every member except `skip`.
    pub fn total_to(&self, candidate: usize, members: &[usize], skip: Option<usize>) -> f64 {
        members
            .iter()
            .filter(|&&m| m != candidate && Some(m) != skip)
            .map(|&m| self.get(candidate, m))
            .sum()
    }
}
