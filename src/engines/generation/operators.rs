use crate::config::EvolutionConfig;
use crate::engines::generation::genome::{Chromosome, Gene, Genome};
use crate::genes::{random_params, traits::round4, GeneKind, GeneRegistry};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// How random genomes are shaped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenomeShape {
    pub min_genes: usize,
    pub max_genes: usize,
    pub weight_min: f64,
    pub weight_max: f64,
}

impl From<&EvolutionConfig> for GenomeShape {
    fn from(config: &EvolutionConfig) -> Self {
        Self {
            min_genes: config.min_genes,
            max_genes: config.max_genes,
            weight_min: config.seed_weight_min,
            weight_max: config.seed_weight_max,
        }
    }
}

/// Generator for one population and draw stream. With a configured seed the
/// same population and stream always replay the same draws, and different
/// populations never share a sequence.
pub fn population_rng(seed: Option<u64>, population_id: i64, stream: u64) -> StdRng {
    match seed {
        Some(seed) => {
            StdRng::seed_from_u64(seed ^ (population_id as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ stream)
        }
        None => StdRng::from_entropy(),
    }
}

/// A gene of `kind` with random parameters and weight.
pub fn random_gene<R: Rng>(kind: &dyn GeneKind, shape: &GenomeShape, rng: &mut R) -> Gene {
    let params = random_params(kind, rng);
    let weight = round4(rng.gen_range(shape.weight_min..=shape.weight_max));
    Gene::new(kind.alias(), params, weight)
}

/// Random genome with distinct gene types.
pub fn random_genome<R: Rng>(registry: &GeneRegistry, shape: &GenomeShape, rng: &mut R) -> Genome {
    let kinds = registry.kinds();
    if kinds.is_empty() {
        return Vec::new();
    }
    let max = shape.max_genes.min(kinds.len()).max(1);
    let min = shape.min_genes.clamp(1, max);
    let count = rng.gen_range(min..=max);

    sample(rng, kinds.len(), count)
        .into_iter()
        .map(|idx| random_gene(kinds[idx].as_ref(), shape, rng))
        .collect()
}

/// Founders whose fingerprints collide with neither `known` nor each other.
/// Gives up on a slot after a bounded number of draws, so fewer than `count`
/// may come back.
pub fn seed_chromosomes<R: Rng>(
    population_id: i64,
    generation: u32,
    count: usize,
    registry: &GeneRegistry,
    shape: &GenomeShape,
    known: &HashSet<String>,
    rng: &mut R,
) -> Vec<Chromosome> {
    let mut seen = known.clone();
    let mut seeds = Vec::with_capacity(count);
    for _ in 0..count {
        for _ in 0..10 {
            let candidate = Chromosome::founder(population_id, generation, random_genome(registry, shape, rng));
            if candidate.genes.is_empty() {
                break;
            }
            if seen.insert(candidate.fingerprint.clone()) {
                seeds.push(candidate);
                break;
            }
        }
    }
    if seeds.len() < count {
        log::warn!(
            "Population {}: seeded {} of {} chromosomes, the rest collided with existing fingerprints",
            population_id,
            seeds.len(),
            count
        );
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genes::{MAX_WEIGHT, MIN_WEIGHT};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_genomes_are_valid() {
        let registry = GeneRegistry::new();
        let shape = GenomeShape::from(&EvolutionConfig::default());
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let genome = random_genome(&registry, &shape, &mut rng);
            assert!(genome.len() >= 2 && genome.len() <= 5);

            let types: HashSet<_> = genome.iter().map(|g| g.gene_type.clone()).collect();
            assert_eq!(types.len(), genome.len());

            for gene in &genome {
                assert!(gene.weight >= MIN_WEIGHT && gene.weight <= MAX_WEIGHT);
                let kind = registry.get(&gene.gene_type).unwrap();
                assert!(kind.validate(&gene.params).is_empty());
            }
        }
    }

    #[test]
    fn seeds_are_unique() {
        let registry = GeneRegistry::new();
        let shape = GenomeShape::from(&EvolutionConfig::default());
        let mut rng = StdRng::seed_from_u64(11);

        let seeds = seed_chromosomes(1, 0, 100, &registry, &shape, &HashSet::new(), &mut rng);
        assert_eq!(seeds.len(), 100);
        let fingerprints: HashSet<_> = seeds.iter().map(|c| c.fingerprint.clone()).collect();
        assert_eq!(fingerprints.len(), 100);
    }

    #[test]
    fn seeded_generators_differ_per_population() {
        let mut a = population_rng(Some(42), 1, 0);
        let mut b = population_rng(Some(42), 2, 0);
        let mut again = population_rng(Some(42), 1, 0);
        let first: u64 = a.gen();
        assert_ne!(first, b.gen::<u64>());
        assert_eq!(first, again.gen::<u64>());
    }
}
