use crate::engines::generation::genome::{Chromosome, Gene, Genome};
use crate::engines::generation::operators::{seed_chromosomes, GenomeShape};
use crate::engines::generation::selection::{select_mate, tournament_selection};
use crate::error::{MarketDnaError, Result};
use crate::genes::GeneRegistry;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

/// Uniform crossover aligned by gene type.
///
/// Shared types come from either parent with equal probability (or in
/// proportion to positive ablation contributions when `contribution_guided`).
/// Types carried by one parent only are kept with that parent's share of the
/// combined fitness. Weights and mutation history travel with the gene.
pub fn crossover<R: Rng>(
    parent1: &Chromosome,
    parent2: &Chromosome,
    contribution_guided: bool,
    rng: &mut R,
) -> Result<Chromosome> {
    if parent1.population_id != parent2.population_id {
        return Err(MarketDnaError::Lineage(format!(
            "parents belong to different populations ({} and {})",
            parent1.population_id, parent2.population_id
        )));
    }
    let gap = parent1.generation.abs_diff(parent2.generation);
    if gap > 1 {
        return Err(MarketDnaError::Lineage(format!(
            "parents {:?} (generation {}) and {:?} (generation {}) are {} generations apart",
            parent1.id, parent1.generation, parent2.id, parent2.generation, gap
        )));
    }

    let (f1, f2) = (parent1.fitness_or_zero().max(0.0), parent2.fitness_or_zero().max(0.0));
    let share1 = if f1 + f2 > 0.0 { f1 / (f1 + f2) } else { 0.5 };
    let share2 = 1.0 - share1;

    let mut genes: Genome = Vec::new();
    for gene in &parent1.genes {
        let chosen = match parent2.gene(&gene.gene_type) {
            Some(other) => {
                let p_first = if contribution_guided {
                    contribution_share(gene, other)
                } else {
                    0.5
                };
                Some(if rng.gen_bool(p_first) { gene } else { other })
            }
            None => rng.gen_bool(share1).then_some(gene),
        };
        if let Some(source) = chosen {
            genes.push(inherit(source));
        }
    }
    for gene in &parent2.genes {
        if parent1.gene(&gene.gene_type).is_none() && rng.gen_bool(share2) {
            genes.push(inherit(gene));
        }
    }

    if genes.is_empty() {
        let fitter = if f2 > f1 { parent2 } else { parent1 };
        if let Some(gene) = fitter.genes.first() {
            genes.push(inherit(gene));
        }
    }

    let generation = parent1.generation.max(parent2.generation) + 1;
    Ok(Chromosome::offspring(
        parent1.population_id,
        generation,
        (parent1.id, parent2.id),
        genes,
    ))
}

fn contribution_share(a: &Gene, b: &Gene) -> f64 {
    let (ca, cb) = (a.performance_contribution.max(0.0), b.performance_contribution.max(0.0));
    if ca + cb > 0.0 {
        (ca / (ca + cb)).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

fn inherit(gene: &Gene) -> Gene {
    Gene {
        id: None,
        performance_contribution: 0.0,
        ..gene.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreedingSettings {
    pub selection_pressure: usize,
    pub max_duplicate_retries: usize,
    pub max_mate_attempts: usize,
    pub contribution_guided: bool,
    pub shape: GenomeShape,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BreedingStats {
    pub requested: usize,
    pub crossovers: usize,
    pub duplicate_retries: usize,
    /// Slots whose last crossover was still a duplicate, filled by a founder.
    pub duplicates_replaced: usize,
    /// Slots with no compatible mate, filled by a founder.
    pub seeded: usize,
}

#[derive(Debug, Clone)]
pub struct Brood {
    pub offspring: Vec<Chromosome>,
    pub stats: BreedingStats,
}

/// Produce `count` offspring from the survivors, none of them sharing a
/// fingerprint with `known_fingerprints` or with each other.
///
/// A duplicate child is discarded and bred again from reselected parents, up
/// to `max_duplicate_retries`. A slot still duplicated after that, or with no
/// compatible mate, goes to a random founder of the next generation.
pub fn breed<R: Rng>(
    population_id: i64,
    parents: &[Chromosome],
    count: usize,
    known_fingerprints: &HashSet<String>,
    settings: &BreedingSettings,
    registry: &GeneRegistry,
    rng: &mut R,
) -> Result<Brood> {
    let mut stats = BreedingStats {
        requested: count,
        ..Default::default()
    };
    let mut seen = known_fingerprints.clone();
    let mut offspring = Vec::with_capacity(count);
    // Fallback founders join the generation being bred.
    let seed_generation = parents.iter().map(|p| p.generation + 1).max().unwrap_or(0);

    for _ in 0..count {
        let mut child = None;
        let mut exhausted = false;
        for attempt in 0..=settings.max_duplicate_retries {
            let Some((first, second)) = pick_parents(parents, settings, rng) else {
                break;
            };
            let candidate = crossover(first, second, settings.contribution_guided, rng)?;
            stats.crossovers += 1;

            if !seen.contains(&candidate.fingerprint) {
                child = Some(candidate);
                break;
            }
            if attempt == settings.max_duplicate_retries {
                exhausted = true;
            } else {
                stats.duplicate_retries += 1;
            }
        }

        let child = match child {
            Some(child) => child,
            None => {
                let mut seeds = seed_chromosomes(population_id, seed_generation, 1, registry, &settings.shape, &seen, rng);
                let Some(seed) = seeds.pop() else {
                    continue;
                };
                if exhausted {
                    stats.duplicates_replaced += 1;
                } else {
                    stats.seeded += 1;
                }
                seed
            }
        };
        seen.insert(child.fingerprint.clone());
        offspring.push(child);
    }

    if stats.duplicates_replaced > 0 {
        log::info!(
            "Population {}: replaced {} duplicate offspring with founders after {} retries",
            population_id,
            stats.duplicates_replaced,
            settings.max_duplicate_retries
        );
    }
    if offspring.len() < count {
        log::warn!(
            "Population {}: bred {} of {} offspring",
            population_id,
            offspring.len(),
            count
        );
    }

    Ok(Brood { offspring, stats })
}

/// First parent by tournament, mate by tournament among compatible
/// chromosomes; the first parent is redrawn when it has no compatible mate.
fn pick_parents<'a, R: Rng>(
    parents: &'a [Chromosome],
    settings: &BreedingSettings,
    rng: &mut R,
) -> Option<(&'a Chromosome, &'a Chromosome)> {
    if parents.len() < 2 {
        return None;
    }
    for _ in 0..settings.max_mate_attempts.max(1) {
        let first = tournament_selection(parents, settings.selection_pressure, rng)?;
        if let Some(second) = select_mate(parents, first, settings.selection_pressure, rng) {
            return Some((first, second));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genes::GeneParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gene(gene_type: &str, period: f64, weight: f64) -> Gene {
        let params: GeneParams = [("period".to_string(), period)].into_iter().collect();
        Gene::new(gene_type, params, weight)
    }

    fn parent(id: i64, generation: u32, fitness: f64, genes: Vec<Gene>) -> Chromosome {
        let mut c = Chromosome::founder(1, generation, genes);
        c.id = Some(id);
        c.fitness = Some(fitness);
        c
    }

    #[test]
    fn child_genes_come_unchanged_from_a_parent() {
        let p1 = parent(1, 2, 0.6, vec![gene("obv", 10.0, 0.3), gene("volume", 12.0, 4.2)]);
        let p2 = parent(2, 3, 0.4, vec![gene("obv", 30.0, 2.5), gene("atr", 14.0, 1.1)]);
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..50 {
            let child = crossover(&p1, &p2, false, &mut rng).unwrap();
            assert_eq!(child.generation, 4);
            assert_eq!(child.age, 0);
            assert_eq!((child.parent1_id, child.parent2_id), (Some(1), Some(2)));
            assert!(!child.genes.is_empty());
            for g in &child.genes {
                let from_parent = p1.genes.iter().chain(&p2.genes).any(|p| {
                    p.gene_type == g.gene_type && p.params == g.params && p.weight == g.weight
                });
                assert!(from_parent);
            }
        }
    }

    #[test]
    fn zero_fitness_parent_never_contributes_unique_genes() {
        let p1 = parent(1, 0, 1.0, vec![gene("obv", 10.0, 1.0)]);
        let p2 = parent(2, 0, 0.0, vec![gene("atr", 14.0, 1.0)]);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let child = crossover(&p1, &p2, false, &mut rng).unwrap();
            assert!(child.gene("atr").is_none());
            assert!(child.gene("obv").is_some());
        }
    }

    #[test]
    fn distant_generations_are_rejected() {
        let p1 = parent(1, 5, 0.5, vec![gene("obv", 10.0, 1.0)]);
        let p2 = parent(2, 7, 0.5, vec![gene("obv", 20.0, 1.0)]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(crossover(&p1, &p2, false, &mut rng), Err(MarketDnaError::Lineage(_))));
    }

    fn settings(max_duplicate_retries: usize) -> BreedingSettings {
        BreedingSettings {
            selection_pressure: 3,
            max_duplicate_retries,
            max_mate_attempts: 3,
            contribution_guided: false,
            shape: GenomeShape {
                min_genes: 1,
                max_genes: 3,
                weight_min: 0.5,
                weight_max: 2.0,
            },
        }
    }

    #[test]
    fn identical_parents_still_fill_the_brood_with_distinct_children() {
        let registry = GeneRegistry::new();
        let genes = vec![gene("obv", 10.0, 1.0), gene("atr", 14.0, 1.5)];
        let parents = vec![parent(1, 0, 0.5, genes.clone()), parent(2, 0, 0.5, genes)];
        let known: HashSet<String> = parents.iter().map(|p| p.fingerprint.clone()).collect();
        let mut rng = StdRng::seed_from_u64(3);

        let brood = breed(1, &parents, 5, &known, &settings(2), &registry, &mut rng).unwrap();

        assert_eq!(brood.offspring.len(), 5);
        let fingerprints: HashSet<_> = brood.offspring.iter().map(|c| c.fingerprint.clone()).collect();
        assert_eq!(fingerprints.len(), 5);
        assert!(fingerprints.is_disjoint(&known));
        assert_eq!(brood.stats.duplicates_replaced, 5);
        assert_eq!(brood.stats.duplicate_retries, 10);
        assert!(brood.offspring.iter().all(|c| c.generation == 1));
    }

    #[test]
    fn breeding_fills_the_requested_count() {
        let registry = GeneRegistry::new();
        let parents: Vec<Chromosome> = (0..6)
            .map(|i| parent(i + 1, 0, 0.1 * i as f64, vec![gene("obv", 10.0 + i as f64, 1.0)]))
            .collect();
        let mut rng = StdRng::seed_from_u64(21);
        let brood = breed(1, &parents, 10, &HashSet::new(), &settings(3), &registry, &mut rng).unwrap();
        assert_eq!(brood.offspring.len(), 10);
        assert!(brood.offspring.iter().all(|c| c.generation == 1));
        let fingerprints: HashSet<_> = brood.offspring.iter().map(|c| c.fingerprint.clone()).collect();
        assert_eq!(fingerprints.len(), 10);
    }
}
