use crate::engines::generation::genome::{Chromosome, Gene, MutationRecord};
use crate::engines::generation::operators::{random_gene, GenomeShape};
use crate::genes::{traits::round4, GeneKind, GeneParams, GeneRegistry, ParamKind, MAX_WEIGHT, MIN_WEIGHT};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::AddAssign;

/// Largest parameter step as a share of the parameter's declared span.
const PARAM_STEP: f64 = 0.2;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MutationStats {
    pub genes_examined: usize,
    pub genes_mutated: usize,
    pub rerolls: usize,
    pub rejected: usize,
    pub genes_added: usize,
    pub genes_removed: usize,
    /// Mutated chromosomes rolled back because they collided with a known fingerprint.
    pub reverted: usize,
}

impl AddAssign for MutationStats {
    fn add_assign(&mut self, other: Self) {
        self.genes_examined += other.genes_examined;
        self.genes_mutated += other.genes_mutated;
        self.rerolls += other.rerolls;
        self.rejected += other.rejected;
        self.genes_added += other.genes_added;
        self.genes_removed += other.genes_removed;
        self.reverted += other.reverted;
    }
}

/// A proposed change to one gene, committed only when valid.
struct Proposal {
    weight: f64,
    param: Option<(String, f64, f64)>,
}

pub struct Mutator<'a> {
    registry: &'a GeneRegistry,
    rate: f64,
    max_weight_delta: f64,
    structural: Option<(f64, GenomeShape)>,
}

impl<'a> Mutator<'a> {
    pub fn new(registry: &'a GeneRegistry, rate: f64, max_weight_delta: f64) -> Self {
        Self {
            registry,
            rate: rate.clamp(0.0, 1.0),
            max_weight_delta: max_weight_delta.abs(),
            structural: None,
        }
    }

    /// Also add or remove a whole gene with probability `rate` per
    /// chromosome. Added genes are drawn like seeded ones, within `shape`.
    pub fn with_structural(mut self, rate: f64, shape: GenomeShape) -> Self {
        self.structural = Some((rate.clamp(0.0, 1.0), shape));
        self
    }

    /// Mutate each gene with probability `rate`, maybe add or drop a gene,
    /// then refresh the fingerprint.
    pub fn mutate_chromosome<R: Rng>(&self, chromosome: &mut Chromosome, rng: &mut R) -> MutationStats {
        let mut stats = MutationStats::default();
        for gene in chromosome.genes.iter_mut() {
            stats.genes_examined += 1;
            if rng.gen_bool(self.rate) {
                self.mutate_gene(gene, rng, &mut stats);
            }
        }
        if let Some((rate, shape)) = &self.structural {
            if rng.gen_bool(*rate) {
                self.mutate_structure(chromosome, shape, rng, &mut stats);
            }
        }
        if stats.genes_mutated + stats.genes_added + stats.genes_removed > 0 {
            chromosome.refresh();
        }
        stats
    }

    /// Mutate a brood so that no child ends up sharing a fingerprint with
    /// `known` or with a sibling. A child whose mutation collides keeps its
    /// unmutated genes.
    pub fn mutate_offspring<R: Rng>(
        &self,
        offspring: &mut [Chromosome],
        known: &HashSet<String>,
        rng: &mut R,
    ) -> MutationStats {
        let mut taken = known.clone();
        taken.extend(offspring.iter().map(|c| c.fingerprint.clone()));

        let mut stats = MutationStats::default();
        for child in offspring.iter_mut() {
            let before = child.clone();
            stats += self.mutate_chromosome(child, rng);
            if child.fingerprint == before.fingerprint {
                continue;
            }
            if taken.insert(child.fingerprint.clone()) {
                taken.remove(&before.fingerprint);
            } else {
                *child = before;
                stats.reverted += 1;
            }
        }
        stats
    }

    /// Add a gene of an unused type, or drop one, never leaving the
    /// chromosome empty or above `shape.max_genes`.
    fn mutate_structure<R: Rng>(
        &self,
        chromosome: &mut Chromosome,
        shape: &GenomeShape,
        rng: &mut R,
        stats: &mut MutationStats,
    ) {
        let unused: Vec<_> = self
            .registry
            .kinds()
            .into_iter()
            .filter(|kind| chromosome.gene(kind.alias()).is_none())
            .collect();
        let can_add = !unused.is_empty() && chromosome.genes.len() < shape.max_genes.max(1);
        let can_remove = chromosome.genes.len() > 1;

        let add = match (can_add, can_remove) {
            (true, true) => rng.gen_bool(0.5),
            (true, false) => true,
            (false, true) => false,
            (false, false) => return,
        };
        if add {
            let kind = &unused[rng.gen_range(0..unused.len())];
            let mut gene = random_gene(kind.as_ref(), shape, rng);
            gene.last_mutation_date = Some(Utc::now());
            chromosome.genes.push(gene);
            stats.genes_added += 1;
        } else {
            chromosome.genes.remove(rng.gen_range(0..chromosome.genes.len()));
            stats.genes_removed += 1;
        }
    }

    /// Apply one mutation to `gene`. Returns whether anything changed.
    ///
    /// The weight moves by a bounded delta and is clamped into range; one
    /// parameter moves within its declared bounds. An invalid parameter set
    /// is re-rolled once, and a second failure leaves the gene untouched.
    pub fn mutate_gene<R: Rng>(&self, gene: &mut Gene, rng: &mut R, stats: &mut MutationStats) -> bool {
        let kind = self.registry.get(&gene.gene_type);

        let mut accepted = None;
        for attempt in 0..2 {
            let proposal = self.propose(gene, kind.as_deref(), rng);
            let valid = match (&kind, &proposal.param) {
                (Some(kind), Some((name, _, new_value))) => {
                    let mut candidate: GeneParams = gene.params.clone();
                    candidate.insert(name.clone(), *new_value);
                    kind.validate(&candidate).is_empty()
                }
                _ => true,
            };
            if valid {
                accepted = Some(proposal);
                break;
            }
            if attempt == 0 {
                stats.rerolls += 1;
            }
        }

        let Some(proposal) = accepted else {
            stats.rejected += 1;
            return false;
        };

        let now = Utc::now();
        let mut changed = false;
        if proposal.weight != gene.weight {
            gene.mutation_history.push(MutationRecord {
                timestamp: now,
                field: "weight".to_string(),
                old_value: gene.weight,
                new_value: proposal.weight,
            });
            gene.weight = proposal.weight;
            changed = true;
        }
        if let Some((name, old_value, new_value)) = proposal.param {
            if old_value != new_value {
                gene.mutation_history.push(MutationRecord {
                    timestamp: now,
                    field: name.clone(),
                    old_value,
                    new_value,
                });
                gene.params.insert(name, new_value);
                changed = true;
            }
        }
        if changed {
            gene.last_mutation_date = Some(now);
            stats.genes_mutated += 1;
        }
        changed
    }

    fn propose<R: Rng>(&self, gene: &Gene, kind: Option<&dyn GeneKind>, rng: &mut R) -> Proposal {
        let delta = if self.max_weight_delta > 0.0 {
            rng.gen_range(-self.max_weight_delta..=self.max_weight_delta)
        } else {
            0.0
        };
        let weight = round4((gene.weight + delta).clamp(MIN_WEIGHT, MAX_WEIGHT));

        let param = kind.and_then(|kind| {
            let specs = kind.param_specs();
            if specs.is_empty() {
                return None;
            }
            let spec = specs[rng.gen_range(0..specs.len())];
            let old_value = gene.params.get(spec.name).copied().unwrap_or(spec.default);
            let step = rng.gen_range(-PARAM_STEP..=PARAM_STEP) * spec.span();
            let mut new_value = spec.normalize(old_value + step);
            if spec.kind == ParamKind::Integer && new_value == old_value {
                // Small steps round back onto the old value; move one unit instead.
                let unit = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                new_value = spec.normalize(old_value + unit);
                if new_value == old_value {
                    new_value = spec.normalize(old_value - unit);
                }
            }
            Some((spec.name.to_string(), old_value, new_value))
        });

        Proposal { weight, param }
    }
}
