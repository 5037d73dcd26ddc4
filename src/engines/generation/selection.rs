use crate::engines::generation::diversity::DistanceMatrix;
use crate::engines::generation::genome::Chromosome;
use crate::genes::GeneRegistry;
use rand::seq::index::sample;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;

/// Ranking used everywhere a "best" chromosome is picked: higher fitness,
/// then lower age, then lower id.
pub fn rank(a: &Chromosome, b: &Chromosome) -> Ordering {
    b.fitness_or_zero()
        .partial_cmp(&a.fitness_or_zero())
        .unwrap_or(Ordering::Equal)
        .then(a.age.cmp(&b.age))
        .then(a.id.unwrap_or(i64::MAX).cmp(&b.id.unwrap_or(i64::MAX)))
}

fn tournament<'a, R: Rng>(pool: &[&'a Chromosome], pressure: usize, rng: &mut R) -> Option<&'a Chromosome> {
    if pool.is_empty() {
        return None;
    }
    let size = pressure.clamp(1, pool.len());
    sample(rng, pool.len(), size)
        .into_iter()
        .map(|idx| pool[idx])
        .min_by(|a, b| rank(a, b))
}

/// Tournament selection: best of `pressure` distinct chromosomes drawn
/// uniformly at random.
pub fn tournament_selection<'a, R: Rng>(
    candidates: &'a [Chromosome],
    pressure: usize,
    rng: &mut R,
) -> Option<&'a Chromosome> {
    let pool: Vec<&Chromosome> = candidates.iter().collect();
    tournament(&pool, pressure, rng)
}

/// Tournament among the chromosomes allowed to breed with `first`: distinct
/// from it and at most one generation apart.
pub fn select_mate<'a, R: Rng>(
    candidates: &'a [Chromosome],
    first: &Chromosome,
    pressure: usize,
    rng: &mut R,
) -> Option<&'a Chromosome> {
    let pool: Vec<&Chromosome> = candidates
        .iter()
        .filter(|c| !std::ptr::eq(*c, first) && (c.id.is_none() || c.id != first.id))
        .filter(|c| c.generation.abs_diff(first.generation) <= 1)
        .collect();
    tournament(&pool, pressure, rng)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurvivorSettings {
    /// Slots kept, including the diversity slots.
    pub keep: usize,
    pub diversity_fraction: f64,
    pub diversity_threshold: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionStats {
    pub candidates: usize,
    pub elite_slots: usize,
    pub diversity_slots: usize,
    pub forced_swaps: usize,
    pub diversity: f64,
    pub threshold_met: bool,
}

#[derive(Debug, Clone)]
pub struct SurvivorSelection {
    pub survivors: Vec<Chromosome>,
    pub retired: Vec<Chromosome>,
    pub stats: SelectionStats,
}

/// Truncate evaluated chromosomes to `settings.keep`.
///
/// Elite slots take the best by fitness; diversity slots take, one at a time,
/// the candidate farthest from everything retained so far. While diversity is
/// under the threshold the most redundant survivor (never the best one) is
/// swapped for the most distant outsider, as long as each swap raises it.
pub fn select_survivors(
    mut evaluated: Vec<Chromosome>,
    settings: &SurvivorSettings,
    registry: &GeneRegistry,
) -> SurvivorSelection {
    evaluated.sort_by(rank);
    let n = evaluated.len();
    let keep = settings.keep.min(n);
    let matrix = DistanceMatrix::new(&evaluated, registry);

    let mut stats = SelectionStats {
        candidates: n,
        ..Default::default()
    };

    let diversity_slots = if keep > 1 {
        ((keep as f64 * settings.diversity_fraction).round() as usize).min(keep - 1)
    } else {
        0
    };
    let elite = keep - diversity_slots;
    let mut retained: Vec<usize> = (0..elite).collect();
    let mut outside: Vec<usize> = (elite..n).collect();

    for _ in 0..diversity_slots {
        let Some(pos) = farthest(&matrix, &outside, &retained) else {
            break;
        };
        retained.push(outside.remove(pos));
    }
    stats.elite_slots = elite;
    stats.diversity_slots = retained.len() - elite;

    let mut diversity = matrix.diversity_of(&retained);
    while diversity < settings.diversity_threshold && !outside.is_empty() && retained.len() > 1 {
        if stats.forced_swaps >= keep {
            break;
        }
        // Index 0 is the best chromosome and always stays.
        let (redundant_pos, _) = match retained
            .iter()
            .enumerate()
            .skip(1)
            .map(|(pos, &i)| (pos, matrix.total_to(i, &retained, None)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        {
            Some(found) => found,
            None => break,
        };
        let redundant = retained[redundant_pos];

        let without: Vec<usize> = retained.iter().copied().filter(|&i| i != redundant).collect();
        let Some(incoming_pos) = farthest(&matrix, &outside, &without) else {
            break;
        };
        let incoming = outside[incoming_pos];

        let pairs = (retained.len() * (retained.len() - 1) / 2) as f64;
        let delta = matrix.total_to(incoming, &without, None) - matrix.total_to(redundant, &without, None);
        if delta <= 0.0 {
            break;
        }
        retained[redundant_pos] = incoming;
        outside[incoming_pos] = redundant;
        diversity = (diversity + delta / pairs).clamp(0.0, 1.0);
        stats.forced_swaps += 1;
    }

    if stats.forced_swaps > 0 {
        log::debug!(
            "Forced {} diversity swaps, diversity now {:.3} (threshold {:.3})",
            stats.forced_swaps,
            diversity,
            settings.diversity_threshold
        );
    }
    stats.diversity = matrix.diversity_of(&retained);
    stats.threshold_met = stats.diversity >= settings.diversity_threshold;

    let mut slots: Vec<Option<Chromosome>> = evaluated.into_iter().map(Some).collect();
    let mut survivors: Vec<Chromosome> = retained.iter().filter_map(|&i| slots[i].take()).collect();
    survivors.sort_by(rank);
    let retired = slots.into_iter().flatten().collect();

    SurvivorSelection {
        survivors,
        retired,
        stats,
    }
}

/// Position in `outside` of the candidate whose nearest retained neighbour is
/// farthest away; ties go to the better ranked (earlier) candidate.
fn farthest(matrix: &DistanceMatrix, outside: &[usize], retained: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (pos, &candidate) in outside.iter().enumerate() {
        let distance = if retained.is_empty() {
            1.0
        } else {
            matrix.nearest(candidate, retained)
        };
        if best.map_or(true, |(_, d)| distance > d) {
            best = Some((pos, distance));
        }
    }
    best.map(|(pos, _)| pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::genome::Gene;
    use crate::genes::GeneParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scored(id: i64, fitness: f64, age: u32, period: f64) -> Chromosome {
        let params: GeneParams = [("period".to_string(), period)].into_iter().collect();
        let mut c = Chromosome::founder(1, 0, vec![Gene::new("obv", params, 1.0)]);
        c.id = Some(id);
        c.fitness = Some(fitness);
        c.age = age;
        c
    }

    #[test]
    fn full_pressure_tournament_returns_the_best() {
        let candidates = vec![scored(1, 0.2, 0, 10.0), scored(2, 0.9, 0, 20.0), scored(3, 0.5, 0, 30.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let winner = tournament_selection(&candidates, 10, &mut rng).unwrap();
        assert_eq!(winner.id, Some(2));
    }

    #[test]
    fn ties_prefer_younger_then_lower_id() {
        let candidates = vec![scored(5, 0.5, 3, 10.0), scored(4, 0.5, 1, 20.0), scored(3, 0.5, 1, 30.0)];
        let mut rng = StdRng::seed_from_u64(1);
        let winner = tournament_selection(&candidates, 3, &mut rng).unwrap();
        assert_eq!(winner.id, Some(3));
    }

    #[test]
    fn mate_is_never_the_first_parent() {
        let candidates = vec![scored(1, 0.9, 0, 10.0), scored(2, 0.1, 0, 20.0)];
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let mate = select_mate(&candidates, &candidates[0], 2, &mut rng).unwrap();
            assert_eq!(mate.id, Some(2));
        }
    }

    #[test]
    fn mate_excludes_distant_generations() {
        let mut far = scored(2, 0.9, 0, 20.0);
        far.generation = 4;
        let candidates = vec![scored(1, 0.5, 0, 10.0), far];
        let mut rng = StdRng::seed_from_u64(3);
        assert!(select_mate(&candidates, &candidates[0], 2, &mut rng).is_none());
    }

    #[test]
    fn survivors_keep_the_best_and_respect_the_quota() {
        let registry = GeneRegistry::new();
        let evaluated: Vec<Chromosome> = (0..10).map(|i| scored(i + 1, i as f64 / 10.0, 0, 5.0 + i as f64)).collect();
        let settings = SurvivorSettings {
            keep: 4,
            diversity_fraction: 0.25,
            diversity_threshold: 0.5,
        };
        let selection = select_survivors(evaluated, &settings, &registry);
        assert_eq!(selection.survivors.len(), 4);
        assert_eq!(selection.retired.len(), 6);
        assert_eq!(selection.survivors[0].id, Some(10));
        assert_eq!(selection.stats.diversity_slots, 1);
    }
}
