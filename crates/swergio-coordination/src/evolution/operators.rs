//! Selection, crossover, and mutation strategies.

use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use super::{Genome, Individual};
use crate::errors::EvolutionError;

/// Picks the parents of the next generation.
pub trait Selection: Send + Sync {
    /// Choose `k` individuals from `population`. Picking the same individual
    /// more than once is allowed.
    fn select(&self, population: &[Individual], k: usize, rng: &mut dyn RngCore) -> Vec<Individual>;
}

/// Recombines two genomes in place.
pub trait Crossover: Send + Sync {
    /// Mate `a` and `b`.
    fn mate(&self, a: &mut Genome, b: &mut Genome, rng: &mut dyn RngCore);
}

/// Perturbs one genome in place.
pub trait Mutation: Send + Sync {
    /// Mutate `genome`.
    fn mutate(&self, genome: &mut Genome, rng: &mut dyn RngCore);
}

pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<f64, EvolutionError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(EvolutionError::Probability { name, value })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Selection
// ─────────────────────────────────────────────────────────────────────────────

/// Best of `size` individuals drawn at random, repeated `k` times.
///
/// Unevaluated individuals lose against any evaluated one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tournament {
    /// Aspirants per tournament.
    pub size: usize,
}

impl Default for Tournament {
    fn default() -> Self {
        Self { size: 3 }
    }
}

impl Selection for Tournament {
    fn select(&self, population: &[Individual], k: usize, rng: &mut dyn RngCore) -> Vec<Individual> {
        if population.is_empty() {
            return Vec::new();
        }
        (0..k)
            .filter_map(|_| {
                (0..self.size.max(1))
                    .map(|_| &population[rng.random_range(0..population.len())])
                    .max_by(|a, b| a.score().total_cmp(&b.score()))
                    .cloned()
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Crossover
// ─────────────────────────────────────────────────────────────────────────────

/// Swap the genes between two random cut points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TwoPoint;

impl Crossover for TwoPoint {
    fn mate(&self, a: &mut Genome, b: &mut Genome, rng: &mut dyn RngCore) {
        let size = a.len().min(b.len());
        if size < 2 {
            return;
        }
        let first = rng.random_range(1..=size);
        let mut second = rng.random_range(1..size);
        let (lo, hi) = if second >= first {
            second += 1;
            (first, second)
        } else {
            (second, first)
        };
        a[lo..hi].swap_with_slice(&mut b[lo..hi]);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mutation
// ─────────────────────────────────────────────────────────────────────────────

/// Add normally distributed noise to each gene with probability `indpb`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gaussian {
    mu: f64,
    sigma: f64,
    indpb: f64,
}

impl Default for Gaussian {
    fn default() -> Self {
        Self {
            mu: 0.0,
            sigma: 1.0,
            indpb: 0.01,
        }
    }
}

impl Gaussian {
    /// Noise `N(mu, sigma²)` applied per gene with probability `indpb`.
    pub fn new(mu: f64, sigma: f64, indpb: f64) -> Result<Self, EvolutionError> {
        if !mu.is_finite() {
            return Err(EvolutionError::Parameter { name: "mu", value: mu });
        }
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(EvolutionError::Parameter {
                name: "sigma",
                value: sigma,
            });
        }
        Ok(Self {
            mu,
            sigma,
            indpb: check_probability("indpb", indpb)?,
        })
    }
}

impl Mutation for Gaussian {
    fn mutate(&self, genome: &mut Genome, rng: &mut dyn RngCore) {
        for gene in genome.iter_mut() {
            if rng.random_bool(self.indpb) {
                let z: f64 = rng.sample(StandardNormal);
                *gene += self.mu + self.sigma * z;
            }
        }
    }
}

/// Flip binary genes (`0` ↔ `1`) with probability `indpb`.
///
/// Any non-zero gene counts as set and flips to `0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlipBit {
    indpb: f64,
}

impl Default for FlipBit {
    fn default() -> Self {
        Self { indpb: 0.01 }
    }
}

impl FlipBit {
    /// Flip each gene with probability `indpb`.
    pub fn new(indpb: f64) -> Result<Self, EvolutionError> {
        Ok(Self {
            indpb: check_probability("indpb", indpb)?,
        })
    }
}

impl Mutation for FlipBit {
    fn mutate(&self, genome: &mut Genome, rng: &mut dyn RngCore) {
        for gene in genome.iter_mut() {
            if rng.random_bool(self.indpb) {
                *gene = if *gene == 0.0 { 1.0 } else { 0.0 };
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Variation
// ─────────────────────────────────────────────────────────────────────────────

/// Vary selected parents into offspring.
///
/// Neighbouring pairs `(0, 1), (2, 3), ..` are mated with probability
/// `cxpb`, then every individual is mutated with probability `mutpb`. Any
/// individual that changed loses its fitness.
pub fn var_and(
    mut offspring: Vec<Individual>,
    crossover: &dyn Crossover,
    mutation: &dyn Mutation,
    cxpb: f64,
    mutpb: f64,
    rng: &mut dyn RngCore,
) -> Vec<Individual> {
    for pair in offspring.chunks_exact_mut(2) {
        if rng.random_bool(cxpb) {
            let (left, right) = pair.split_at_mut(1);
            crossover.mate(&mut left[0].genome, &mut right[0].genome, rng);
            left[0].fitness = None;
            right[0].fitness = None;
        }
    }
    for individual in &mut offspring {
        if rng.random_bool(mutpb) {
            mutation.mutate(&mut individual.genome, rng);
            individual.fitness = None;
        }
    }
    offspring
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn scored(genome: Genome, fitness: f64) -> Individual {
        Individual {
            genome,
            fitness: Some(fitness),
        }
    }

    #[test]
    fn tournament_keeps_size_and_prefers_fitter() {
        let population = vec![scored(vec![0.0], 1.0), scored(vec![1.0], 100.0)];
        let picked = Tournament::default().select(&population, 200, &mut rng());
        assert_eq!(picked.len(), 200);
        let fitter = picked.iter().filter(|i| i.genome == vec![1.0]).count();
        // loses only when all three draws hit the weaker one: 1/8 of the time
        assert!(fitter > 150, "fitter picked {fitter} times");
    }

    #[test]
    fn tournament_of_one_is_uniform_draw() {
        let population = vec![scored(vec![0.0], 1.0), scored(vec![1.0], 100.0)];
        let picked = Tournament { size: 1 }.select(&population, 400, &mut rng());
        let weaker = picked.iter().filter(|i| i.genome == vec![0.0]).count();
        assert!((100..300).contains(&weaker), "weaker picked {weaker} times");
    }

    #[test]
    fn tournament_unevaluated_lose() {
        let population = vec![Individual::new(vec![0.0]), scored(vec![1.0], -5.0)];
        let picked = Tournament { size: 50 }.select(&population, 10, &mut rng());
        assert!(picked.iter().all(|i| i.genome == vec![1.0]));
    }

    #[test]
    fn tournament_empty_population() {
        assert!(Tournament::default().select(&[], 3, &mut rng()).is_empty());
    }

    #[test]
    fn gaussian_parameters() {
        assert_matches!(Gaussian::new(0.0, -1.0, 0.1), Err(EvolutionError::Parameter { name: "sigma", .. }));
        assert_matches!(Gaussian::new(0.0, 1.0, 1.1), Err(EvolutionError::Probability { name: "indpb", .. }));
        assert_matches!(Gaussian::new(f64::NAN, 1.0, 0.1), Err(EvolutionError::Parameter { name: "mu", .. }));
        assert!(Gaussian::new(0.0, 0.5, 0.2).is_ok());
    }

    #[test]
    fn gaussian_always_and_never() {
        let mut genome = vec![0.0; 64];
        Gaussian::new(0.0, 1.0, 0.0).unwrap().mutate(&mut genome, &mut rng());
        assert!(genome.iter().all(|g| *g == 0.0));

        Gaussian::new(10.0, 0.0, 1.0).unwrap().mutate(&mut genome, &mut rng());
        assert!(genome.iter().all(|g| (*g - 10.0).abs() < 1e-12));
    }

    #[test]
    fn flip_bit_flips_everything_at_one() {
        let mut genome = vec![0.0, 1.0, 1.0, 0.0];
        FlipBit::new(1.0).unwrap().mutate(&mut genome, &mut rng());
        assert_eq!(genome, vec![1.0, 0.0, 0.0, 1.0]);
        assert_matches!(FlipBit::new(-0.1), Err(EvolutionError::Probability { .. }));
    }

    #[test]
    fn two_point_short_genomes_untouched() {
        let mut a = vec![1.0];
        let mut b = vec![2.0];
        TwoPoint.mate(&mut a, &mut b, &mut rng());
        assert_eq!((a, b), (vec![1.0], vec![2.0]));
    }

    #[test]
    fn var_and_invalidates_changed_individuals() {
        let parents = vec![scored(vec![0.0; 8], 1.0), scored(vec![1.0; 8], 2.0), scored(vec![5.0; 8], 3.0)];
        let offspring = var_and(parents, &TwoPoint, &FlipBit::new(1.0).unwrap(), 1.0, 0.0, &mut rng());
        assert_eq!(offspring.len(), 3);
        assert!(offspring[0].fitness.is_none());
        assert!(offspring[1].fitness.is_none());
        // odd one out is never mated
        assert_eq!(offspring[2], scored(vec![5.0; 8], 3.0));
    }

    #[test]
    fn var_and_with_zero_probabilities_is_identity() {
        let parents = vec![scored(vec![0.0; 4], 1.0), scored(vec![1.0; 4], 2.0)];
        let offspring = var_and(parents.clone(), &TwoPoint, &Gaussian::default(), 0.0, 0.0, &mut rng());
        assert_eq!(offspring, parents);
    }

    proptest! {
        #[test]
        fn two_point_preserves_genes_per_position(len in 2_usize..40, seed in any::<u64>()) {
            let mut a: Genome = (0..len).map(|i| i as f64).collect();
            let mut b: Genome = (0..len).map(|i| -(i as f64) - 1.0).collect();
            TwoPoint.mate(&mut a, &mut b, &mut StdRng::seed_from_u64(seed));
            for i in 0..len {
                let pair = [a[i], b[i]];
                prop_assert!(pair.contains(&(i as f64)) && pair.contains(&(-(i as f64) - 1.0)));
            }
            let swapped = (0..len).filter(|&i| a[i] < 0.0).count();
            prop_assert!(swapped >= 1 && swapped < len);
        }
    }
}
