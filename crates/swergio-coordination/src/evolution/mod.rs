//! Evolutionary steps over a population of genomes.
//!
//! Two drivers share the same operators:
//!
//! - [`Evolution::step`] takes one barrier round (genomes and fitness keyed
//!   by participant) and returns the next generation under the same
//!   participant ids, slot for slot.
//! - [`Evolution::evolve`] advances the locally held population from a
//!   positional list of fitness values.

mod handler;
mod operators;

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use swergio_core::ParticipantId;
use tracing::debug;

use crate::errors::EvolutionError;

pub use handler::{
    COMPONENT_ID, CONTRIBUTION, EVO_DONE, EvolutionHandler, FITNESS_KEY, StepOutcome, WEIGHTS, WEIGHTS_KEY,
    request_weights,
};
pub use operators::{Crossover, FlipBit, Gaussian, Mutation, Selection, Tournament, TwoPoint, var_and};

/// One candidate solution.
pub type Genome = Vec<f64>;

/// Probability that a selected pair is mated.
pub const DEFAULT_CXPB: f64 = 0.5;
/// Probability that an offspring is mutated.
pub const DEFAULT_MUTPB: f64 = 0.01;

/// A genome and its fitness, if evaluated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Genes.
    pub genome: Genome,
    /// Fitness to maximize. `None` until evaluated.
    pub fitness: Option<f64>,
}

impl Individual {
    /// Unevaluated individual.
    pub fn new(genome: Genome) -> Self {
        Self { genome, fitness: None }
    }

    /// Fitness for ranking; unevaluated individuals rank last.
    pub fn score(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }
}

/// `n` genomes of `len` genes drawn uniformly from `[0, 1)`.
pub fn uniform_population(n: usize, len: usize, rng: &mut impl Rng) -> Vec<Genome> {
    (0..n).map(|_| (0..len).map(|_| rng.random::<f64>()).collect()).collect()
}

/// `n` genomes of `len` genes, each `0.0` or `1.0`.
pub fn binary_population(n: usize, len: usize, rng: &mut impl Rng) -> Vec<Genome> {
    (0..n)
        .map(|_| (0..len).map(|_| if rng.random_bool(0.5) { 1.0 } else { 0.0 }).collect())
        .collect()
}

/// Selection, variation, and the population they act on.
pub struct Evolution {
    selection: Box<dyn Selection>,
    crossover: Box<dyn Crossover>,
    mutation: Box<dyn Mutation>,
    cxpb: f64,
    mutpb: f64,
    rng: StdRng,
    population: Vec<Individual>,
    generation: u64,
}

impl Evolution {
    /// Tournament selection of size 3, two-point crossover, Gaussian
    /// mutation, mating probability 0.5 and mutation probability 0.01.
    pub fn new(population: Vec<Genome>) -> Self {
        Self {
            selection: Box::new(Tournament::default()),
            crossover: Box::new(TwoPoint),
            mutation: Box::new(Gaussian::default()),
            cxpb: DEFAULT_CXPB,
            mutpb: DEFAULT_MUTPB,
            rng: StdRng::from_os_rng(),
            population: population.into_iter().map(Individual::new).collect(),
            generation: 0,
        }
    }

    /// Use a deterministic random stream.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Replace the selection strategy.
    #[must_use]
    pub fn with_selection(mut self, selection: impl Selection + 'static) -> Self {
        self.selection = Box::new(selection);
        self
    }

    /// Replace the crossover strategy.
    #[must_use]
    pub fn with_crossover(mut self, crossover: impl Crossover + 'static) -> Self {
        self.crossover = Box::new(crossover);
        self
    }

    /// Replace the mutation strategy.
    #[must_use]
    pub fn with_mutation(mut self, mutation: impl Mutation + 'static) -> Self {
        self.mutation = Box::new(mutation);
        self
    }

    /// Set the mating and mutation probabilities.
    pub fn with_probabilities(mut self, cxpb: f64, mutpb: f64) -> Result<Self, EvolutionError> {
        self.cxpb = operators::check_probability("cxpb", cxpb)?;
        self.mutpb = operators::check_probability("mutpb", mutpb)?;
        Ok(self)
    }

    /// Current population.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Genomes of the current population.
    pub fn genomes(&self) -> Vec<Genome> {
        self.population.iter().map(|i| i.genome.clone()).collect()
    }

    /// Generations produced so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance one generation from a barrier round.
    ///
    /// The genomes in `weights` replace the held population, in participant
    /// order. Each is scored from `fitness`, selected, and varied. Offspring
    /// `k` goes back to the `k`-th participant of `weights`, so the result has
    /// exactly the ids of `weights`.
    pub fn step(
        &mut self,
        weights: BTreeMap<ParticipantId, Genome>,
        fitness: &BTreeMap<ParticipantId, f64>,
    ) -> Result<BTreeMap<ParticipantId, Genome>, EvolutionError> {
        if weights.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }
        let mut ids = Vec::with_capacity(weights.len());
        let mut population = Vec::with_capacity(weights.len());
        for (id, genome) in weights {
            let score = *fitness.get(&id).ok_or_else(|| EvolutionError::MissingFitness(id.clone()))?;
            population.push(Individual {
                genome,
                fitness: Some(score),
            });
            ids.push(id);
        }

        self.population = population;
        self.advance();
        Ok(ids.into_iter().zip(self.genomes()).collect())
    }

    /// Advance the held population given one fitness value per individual,
    /// in population order.
    pub fn evolve(&mut self, fitness: &[f64]) -> Result<&[Individual], EvolutionError> {
        if self.population.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }
        if fitness.len() != self.population.len() {
            return Err(EvolutionError::SizeMismatch {
                expected: self.population.len(),
                actual: fitness.len(),
            });
        }
        for (individual, score) in self.population.iter_mut().zip(fitness) {
            individual.fitness = Some(*score);
        }
        self.advance();
        Ok(&self.population)
    }

    fn advance(&mut self) {
        let size = self.population.len();
        let selected = self.selection.select(&self.population, size, &mut self.rng);
        self.population = var_and(
            selected,
            self.crossover.as_ref(),
            self.mutation.as_ref(),
            self.cxpb,
            self.mutpb,
            &mut self.rng,
        );
        self.generation += 1;
        let best = self
            .population
            .iter()
            .filter_map(|i| i.fitness)
            .fold(f64::NEG_INFINITY, f64::max);
        debug!(generation = self.generation, size, best_kept = best, "generation advanced");
    }
}

impl fmt::Debug for Evolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evolution")
            .field("cxpb", &self.cxpb)
            .field("mutpb", &self.mutpb)
            .field("population", &self.population.len())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
