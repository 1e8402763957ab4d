//! NSGA-II Multi-Objective Optimization Algorithm
//!
//! Generational driver of the Non-dominated Sorting Genetic Algorithm II over
//! station-selection chromosomes: binary tournament selection, uniform
//! crossover, bit-flip mutation, parent/offspring merge and elitist truncation
//! by rank and crowding distance.
//!
//! A run owns its population and its seeded random source; the objective
//! function is only borrowed, so independent runs may share one instance.
//!
//! References:
//! - Deb, K., et al. "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II" (2002)

use crate::chromosome::Chromosome;
use crate::coverage::{ObjectiveFunction, Objectives};
use crate::dominance::{
    crowded_compare, crowding_distances, dominates, fast_non_dominated_sort, ranks_from_fronts,
};
use crate::error::{EngineError, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::ops::ControlFlow;

/// Individual in the population
#[derive(Clone, Debug)]
pub struct Individual {
    pub chromosome: Chromosome,
    pub objectives: Objectives,
    /// Objective values in minimize form: [cost, -coverage]
    pub f: Vec<f64>,
    /// Pareto rank (0 = non-dominated front)
    pub rank: usize,
    pub crowding_distance: f64,
}

impl Individual {
    pub fn new(chromosome: Chromosome, objectives: Objectives) -> Self {
        Self {
            f: objectives.minimization(),
            chromosome,
            objectives,
            rank: usize::MAX,
            crowding_distance: 0.0,
        }
    }

    pub fn dominates(&self, other: &Individual) -> bool {
        dominates(&self.f, &other.f)
    }
}

/// NSGA-II configuration
#[derive(Clone, Debug, PartialEq)]
pub struct NSGA2Config {
    pub pop_size: usize,
    pub generations: usize,
    /// Probability that a parent pair is recombined rather than copied
    pub crossover_prob: f64,
    /// Per-bit flip probability; `None` means 1 / number of stations
    pub mutation_prob: Option<f64>,
    /// Probability that a bit is set in the initial population
    pub init_density: f64,
    /// Seed for reproducibility
    pub seed: u64,
    /// Evaluate offspring on the rayon pool
    pub parallel: bool,
}

impl Default for NSGA2Config {
    fn default() -> Self {
        Self {
            pop_size: 50,
            generations: 100,
            crossover_prob: 0.9,
            mutation_prob: None,
            init_density: 0.2,
            seed: 42,
            parallel: true,
        }
    }
}

impl NSGA2Config {
    pub fn validate(&self) -> Result<()> {
        if self.pop_size == 0 {
            return Err(EngineError::InvalidPopulationSize(0));
        }
        if self.generations == 0 {
            return Err(EngineError::InvalidGenerationCount(0));
        }
        check_probability("crossover_prob", self.crossover_prob)?;
        check_probability("init_density", self.init_density)?;
        if let Some(p) = self.mutation_prob {
            check_probability("mutation_prob", p)?;
        }
        Ok(())
    }

    /// Effective per-bit mutation rate for chromosomes of length `dimension`.
    pub fn mutation_rate(&self, dimension: usize) -> f64 {
        match self.mutation_prob {
            Some(p) => p,
            None if dimension == 0 => 0.0,
            None => 1.0 / dimension as f64,
        }
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EngineError::InvalidProbability { name, value });
    }
    Ok(())
}

/// Snapshot of the surviving population after one generation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub front_size: usize,
    pub min_cost: f64,
    pub max_coverage: usize,
    /// Cheapest individual serving every user, if any
    pub best_full_coverage_cost: Option<f64>,
    pub hypervolume: f64,
}

impl GenerationStats {
    pub fn collect(
        generation: usize,
        population: &[Individual],
        num_users: usize,
        total_cost: f64,
    ) -> Self {
        let front: Vec<&[f64]> = population
            .iter()
            .filter(|ind| ind.rank == 0)
            .map(|ind| ind.f.as_slice())
            .collect();

        let min_cost = population
            .iter()
            .map(|ind| ind.objectives.cost)
            .min_by(|a, b| a.total_cmp(b))
            .unwrap_or(0.0);
        let max_coverage = population
            .iter()
            .map(|ind| ind.objectives.coverage)
            .max()
            .unwrap_or(0);
        let best_full_coverage_cost = population
            .iter()
            .filter(|ind| num_users > 0 && ind.objectives.coverage == num_users)
            .map(|ind| ind.objectives.cost)
            .min_by(|a, b| a.total_cmp(b));

        Self {
            generation,
            front_size: front.len(),
            min_cost,
            max_coverage,
            best_full_coverage_cost,
            hypervolume: hypervolume_2d(&front, (total_cost + 1.0, 0.0)),
        }
    }
}

/// Outcome of a completed run.
#[derive(Clone, Debug)]
pub struct RunResult {
    /// Final population, ranked and crowded among itself
    pub population: Vec<Individual>,
    /// One entry per generation, generation 0 included
    pub history: Vec<GenerationStats>,
    pub generations: usize,
}

impl RunResult {
    /// Rank-0 (non-dominated) members of the final population.
    pub fn pareto_front(&self) -> Vec<&Individual> {
        self.population.iter().filter(|ind| ind.rank == 0).collect()
    }
}

/// Non-dominated sort plus crowding distance over `population`, in place.
/// Returns the fronts as index lists.
pub fn assign_rank_and_crowding(population: &mut [Individual]) -> Vec<Vec<usize>> {
    let fronts = {
        let points: Vec<&[f64]> = population.iter().map(|ind| ind.f.as_slice()).collect();
        fast_non_dominated_sort(&points)
    };

    let ranks = ranks_from_fronts(&fronts, population.len());
    for (ind, rank) in population.iter_mut().zip(ranks) {
        ind.rank = rank;
    }

    for front in &fronts {
        let distances = {
            let points: Vec<&[f64]> = population.iter().map(|ind| ind.f.as_slice()).collect();
            crowding_distances(&points, front)
        };
        for (&i, d) in front.iter().zip(distances) {
            population[i].crowding_distance = d;
        }
    }

    fronts
}

/// NSGA-II optimizer
pub struct NSGA2<'a, F: ObjectiveFunction> {
    config: NSGA2Config,
    problem: &'a F,
    population: Vec<Individual>,
    rng: StdRng,
    mutation_rate: f64,
}

impl<'a, F: ObjectiveFunction> NSGA2<'a, F> {
    /// Fails fast on an invalid configuration, before anything is evaluated.
    pub fn new(config: NSGA2Config, problem: &'a F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            mutation_rate: config.mutation_rate(problem.dimension()),
            config,
            problem,
            population: Vec::new(),
        })
    }

    /// Get current population
    pub fn get_population(&self) -> &[Individual] {
        &self.population
    }

    /// Random sparse population, evaluated, ranked and crowded (generation 0).
    pub fn initialize_population(&mut self) -> Result<()> {
        let d = self.problem.dimension();
        let chromosomes: Vec<Chromosome> = (0..self.config.pop_size)
            .map(|_| Chromosome::random(d, self.config.init_density, &mut self.rng))
            .collect();

        self.population = self.evaluate(chromosomes)?;
        assign_rank_and_crowding(&mut self.population);
        Ok(())
    }

    /// Evaluate chromosomes, in parallel when configured. Output order matches
    /// input order, and the first failure aborts the whole batch.
    pub fn evaluate(&self, chromosomes: Vec<Chromosome>) -> Result<Vec<Individual>> {
        let problem = self.problem;
        let eval = |c: Chromosome| -> Result<Individual> {
            let objectives = problem.evaluate(&c)?;
            Ok(Individual::new(c, objectives))
        };

        if self.config.parallel {
            chromosomes.into_par_iter().map(eval).collect()
        } else {
            chromosomes.into_iter().map(eval).collect()
        }
    }

    /// Binary tournament on the crowded-comparison order.
    fn tournament_select(&mut self) -> usize {
        let n = self.population.len();
        let a = self.rng.gen_range(0..n);
        let b = self.rng.gen_range(0..n);

        let ind_a = &self.population[a];
        let ind_b = &self.population[b];
        match crowded_compare(
            ind_a.rank,
            ind_a.crowding_distance,
            ind_b.rank,
            ind_b.crowding_distance,
        ) {
            Ordering::Less => a,
            _ => b,
        }
    }

    /// Create and evaluate `pop_size` offspring.
    pub fn create_offspring(&mut self) -> Result<Vec<Individual>> {
        let n = self.config.pop_size;
        let mut children: Vec<Chromosome> = Vec::with_capacity(n);

        while children.len() < n {
            let p1 = self.tournament_select();
            let p2 = self.tournament_select();

            let (mut c1, mut c2) = if self.rng.gen_bool(self.config.crossover_prob) {
                Chromosome::uniform_crossover(
                    &self.population[p1].chromosome,
                    &self.population[p2].chromosome,
                    &mut self.rng,
                )
            } else {
                (
                    self.population[p1].chromosome.clone(),
                    self.population[p2].chromosome.clone(),
                )
            };
            c1.mutate(self.mutation_rate, &mut self.rng);
            c2.mutate(self.mutation_rate, &mut self.rng);

            children.push(c1);
            if children.len() < n {
                children.push(c2);
            }
        }

        self.evaluate(children)
    }

    /// Merge parents with offspring and keep `pop_size` survivors: whole fronts
    /// in rank order, then the least crowded members of the boundary front.
    pub fn environmental_selection(&mut self, offspring: Vec<Individual>) {
        let n = self.config.pop_size;
        let mut combined = std::mem::take(&mut self.population);
        combined.extend(offspring);

        let fronts = assign_rank_and_crowding(&mut combined);

        let mut keep: Vec<usize> = Vec::with_capacity(n);
        for front in &fronts {
            let remaining = n - keep.len();
            if remaining == 0 {
                break;
            }
            if front.len() <= remaining {
                keep.extend_from_slice(front);
                continue;
            }

            let mut boundary = front.clone();
            boundary.sort_by(|&a, &b| {
                combined[b]
                    .crowding_distance
                    .total_cmp(&combined[a].crowding_distance)
            });
            keep.extend_from_slice(&boundary[..remaining]);
            break;
        }

        let mut chosen = vec![false; combined.len()];
        for &i in &keep {
            chosen[i] = true;
        }
        self.population = combined
            .into_iter()
            .zip(chosen)
            .filter_map(|(ind, k)| k.then_some(ind))
            .collect();
    }

    /// Run optimization
    pub fn optimize(&mut self, num_users: usize, total_cost: f64) -> Result<RunResult> {
        self.optimize_with(num_users, total_cost, |_| ControlFlow::Continue(()))
    }

    /// Run optimization, calling `observer` after every generation (0 included).
    /// Returning `ControlFlow::Break(())` stops the run with
    /// [`EngineError::Cancelled`].
    pub fn optimize_with<O>(
        &mut self,
        num_users: usize,
        total_cost: f64,
        mut observer: O,
    ) -> Result<RunResult>
    where
        O: FnMut(&GenerationStats) -> ControlFlow<()>,
    {
        let d = self.problem.dimension();
        info!(
            "NSGA-II start: pop_size={} generations={} stations={} seed={} mutation_rate={:.4}",
            self.config.pop_size, self.config.generations, d, self.config.seed, self.mutation_rate
        );

        let mut history = Vec::with_capacity(self.config.generations + 1);

        self.initialize_population()?;
        self.record(0, num_users, total_cost, &mut history, &mut observer)?;

        for gen in 1..=self.config.generations {
            let offspring = self.create_offspring()?;
            self.environmental_selection(offspring);
            self.record(gen, num_users, total_cost, &mut history, &mut observer)?;
        }

        // Rank the final population among itself for output
        let mut population = self.population.clone();
        assign_rank_and_crowding(&mut population);

        let front_size = population.iter().filter(|ind| ind.rank == 0).count();
        info!("NSGA-II complete: front size {}", front_size);

        Ok(RunResult {
            population,
            history,
            generations: self.config.generations,
        })
    }

    fn record<O>(
        &self,
        generation: usize,
        num_users: usize,
        total_cost: f64,
        history: &mut Vec<GenerationStats>,
        observer: &mut O,
    ) -> Result<()>
    where
        O: FnMut(&GenerationStats) -> ControlFlow<()>,
    {
        let stats = GenerationStats::collect(generation, &self.population, num_users, total_cost);
        debug!(
            "gen {:>4}: front={} min_cost={:.1} max_coverage={} hv={:.4e}",
            stats.generation,
            stats.front_size,
            stats.min_cost,
            stats.max_coverage,
            stats.hypervolume
        );
        let flow = observer(&stats);
        history.push(stats);
        if flow.is_break() {
            return Err(EngineError::Cancelled { generation });
        }
        Ok(())
    }
}

/// Compute hypervolume indicator (2D, minimize form) of a non-dominated set
/// against `ref_point`.
pub fn hypervolume_2d<P: AsRef<[f64]>>(front: &[P], ref_point: (f64, f64)) -> f64 {
    if front.is_empty() {
        return 0.0;
    }

    // Sort by first objective
    let mut sorted: Vec<&[f64]> = front.iter().map(|p| p.as_ref()).collect();
    sorted.sort_by(|a, b| a[0].total_cmp(&b[0]));

    let mut hv = 0.0;
    let mut prev_f2 = ref_point.1;

    for f in sorted {
        if f[0] < ref_point.0 && f[1] < ref_point.1 {
            let width = ref_point.0 - f[0];
            let height = prev_f2 - f[1];
            if height > 0.0 {
                hv += width * height;
                prev_f2 = f[1];
            }
        }
    }

    hv
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every bit independently costs 1 and covers 1 user.
    struct OnesProblem {
        dim: usize,
    }

    impl ObjectiveFunction for OnesProblem {
        fn dimension(&self) -> usize {
            self.dim
        }

        fn evaluate(&self, c: &Chromosome) -> Result<Objectives> {
            let k = c.count_selected();
            Ok(Objectives {
                cost: k as f64,
                coverage: k,
            })
        }
    }

    fn ind(cost: f64, coverage: usize) -> Individual {
        Individual::new(Chromosome::zeros(0), Objectives { cost, coverage })
    }

    #[test]
    fn test_dominance() {
        let a = ind(1.0, 5);
        let b = ind(2.0, 3);
        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        assert!(!a.dominates(&ind(1.0, 5)));
    }

    #[test]
    fn test_config_rejects_zero_sizes() {
        let problem = OnesProblem { dim: 4 };
        let cfg = NSGA2Config {
            pop_size: 0,
            ..Default::default()
        };
        assert_eq!(
            NSGA2::new(cfg, &problem).err(),
            Some(EngineError::InvalidPopulationSize(0))
        );

        let cfg = NSGA2Config {
            generations: 0,
            ..Default::default()
        };
        assert_eq!(
            NSGA2::new(cfg, &problem).err(),
            Some(EngineError::InvalidGenerationCount(0))
        );

        let cfg = NSGA2Config {
            mutation_prob: Some(1.5),
            ..Default::default()
        };
        assert!(matches!(
            NSGA2::new(cfg, &problem),
            Err(EngineError::InvalidProbability { name: "mutation_prob", .. })
        ));
    }

    #[test]
    fn test_default_mutation_rate() {
        let cfg = NSGA2Config::default();
        assert_eq!(cfg.mutation_rate(10), 0.1);
        assert_eq!(cfg.mutation_rate(0), 0.0);
    }

    #[test]
    fn test_initialization() {
        let problem = OnesProblem { dim: 12 };
        let config = NSGA2Config {
            pop_size: 20,
            generations: 1,
            ..Default::default()
        };
        let mut optimizer = NSGA2::new(config, &problem).unwrap();
        optimizer.initialize_population().unwrap();

        let pop = optimizer.get_population();
        assert_eq!(pop.len(), 20);
        for ind in pop {
            assert_eq!(ind.chromosome.len(), 12);
            assert_ne!(ind.rank, usize::MAX);
        }
    }

    #[test]
    fn test_truncation_keeps_pop_size() {
        let problem = OnesProblem { dim: 8 };
        let config = NSGA2Config {
            pop_size: 10,
            generations: 1,
            ..Default::default()
        };
        let mut optimizer = NSGA2::new(config, &problem).unwrap();
        optimizer.initialize_population().unwrap();
        let offspring = optimizer.create_offspring().unwrap();
        assert_eq!(offspring.len(), 10);
        optimizer.environmental_selection(offspring);
        assert_eq!(optimizer.get_population().len(), 10);
    }

    #[test]
    fn test_boundary_front_prefers_extremes() {
        // Front of 5 trade-off points, 3 slots left: both extremes must survive
        let problem = OnesProblem { dim: 0 };
        let config = NSGA2Config {
            pop_size: 3,
            generations: 1,
            ..Default::default()
        };
        let mut optimizer = NSGA2::new(config, &problem).unwrap();
        let offspring = vec![
            ind(0.0, 0),
            ind(1.0, 4),
            ind(2.0, 5),
            ind(3.0, 9),
            ind(10.0, 10),
        ];
        optimizer.environmental_selection(offspring);

        let pop = optimizer.get_population();
        assert_eq!(pop.len(), 3);
        assert!(pop.iter().any(|i| i.objectives.cost == 0.0));
        assert!(pop.iter().any(|i| i.objectives.cost == 10.0));
    }

    #[test]
    fn test_optimize_finds_tradeoff() {
        let problem = OnesProblem { dim: 6 };
        let config = NSGA2Config {
            pop_size: 20,
            generations: 10,
            ..Default::default()
        };
        let mut optimizer = NSGA2::new(config, &problem).unwrap();
        let result = optimizer.optimize(6, 6.0).unwrap();

        assert_eq!(result.population.len(), 20);
        assert_eq!(result.history.len(), 11);
        // Cost equals coverage, so nothing dominates anything else
        assert_eq!(result.pareto_front().len(), 20);
    }

    #[test]
    fn test_cancel_between_generations() {
        let problem = OnesProblem { dim: 6 };
        let config = NSGA2Config {
            pop_size: 10,
            generations: 50,
            ..Default::default()
        };
        let mut optimizer = NSGA2::new(config, &problem).unwrap();
        let mut seen = 0;
        let err = optimizer
            .optimize_with(6, 6.0, |stats| {
                seen += 1;
                if stats.generation == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap_err();
        assert_eq!(err, EngineError::Cancelled { generation: 3 });
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_hypervolume() {
        let front = vec![vec![0.5, 0.5], vec![0.3, 0.8]];
        let hv = hypervolume_2d(&front, (1.0, 1.0));
        // 0.7 * 0.2 + 0.5 * 0.3
        assert!((hv - 0.29).abs() < 1e-12);
        assert!(hv > 0.0 && hv < 1.0);

        let empty: Vec<Vec<f64>> = Vec::new();
        assert_eq!(hypervolume_2d(&empty, (1.0, 1.0)), 0.0);
    }
}
