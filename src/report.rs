//! Request and response payloads exchanged with the presentation layer, and
//! the projection of a finished run into display-ready solutions.

use crate::coverage::{coverage_percentage, DistanceMetric};
use crate::error::{EngineError, Result};
use crate::instance::{ProblemInstance, Station, User};
use crate::nsga2::{NSGA2Config, RunResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Population size a client sends when its form is left untouched.
pub const DEFAULT_POPULATION_SIZE: i64 = 50;
pub const DEFAULT_GENERATIONS: i64 = 100;
pub const DEFAULT_COVERAGE_RADIUS: f64 = 0.03;

/// Optimization request as received from a client.
///
/// Every field is optional: a field left out keeps the value of the run
/// settings it is overlaid on. Integer fields are signed so that out-of-range
/// values can be reported instead of wrapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generations: Option<i64>,
    /// In the unit of `metric` (degrees for planar, km for haversine)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<DistanceMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl OptimizationRequest {
    /// The request a client sends with its form defaults (50 / 100 / 0.03).
    pub fn client_defaults() -> Self {
        Self {
            population_size: Some(DEFAULT_POPULATION_SIZE),
            generations: Some(DEFAULT_GENERATIONS),
            coverage_radius: Some(DEFAULT_COVERAGE_RADIUS),
            ..Default::default()
        }
    }

    /// Overlay the request on `base`, rejecting invalid values before any
    /// generation runs.
    pub fn to_config(&self, base: &NSGA2Config) -> Result<NSGA2Config> {
        let pop_size = match self.population_size {
            Some(n) => usize::try_from(n)
                .ok()
                .filter(|&n| n > 0)
                .ok_or(EngineError::InvalidPopulationSize(n))?,
            None => base.pop_size,
        };
        let generations = match self.generations {
            Some(n) => usize::try_from(n)
                .ok()
                .filter(|&n| n > 0)
                .ok_or(EngineError::InvalidGenerationCount(n))?,
            None => base.generations,
        };
        if let Some(r) = self.coverage_radius {
            if !r.is_finite() || r < 0.0 {
                return Err(EngineError::InvalidCoverageRadius(r));
            }
        }

        let config = NSGA2Config {
            pop_size,
            generations,
            seed: self.seed.unwrap_or(base.seed),
            ..base.clone()
        };
        config.validate()?;
        Ok(config)
    }
}

/// One materialized individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub id: usize,
    pub cost: f64,
    pub coverage: usize,
    pub coverage_percentage: f64,
    pub selected_stations: Vec<Station>,
    /// Non-domination rank within the final population
    #[serde(default)]
    pub rank: usize,
}

/// Point of the cost-vs-coverage plot. `solution_id` names the [`Solution`]
/// the point was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParetoPoint {
    pub cost: f64,
    pub coverage: usize,
    pub coverage_percentage: f64,
    pub solution_id: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResponse {
    pub solutions: Vec<Solution>,
    /// Ascending cost
    pub pareto_front: Vec<ParetoPoint>,
    pub users: Vec<User>,
    pub potential_stations: Vec<Station>,
}

impl OptimizationResponse {
    pub fn solution(&self, id: usize) -> Option<&Solution> {
        self.solutions.iter().find(|s| s.id == id)
    }

    /// Solution under a clicked plot point, matched on cost and coverage
    /// percentage within `tolerance`.
    pub fn solution_at(
        &self,
        cost: f64,
        coverage_percentage: f64,
        tolerance: f64,
    ) -> Option<&Solution> {
        self.solutions.iter().find(|s| {
            (s.cost - cost).abs() <= tolerance
                && (s.coverage_percentage - coverage_percentage).abs() <= tolerance
        })
    }
}

/// Project the final population into the response payload.
///
/// Solutions are the non-dominated individuals (every individual when
/// `include_dominated` is set), one per distinct chromosome, ordered by rank,
/// then ascending cost, then descending coverage. Pareto points are the
/// distinct rank-0 objective pairs in ascending cost.
pub fn build_response(
    instance: &ProblemInstance,
    result: &RunResult,
    include_dominated: bool,
) -> OptimizationResponse {
    let num_users = instance.num_users();

    let mut seen = HashSet::new();
    let mut members: Vec<_> = result
        .population
        .iter()
        .filter(|ind| include_dominated || ind.rank == 0)
        .filter(|ind| seen.insert(&ind.chromosome))
        .collect();
    members.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.objectives.cost.total_cmp(&b.objectives.cost))
            .then_with(|| b.objectives.coverage.cmp(&a.objectives.coverage))
    });

    let solutions: Vec<Solution> = members
        .iter()
        .enumerate()
        .map(|(id, ind)| Solution {
            id,
            cost: ind.objectives.cost,
            coverage: ind.objectives.coverage,
            coverage_percentage: coverage_percentage(ind.objectives.coverage, num_users),
            selected_stations: ind
                .chromosome
                .selected()
                .map(|j| instance.stations[j].clone())
                .collect(),
            rank: ind.rank,
        })
        .collect();

    // Solutions are already in ascending cost within rank 0
    let mut pareto_front: Vec<ParetoPoint> = Vec::new();
    for s in solutions.iter().filter(|s| s.rank == 0) {
        let duplicate = pareto_front
            .iter()
            .any(|p| p.cost == s.cost && p.coverage == s.coverage);
        if !duplicate {
            pareto_front.push(ParetoPoint {
                cost: s.cost,
                coverage: s.coverage,
                coverage_percentage: s.coverage_percentage,
                solution_id: s.id,
            });
        }
    }

    OptimizationResponse {
        solutions,
        pareto_front,
        users: instance.users.clone(),
        potential_stations: instance.stations.clone(),
    }
}
