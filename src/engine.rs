//! One optimization run over a problem instance: evaluator setup, the NSGA-II
//! loop and projection of the result into the response payload.

use crate::coverage::{CoverageEvaluator, DistanceMetric};
use crate::error::Result;
use crate::instance::ProblemInstance;
use crate::nsga2::{GenerationStats, NSGA2Config, RunResult, NSGA2};
use crate::report::{build_response, OptimizationRequest, OptimizationResponse};
use log::warn;
use std::ops::ControlFlow;

#[derive(Clone, Debug, PartialEq)]
pub struct RunSettings {
    pub optimizer: NSGA2Config,
    pub coverage_radius: f64,
    pub metric: DistanceMetric,
    pub include_dominated: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            optimizer: NSGA2Config::default(),
            coverage_radius: 0.03,
            metric: DistanceMetric::Planar,
            include_dominated: false,
        }
    }
}

impl RunSettings {
    /// Settings for `request`, falling back to `self` for anything the request
    /// leaves unset.
    pub fn with_request(&self, request: &OptimizationRequest) -> Result<Self> {
        Ok(Self {
            optimizer: request.to_config(&self.optimizer)?,
            coverage_radius: request.coverage_radius.unwrap_or(self.coverage_radius),
            metric: request.metric.unwrap_or(self.metric),
            include_dominated: self.include_dominated,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Outcome {
    pub result: RunResult,
    pub response: OptimizationResponse,
}

pub fn run(instance: &ProblemInstance, settings: &RunSettings) -> Result<Outcome> {
    run_with(instance, settings, |_| ControlFlow::Continue(()))
}

/// As [`run`], with a per-generation observer that may cancel the run.
pub fn run_with<O>(
    instance: &ProblemInstance,
    settings: &RunSettings,
    observer: O,
) -> Result<Outcome>
where
    O: FnMut(&GenerationStats) -> ControlFlow<()>,
{
    let evaluator = CoverageEvaluator::new(instance, settings.coverage_radius, settings.metric)?;
    if let Some(reason) = instance.degenerate_reason() {
        warn!("degenerate instance: {}", reason);
    }
    let mut optimizer = NSGA2::new(settings.optimizer.clone(), &evaluator)?;
    let result = optimizer.optimize_with(instance.num_users(), instance.total_cost(), observer)?;
    let response = build_response(instance, &result, settings.include_dominated);
    Ok(Outcome { result, response })
}
