//! evplan: choose which candidate EV charging stations to build.
//!
//! Two objectives are traded off: total installation cost (minimized) and the
//! number of users within the coverage radius of a selected station
//! (maximized). The search is NSGA-II over bit-vector chromosomes and yields a
//! Pareto front of non-dominated station subsets.

pub mod chromosome;
pub mod config;
pub mod coverage;
pub mod dominance;
pub mod engine;
pub mod error;
pub mod instance;
pub mod io;
pub mod nsga2;
pub mod report;


pub use chromosome::Chromosome;
pub use coverage::{CoverageEvaluator, DistanceMetric, ObjectiveFunction, Objectives};
pub use engine::{run, run_with, Outcome, RunSettings};
pub use error::{EngineError, Result};
pub use instance::{ProblemInstance, Station, User};
pub use nsga2::{GenerationStats, Individual, NSGA2Config, RunResult, NSGA2};
pub use report::{OptimizationRequest, OptimizationResponse, ParetoPoint, Solution};
