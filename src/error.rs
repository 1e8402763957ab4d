use thiserror::Error;

/// Errors produced by the optimization engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("population size must be greater than zero (received {0})")]
    InvalidPopulationSize(i64),
    #[error("number of generations must be greater than zero (received {0})")]
    InvalidGenerationCount(i64),
    #[error("coverage radius must be a finite, non-negative number (received {0})")]
    InvalidCoverageRadius(f64),
    #[error("{name} must be a probability in [0, 1] (received {value})")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("chromosome length {found} does not match the {expected} candidate stations")]
    ChromosomeLength { expected: usize, found: usize },
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    #[error("run cancelled after generation {generation}")]
    Cancelled { generation: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;
