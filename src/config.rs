use crate::coverage::DistanceMetric;
use crate::engine::RunSettings;
use crate::instance::{pune_areas, ProblemInstance};
use crate::nsga2::NSGA2Config;
use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;

pub const PROGRAM: &str = "evplan";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Root {
    pub evplan: Program,
    #[serde(default)]
    pub optimizer: Optimizer,
    #[serde(default)]
    pub coverage: Coverage,
    #[serde(default)]
    pub instance: Instance,
    #[serde(default)]
    pub report: Report,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Program {
    pub program: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Optimizer {
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    #[serde(default = "default_generations")]
    pub generations: usize,
    #[serde(default = "default_crossover_prob")]
    pub crossover_prob: f64,
    /// Per-bit flip probability (default: 1 / number of stations)
    #[serde(default)]
    pub mutation_prob: Option<f64>,
    /// Probability that a station is selected in the initial population
    #[serde(default = "default_init_density")]
    pub init_density: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_population_size() -> usize { 50 }
fn default_generations() -> usize { 100 }
fn default_crossover_prob() -> f64 { 0.9 }
fn default_init_density() -> f64 { 0.2 }
fn default_seed() -> u64 { 42 }
fn default_true() -> bool { true }

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            generations: default_generations(),
            crossover_prob: default_crossover_prob(),
            mutation_prob: None,
            init_density: default_init_density(),
            seed: default_seed(),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Coverage {
    /// Radius in the metric's unit: degrees (planar) or km (haversine)
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_radius() -> f64 { 0.03 }

impl Default for Coverage {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            metric: DistanceMetric::Planar,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Instance {
    /// "pune" (synthetic preset) or "file"
    #[serde(default = "default_source")]
    pub source: String,
    /// JSON instance, required when source = "file"
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_total_users")]
    pub total_users: usize,
    #[serde(default = "default_instance_seed")]
    pub seed: u64,
}

fn default_source() -> String {
    "pune".to_string()
}
fn default_total_users() -> usize { 200 }
fn default_instance_seed() -> u64 { 7 }

impl Default for Instance {
    fn default() -> Self {
        Self {
            source: default_source(),
            path: None,
            total_users: default_total_users(),
            seed: default_instance_seed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Report {
    /// Materialize dominated individuals too, not only the Pareto set
    #[serde(default)]
    pub include_dominated: bool,
    /// Rows of the Pareto table printed to stderr
    #[serde(default = "default_top")]
    pub top: usize,
}

fn default_top() -> usize { 10 }

impl Default for Report {
    fn default() -> Self {
        Self {
            include_dominated: false,
            top: default_top(),
        }
    }
}

impl Root {
    /// Read, parse and validate a TOML config. Returns the raw text as well,
    /// for hashing into run manifests.
    pub fn load(path: &str) -> Result<(Self, String)> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path))?;
        let cfg: Root = toml::from_str(&text)
            .with_context(|| format!("failed to parse config: {}", path))?;
        cfg.validate()?;
        Ok((cfg, text))
    }

    pub fn validate(&self) -> Result<()> {
        if self.evplan.program != PROGRAM {
            bail!("evplan.program must be {}", PROGRAM);
        }
        if self.optimizer.population_size == 0 || self.optimizer.population_size > 10_000 {
            bail!("optimizer.population_size must be in [1, 10000]");
        }
        if self.optimizer.generations == 0 || self.optimizer.generations > 100_000 {
            bail!("optimizer.generations must be in [1, 100000]");
        }
        if !(0.0..=1.0).contains(&self.optimizer.crossover_prob) {
            bail!("optimizer.crossover_prob must be in [0, 1]");
        }
        if let Some(p) = self.optimizer.mutation_prob {
            if !(0.0..=1.0).contains(&p) {
                bail!("optimizer.mutation_prob must be in [0, 1]");
            }
        }
        if !(0.0..=1.0).contains(&self.optimizer.init_density) {
            bail!("optimizer.init_density must be in [0, 1]");
        }
        if !self.coverage.radius.is_finite() || self.coverage.radius < 0.0 {
            bail!("coverage.radius must be finite and non-negative");
        }

        match self.instance.source.as_str() {
            "pune" => {}
            "file" => {
                if self.instance.path.is_none() {
                    bail!("instance.path is required when instance.source = 'file'");
                }
            }
            other => bail!("instance.source must be 'pune' or 'file' (got '{}')", other),
        }

        Ok(())
    }

    pub fn optimizer_config(&self) -> NSGA2Config {
        NSGA2Config {
            pop_size: self.optimizer.population_size,
            generations: self.optimizer.generations,
            crossover_prob: self.optimizer.crossover_prob,
            mutation_prob: self.optimizer.mutation_prob,
            init_density: self.optimizer.init_density,
            seed: self.optimizer.seed,
            parallel: self.optimizer.parallel,
        }
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            optimizer: self.optimizer_config(),
            coverage_radius: self.coverage.radius,
            metric: self.coverage.metric,
            include_dominated: self.report.include_dominated,
        }
    }

    /// The problem instance named by `[instance]`.
    pub fn build_instance(&self) -> Result<ProblemInstance> {
        match self.instance.source.as_str() {
            "file" => {
                let path = self
                    .instance
                    .path
                    .as_deref()
                    .context("instance.path required for source = 'file'")?;
                ProblemInstance::from_json_file(path)
            }
            _ => {
                let mut rng = StdRng::seed_from_u64(self.instance.seed);
                Ok(ProblemInstance::generate(
                    &pune_areas(),
                    self.instance.total_users,
                    &mut rng,
                ))
            }
        }
    }
}

impl Default for Root {
    fn default() -> Self {
        Self {
            evplan: Program {
                program: PROGRAM.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            optimizer: Optimizer::default(),
            coverage: Coverage::default(),
            instance: Instance::default(),
            report: Report::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[evplan]
program = "evplan"
version = "0.1.0"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg: Root = toml::from_str(MINIMAL).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.optimizer.population_size, 50);
        assert_eq!(cfg.optimizer.generations, 100);
        assert_eq!(cfg.coverage.metric, DistanceMetric::Planar);
        assert_eq!(cfg.instance.source, "pune");
        assert_eq!(cfg.report.top, 10);
    }

    #[test]
    fn test_full_config() {
        let text = r#"
[evplan]
program = "evplan"
version = "0.1.0"

[optimizer]
population_size = 80
generations = 200
mutation_prob = 0.05
seed = 3
parallel = false

[coverage]
radius = 2.5
metric = "haversine"

[instance]
source = "file"
path = "data/instance.json"
"#;
        let cfg: Root = toml::from_str(text).unwrap();
        cfg.validate().unwrap();
        let settings = cfg.run_settings();
        assert_eq!(settings.optimizer.pop_size, 80);
        assert_eq!(settings.optimizer.mutation_prob, Some(0.05));
        assert!(!settings.optimizer.parallel);
        assert_eq!(settings.metric, DistanceMetric::Haversine);
        assert_eq!(settings.coverage_radius, 2.5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = Root::default();
        cfg.validate().unwrap();

        cfg.optimizer.population_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Root::default();
        cfg.optimizer.generations = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Root::default();
        cfg.coverage.radius = -1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Root::default();
        cfg.instance.source = "file".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = Root::default();
        cfg.evplan.program = "other".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_shipped_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/pune.toml");
        let (cfg, text) = Root::load(path).unwrap();
        assert!(text.contains("[optimizer]"));
        assert_eq!(cfg.coverage.radius, 0.03);
        assert_eq!(cfg.instance.total_users, 200);
    }

    #[test]
    fn test_preset_instance_is_seeded() {
        let cfg = Root::default();
        let a = cfg.build_instance().unwrap();
        let b = cfg.build_instance().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.num_stations(), 10);
    }
}
