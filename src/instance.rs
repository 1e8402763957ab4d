//! Problem instance: demand points (users) and candidate station sites.
//!
//! An instance is built once per run, either from the built-in city preset via
//! seeded synthetic generation or from a JSON file, and is read-only afterwards.

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Jitter applied around an area centre when placing synthetic users (degrees).
pub const USER_JITTER_DEG: f64 = 0.01;
/// Fixed part of a synthetic station's installation cost.
pub const BASE_STATION_COST: f64 = 100_000.0;
/// Cost added per unit of area density.
pub const DENSITY_COST_FACTOR: f64 = 5_000.0;
/// Maximum absolute random adjustment applied to a synthetic station cost.
pub const COST_NOISE: i64 = 20_000;

/// A fixed demand point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub lat: f64,
    pub lon: f64,
}

/// A candidate build site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: usize,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub cost: f64,
    /// Site-specific coverage radius overriding the run's radius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

/// A city district used to seed synthetic users and stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Relative EV-user density
    pub density: u32,
}

impl Area {
    fn new(name: &str, lat: f64, lon: f64, density: u32) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
            density,
        }
    }
}

/// Built-in preset: Pune districts with relative user density.
pub fn pune_areas() -> Vec<Area> {
    vec![
        Area::new("Hinjawadi", 18.595, 73.735, 20),
        Area::new("Baner", 18.563, 73.789, 15),
        Area::new("Kothrud", 18.507, 73.807, 10),
        Area::new("Hadapsar", 18.498, 73.941, 12),
        Area::new("Viman Nagar", 18.565, 73.911, 10),
        Area::new("Nigdi", 18.650, 73.770, 8),
        Area::new("Koregaon Park", 18.536, 73.896, 18),
        Area::new("Aundh", 18.570, 73.800, 14),
        Area::new("Wakad", 18.600, 73.750, 16),
        Area::new("Pimpri", 18.629, 73.813, 12),
    ]
}

/// Distribute `total_users` across areas proportionally to density.
///
/// Each area receives `floor(density / total_density * total_users)` users, so the
/// result may hold slightly fewer than `total_users` points.
pub fn generate_users<R: Rng>(areas: &[Area], total_users: usize, rng: &mut R) -> Vec<User> {
    let total_density: u32 = areas.iter().map(|a| a.density).sum();
    if total_density == 0 {
        return Vec::new();
    }

    let mut users = Vec::with_capacity(total_users);
    for area in areas {
        let share = area.density as f64 / total_density as f64;
        let n = (share * total_users as f64) as usize;
        for _ in 0..n {
            users.push(User {
                lat: area.lat + rng.gen_range(-USER_JITTER_DEG..=USER_JITTER_DEG),
                lon: area.lon + rng.gen_range(-USER_JITTER_DEG..=USER_JITTER_DEG),
            });
        }
    }
    users
}

/// One candidate station per area; denser areas are more expensive to build in.
pub fn generate_stations<R: Rng>(areas: &[Area], rng: &mut R) -> Vec<Station> {
    areas
        .iter()
        .enumerate()
        .map(|(i, area)| {
            let base = BASE_STATION_COST + area.density as f64 * DENSITY_COST_FACTOR;
            let noise = rng.gen_range(-COST_NOISE..=COST_NOISE) as f64;
            Station {
                id: i,
                name: area.name.clone(),
                lat: area.lat,
                lon: area.lon,
                cost: base + noise,
                radius: None,
            }
        })
        .collect()
}

/// The fixed set of users and candidate stations for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemInstance {
    pub users: Vec<User>,
    pub stations: Vec<Station>,
}

impl ProblemInstance {
    pub fn new(users: Vec<User>, stations: Vec<Station>) -> Self {
        Self { users, stations }
    }

    /// Synthetic instance over `areas`. Users are drawn before stations.
    pub fn generate<R: Rng>(areas: &[Area], total_users: usize, rng: &mut R) -> Self {
        let users = generate_users(areas, total_users, rng);
        let stations = generate_stations(areas, rng);
        Self { users, stations }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read instance: {}", path.display()))?;
        let instance: ProblemInstance = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse instance: {}", path.display()))?;
        instance.validate()?;
        Ok(instance)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write instance: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (i, u) in self.users.iter().enumerate() {
            if !u.lat.is_finite() || !u.lon.is_finite() {
                bail!("users[{}] has non-finite coordinates", i);
            }
        }
        for (i, s) in self.stations.iter().enumerate() {
            if !s.lat.is_finite() || !s.lon.is_finite() {
                bail!("stations[{}] ({}) has non-finite coordinates", i, s.name);
            }
            if !s.cost.is_finite() || s.cost < 0.0 {
                bail!("stations[{}] ({}) cost must be finite and non-negative", i, s.name);
            }
            if let Some(r) = s.radius {
                if !r.is_finite() || r < 0.0 {
                    bail!("stations[{}] ({}) radius must be finite and non-negative", i, s.name);
                }
            }
        }
        Ok(())
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// Search dimensionality: one chromosome bit per candidate station.
    pub fn num_stations(&self) -> usize {
        self.stations.len()
    }

    /// Cost of building every candidate station.
    pub fn total_cost(&self) -> f64 {
        self.stations.iter().map(|s| s.cost).sum()
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate_reason().is_some()
    }

    /// Why every selection scores the same coverage, if it does.
    pub fn degenerate_reason(&self) -> Option<&'static str> {
        match (self.users.is_empty(), self.stations.is_empty()) {
            (true, true) => Some("no users and no candidate stations"),
            (true, false) => Some("no users, coverage is 0 for every selection"),
            (false, true) => Some("no candidate stations, every chromosome is the empty selection"),
            (false, false) => None,
        }
    }
}
