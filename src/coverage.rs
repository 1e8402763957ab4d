//! Geometry and coverage evaluation.
//!
//! Maps a chromosome to its objective pair `(cost, coverage)`. The coverage
//! radius is always expressed in the unit of the selected [`DistanceMetric`]:
//! degrees for `Planar`, kilometres for `Haversine`.

use crate::chromosome::Chromosome;
use crate::error::{EngineError, Result};
use crate::instance::{ProblemInstance, Station, User};
use serde::{Deserialize, Serialize};

/// Mean Earth radius (IUGG), km
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Flat-earth Euclidean distance on raw lat/lon, in degrees.
    #[default]
    Planar,
    /// Great-circle distance, in kilometres.
    Haversine,
}

impl DistanceMetric {
    pub fn distance(&self, user: &User, station: &Station) -> f64 {
        match self {
            DistanceMetric::Planar => {
                let dlat = user.lat - station.lat;
                let dlon = user.lon - station.lon;
                (dlat * dlat + dlon * dlon).sqrt()
            }
            DistanceMetric::Haversine => haversine_km(user.lat, user.lon, station.lat, station.lon),
        }
    }

    /// Unit in which distances and the coverage radius are expressed.
    pub fn unit(&self) -> &'static str {
        match self {
            DistanceMetric::Planar => "deg",
            DistanceMetric::Haversine => "km",
        }
    }
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Objective pair of one chromosome. Cost is minimized, coverage maximized.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Objectives {
    pub cost: f64,
    /// Number of distinct users within range of at least one selected station
    pub coverage: usize,
}

impl Objectives {
    /// Both objectives in "minimize" form: `[cost, -coverage]`.
    pub fn minimization(&self) -> Vec<f64> {
        vec![self.cost, -(self.coverage as f64)]
    }
}

/// `100 * coverage / num_users`, or 0 for an instance without users.
pub fn coverage_percentage(coverage: usize, num_users: usize) -> f64 {
    if num_users == 0 {
        0.0
    } else {
        100.0 * coverage as f64 / num_users as f64
    }
}

/// Fitness seam used by the NSGA-II driver.
///
/// Implementations must be pure: the driver evaluates chromosomes concurrently.
pub trait ObjectiveFunction: Sync {
    /// Required chromosome length.
    fn dimension(&self) -> usize;

    fn evaluate(&self, chromosome: &Chromosome) -> Result<Objectives>;
}

/// Reference evaluation straight from the definition: every user is tested
/// against every selected station. A station's own `radius`, when present,
/// replaces `radius`.
pub fn evaluate_selection(
    instance: &ProblemInstance,
    chromosome: &Chromosome,
    radius: f64,
    metric: DistanceMetric,
) -> Objectives {
    let cost = chromosome
        .selected()
        .map(|j| instance.stations[j].cost)
        .sum();
    let coverage = instance
        .users
        .iter()
        .filter(|u| {
            chromosome.selected().any(|j| {
                let s = &instance.stations[j];
                metric.distance(u, s) <= s.radius.unwrap_or(radius)
            })
        })
        .count();
    Objectives { cost, coverage }
}

/// Evaluator with the station-to-user reach table computed once per run.
pub struct CoverageEvaluator<'a> {
    instance: &'a ProblemInstance,
    /// reach[j] = users within range of station j
    reach: Vec<Vec<usize>>,
}

impl<'a> CoverageEvaluator<'a> {
    pub fn new(instance: &'a ProblemInstance, radius: f64, metric: DistanceMetric) -> Result<Self> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(EngineError::InvalidCoverageRadius(radius));
        }

        let reach = instance
            .stations
            .iter()
            .map(|s| {
                let r = s.radius.unwrap_or(radius);
                instance
                    .users
                    .iter()
                    .enumerate()
                    .filter(|(_, u)| metric.distance(u, s) <= r)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();

        Ok(Self { instance, reach })
    }

    /// Users reachable from station `j`.
    pub fn reach(&self, j: usize) -> &[usize] {
        &self.reach[j]
    }

    pub fn coverage_percentage(&self, coverage: usize) -> f64 {
        coverage_percentage(coverage, self.instance.num_users())
    }
}

impl ObjectiveFunction for CoverageEvaluator<'_> {
    fn dimension(&self) -> usize {
        self.instance.num_stations()
    }

    fn evaluate(&self, chromosome: &Chromosome) -> Result<Objectives> {
        if chromosome.len() != self.dimension() {
            return Err(EngineError::ChromosomeLength {
                expected: self.dimension(),
                found: chromosome.len(),
            });
        }

        let mut covered = vec![false; self.instance.num_users()];
        let mut cost = 0.0;
        let mut coverage = 0;
        for j in chromosome.selected() {
            cost += self.instance.stations[j].cost;
            for &u in &self.reach[j] {
                if !covered[u] {
                    covered[u] = true;
                    coverage += 1;
                }
            }
        }

        Ok(Objectives { cost, coverage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::pune_areas;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn station(id: usize, lat: f64, lon: f64, cost: f64) -> Station {
        Station {
            id,
            name: format!("S{}", id),
            lat,
            lon,
            cost,
            radius: None,
        }
    }

    fn triangle_instance() -> ProblemInstance {
        ProblemInstance::new(
            vec![
                User { lat: 0.0, lon: 0.0 },
                User { lat: 0.0, lon: 1.0 },
                User { lat: 1.0, lon: 0.0 },
            ],
            vec![station(0, 0.0, 0.0, 100.0), station(1, 1.0, 1.0, 50.0)],
        )
    }

    #[test]
    fn test_empty_selection_is_free() {
        let inst = triangle_instance();
        let eval = CoverageEvaluator::new(&inst, 1.5, DistanceMetric::Planar).unwrap();
        let obj = eval.evaluate(&Chromosome::zeros(2)).unwrap();
        assert_eq!(obj, Objectives { cost: 0.0, coverage: 0 });
    }

    #[test]
    fn test_users_counted_once() {
        let inst = triangle_instance();
        // Radius 1.0 lets both stations reach (0,1) and (1,0)
        let eval = CoverageEvaluator::new(&inst, 1.0, DistanceMetric::Planar).unwrap();
        let obj = eval
            .evaluate(&Chromosome::from_bits(vec![true, true]))
            .unwrap();
        assert_eq!(obj.cost, 150.0);
        assert_eq!(obj.coverage, 3);
        assert!((eval.coverage_percentage(obj.coverage) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_boundary_distance_is_covered() {
        let inst = triangle_instance();
        let eval = CoverageEvaluator::new(&inst, 1.0, DistanceMetric::Planar).unwrap();
        let obj = eval
            .evaluate(&Chromosome::from_bits(vec![true, false]))
            .unwrap();
        assert_eq!(obj.coverage, 3);
    }

    #[test]
    fn test_matches_reference_evaluation() {
        let inst = crate::instance::ProblemInstance::generate(
            &pune_areas(),
            200,
            &mut StdRng::seed_from_u64(3),
        );
        let mut rng = StdRng::seed_from_u64(4);
        for metric in [DistanceMetric::Planar, DistanceMetric::Haversine] {
            let radius = if metric == DistanceMetric::Planar { 0.03 } else { 3.0 };
            let eval = CoverageEvaluator::new(&inst, radius, metric).unwrap();
            for _ in 0..20 {
                let c = Chromosome::random(inst.num_stations(), 0.4, &mut rng);
                let fast = eval.evaluate(&c).unwrap();
                let slow = evaluate_selection(&inst, &c, radius, metric);
                assert_eq!(fast.coverage, slow.coverage);
                assert!((fast.cost - slow.cost).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_station_radius_override() {
        let mut inst = triangle_instance();
        inst.stations[1].radius = Some(0.5);
        let eval = CoverageEvaluator::new(&inst, 1.5, DistanceMetric::Planar).unwrap();
        assert_eq!(eval.reach(0), &[0, 1, 2]);
        assert!(eval.reach(1).is_empty());

        let only_b = Chromosome::from_bits(vec![false, true]);
        assert_eq!(eval.evaluate(&only_b).unwrap().coverage, 0);
        assert_eq!(
            evaluate_selection(&inst, &only_b, 1.5, DistanceMetric::Planar).coverage,
            0
        );
    }

    #[test]
    fn test_rejects_wrong_length() {
        let inst = triangle_instance();
        let eval = CoverageEvaluator::new(&inst, 1.0, DistanceMetric::Planar).unwrap();
        let err = eval.evaluate(&Chromosome::zeros(3)).unwrap_err();
        assert_eq!(err, EngineError::ChromosomeLength { expected: 2, found: 3 });
    }

    #[test]
    fn test_rejects_negative_radius() {
        let inst = triangle_instance();
        assert!(CoverageEvaluator::new(&inst, -0.1, DistanceMetric::Planar).is_err());
        assert!(CoverageEvaluator::new(&inst, f64::NAN, DistanceMetric::Planar).is_err());
    }

    #[test]
    fn test_no_users_percentage() {
        assert_eq!(coverage_percentage(0, 0), 0.0);
        assert!((coverage_percentage(1, 4) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        // One degree of latitude is ~111.2 km
        let d = haversine_km(18.0, 73.0, 19.0, 73.0);
        assert!((d - 111.19).abs() < 0.1, "got {}", d);
        assert_eq!(haversine_km(18.5, 73.8, 18.5, 73.8), 0.0);
    }

    #[test]
    fn test_minimization_negates_coverage() {
        let obj = Objectives { cost: 12.5, coverage: 7 };
        assert_eq!(obj.minimization(), vec![12.5, -7.0]);
    }
}
