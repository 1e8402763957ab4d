//! Pareto dominance, fast non-dominated sorting and crowding distance.
//!
//! Everything here works on objective vectors in "minimize" form, so the code
//! is independent of what the objectives mean and of how many there are.
//!
//! References:
//! - Deb, K., et al. "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II" (2002)

use std::cmp::Ordering;

/// `a` dominates `b`: no worse in every objective and strictly better in one.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b.iter()) {
        if x > y {
            return false;
        }
        if x < y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Partition `points` into fronts F0, F1, ... using O(N²) pairwise comparisons.
///
/// Every index appears in exactly one front. Within a front, indices are in
/// ascending order.
pub fn fast_non_dominated_sort<P: AsRef<[f64]>>(points: &[P]) -> Vec<Vec<usize>> {
    let n = points.len();

    // Domination counts and dominated sets
    let mut domination_count: Vec<usize> = vec![0; n];
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            let (pi, pj) = (points[i].as_ref(), points[j].as_ref());
            if dominates(pi, pj) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(pj, pi) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();

    while !current.is_empty() {
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }

    fronts
}

/// Rank (front index) of every point, given the fronts of the same population.
pub fn ranks_from_fronts(fronts: &[Vec<usize>], n: usize) -> Vec<usize> {
    let mut ranks = vec![usize::MAX; n];
    for (rank, front) in fronts.iter().enumerate() {
        for &i in front {
            ranks[i] = rank;
        }
    }
    ranks
}

/// Crowding distance of each member of `front`, returned in `front` order.
///
/// Boundary members of every objective get `f64::INFINITY`; interior members
/// accumulate the gap between their neighbours, normalized by the objective's
/// range over the front.
pub fn crowding_distances<P: AsRef<[f64]>>(points: &[P], front: &[usize]) -> Vec<f64> {
    let m = front.len();
    if m <= 2 {
        return vec![f64::INFINITY; m];
    }

    let mut distance = vec![0.0; m];
    let n_obj = points[front[0]].as_ref().len();
    let value = |pos: usize, k: usize| points[front[pos]].as_ref()[k];

    let mut order: Vec<usize> = (0..m).collect();
    for k in 0..n_obj {
        order.sort_by(|&a, &b| value(a, k).total_cmp(&value(b, k)));

        let first = order[0];
        let last = order[m - 1];
        distance[first] = f64::INFINITY;
        distance[last] = f64::INFINITY;

        let range = value(last, k) - value(first, k);
        if range.abs() <= 1e-10 {
            continue;
        }

        for w in 1..(m - 1) {
            let curr = order[w];
            if distance[curr].is_infinite() {
                continue;
            }
            distance[curr] += (value(order[w + 1], k) - value(order[w - 1], k)) / range;
        }
    }

    distance
}

/// Crowded-comparison order: lower rank first, then larger crowding distance.
/// `Ordering::Less` means `a` is preferred.
pub fn crowded_compare(rank_a: usize, crowd_a: f64, rank_b: usize, crowd_b: f64) -> Ordering {
    rank_a
        .cmp(&rank_b)
        .then_with(|| crowd_b.total_cmp(&crowd_a))
}
