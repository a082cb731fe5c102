//! Extremal candidate selection.
//!
//! Derivatives of candidate contexts are points in the probability simplex.
//! The seed of a learned automaton is taken from the points on the boundary
//! of their cloud, where the most distinctive contexts sit.

use std::collections::BTreeSet;

/// Turns smaller than this count as straight.
const COLLINEAR_TOLERANCE: f64 = 1e-12;

/// Indices of eligible points within `epsilon` of a per-axis minimum or
/// maximum.
///
/// A point is eligible when it occurred at least `min_occurrences` times.
pub fn dimensional_extremes(
    points: &[Vec<f64>],
    occurrences: &[u64],
    epsilon: f64,
    min_occurrences: u64,
) -> BTreeSet<usize> {
    let eligible = eligible_points(points, occurrences, min_occurrences);
    let mut extremes = BTreeSet::new();
    let Some(&first) = eligible.first() else {
        return extremes;
    };
    for axis in 0..points[first].len() {
        let (mut low, mut high) = (f64::INFINITY, f64::NEG_INFINITY);
        for &i in &eligible {
            low = low.min(points[i][axis]);
            high = high.max(points[i][axis]);
        }
        for &i in &eligible {
            let value = points[i][axis];
            if value <= low + epsilon || value >= high - epsilon {
                extremes.insert(i);
            }
        }
    }
    extremes
}

/// Hull vertices of the eligible points, plus points within `epsilon` of one.
///
/// Only two-dimensional points get a real hull; other dimensions use
/// [`dimensional_extremes`].
// TODO: replace the per-axis fallback with an n-dimensional quickhull.
pub fn quickhull(
    points: &[Vec<f64>],
    occurrences: &[u64],
    epsilon: f64,
    min_occurrences: u64,
) -> BTreeSet<usize> {
    let eligible = eligible_points(points, occurrences, min_occurrences);
    let Some(&first) = eligible.first() else {
        return BTreeSet::new();
    };
    if points[first].len() != 2 {
        return dimensional_extremes(points, occurrences, epsilon, min_occurrences);
    }

    let vertices = hull_2d(points, &eligible);
    eligible
        .iter()
        .copied()
        .filter(|&i| {
            vertices.iter().any(|&v| {
                let dx = points[i][0] - points[v][0];
                let dy = points[i][1] - points[v][1];
                (dx * dx + dy * dy).sqrt() <= epsilon
            })
        })
        .collect()
}

fn eligible_points(points: &[Vec<f64>], occurrences: &[u64], min_occurrences: u64) -> Vec<usize> {
    (0..points.len())
        .filter(|&i| occurrences.get(i).copied().unwrap_or(0) >= min_occurrences)
        .collect()
}

/// Monotone chain over `indices`; collinear points are not vertices.
fn hull_2d(points: &[Vec<f64>], indices: &[usize]) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| {
        points[a][0]
            .total_cmp(&points[b][0])
            .then(points[a][1].total_cmp(&points[b][1]))
    });
    sorted.dedup_by(|a, b| points[*a] == points[*b]);
    if sorted.len() <= 2 {
        return sorted;
    }

    let cross = |o: usize, a: usize, b: usize| {
        (points[a][0] - points[o][0]) * (points[b][1] - points[o][1])
            - (points[a][1] - points[o][1]) * (points[b][0] - points[o][0])
    };
    let mut lower: Vec<usize> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2
            && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= COLLINEAR_TOLERANCE
        {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<usize> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2
            && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= COLLINEAR_TOLERANCE
        {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
