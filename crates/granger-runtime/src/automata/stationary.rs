//! Stationary distributions of transition tables.
//!
//! The exact route solves `π P = π, Σ π = 1` as an over-determined linear
//! system. When that system has no unique distribution as its solution the
//! distribution is estimated from a seeded random walk instead.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use tracing::debug;

use granger_core::numeric::fix_last_entry;

use super::sample_index;
use super::table::TransitionTable;

/// Length of the fallback random walk.
pub const SIMULATION_STEPS: usize = 10_000;

/// Singular values at or below this count as zero in rank tests.
const RANK_TOLERANCE: f64 = 1e-9;

/// Solution entries below this are not a distribution.
const NEGATIVE_TOLERANCE: f64 = 1e-9;

/// Tables above this size skip the dense solve.
const MAX_SOLVE_STATES: usize = 1024;

/// Stationary distribution of `table`, falling back to simulation.
pub fn stationary_distribution(table: &TransitionTable, rng: &mut StdRng) -> Vec<f64> {
    let n = table.nr_states();
    if n > MAX_SOLVE_STATES {
        debug!(states = n, "table too large for a dense solve, simulating");
        return simulate_stationary(table, rng, SIMULATION_STEPS);
    }
    match solve_stationary(&table.state_matrix()) {
        Some(distribution) => distribution,
        None => {
            debug!(
                states = n,
                steps = SIMULATION_STEPS,
                "stationary system has no unique solution, simulating"
            );
            simulate_stationary(table, rng, SIMULATION_STEPS)
        }
    }
}

/// Solves `A π = b` with `A = [(Pᵗ - I); 1ᵗ]`, `b = [0, …, 0, 1]`.
///
/// Returns `None` unless the system is consistent with full column rank and
/// the least-squares solution is a distribution.
pub fn solve_stationary(p: &[Vec<f64>]) -> Option<Vec<f64>> {
    let n = p.len();
    if n == 0 {
        return None;
    }
    let a = DMatrix::from_fn(n + 1, n, |row, col| {
        if row == n {
            1.0
        } else if row == col {
            p[col][row] - 1.0
        } else {
            p[col][row]
        }
    });
    let b = DVector::from_fn(n + 1, |row, _| if row == n { 1.0 } else { 0.0 });

    let rank = a.rank(RANK_TOLERANCE);
    let mut augmented = a.clone().insert_column(n, 0.0);
    augmented.set_column(n, &b);
    if rank != n || augmented.rank(RANK_TOLERANCE) != rank {
        return None;
    }

    let at = a.transpose();
    let solution = (&at * &a).lu().solve(&(&at * &b))?;
    if solution
        .iter()
        .any(|v| !v.is_finite() || *v < -NEGATIVE_TOLERANCE)
    {
        return None;
    }

    let mut distribution: Vec<f64> = solution.iter().map(|v| v.max(0.0)).collect();
    let total: f64 = distribution.iter().sum();
    if total <= 0.0 {
        return None;
    }
    for v in &mut distribution {
        *v /= total;
    }
    Some(distribution)
}

/// Visit frequencies of a `steps`-long walk from state 0.
pub fn simulate_stationary(table: &TransitionTable, rng: &mut StdRng, steps: usize) -> Vec<f64> {
    let n = table.nr_states();
    let mut visits = vec![0u64; n];
    let mut cursor = 0;
    for _ in 0..steps {
        let symbol = sample_index(rng, table.weight_row(cursor));
        cursor = table.edge(cursor, symbol);
        visits[cursor] += 1;
    }
    let mut distribution: Vec<f64> = visits
        .into_iter()
        .map(|v| v as f64 / steps.max(1) as f64)
        .collect();
    fix_last_entry(&mut distribution);
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automata::table::Transition;
    use rand::SeedableRng;

    fn assert_distribution(pi: &[f64]) {
        let total: f64 = pi.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "sum is {total}");
        assert!(pi.iter().all(|&v| v >= -1e-9), "negative entry in {pi:?}");
    }

    #[test]
    fn test_solve_two_state_chain() {
        // P = [[0.9, 0.1], [0.5, 0.5]] has π = [5/6, 1/6]
        let pi = solve_stationary(&[vec![0.9, 0.1], vec![0.5, 0.5]]).unwrap();
        assert_distribution(&pi);
        assert!((pi[0] - 5.0 / 6.0).abs() < 1e-9);
        assert!((pi[1] - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_rank_deficient_system_is_rejected() {
        // Two absorbing states: every mixture is stationary.
        assert!(solve_stationary(&[vec![1.0, 0.0], vec![0.0, 1.0]]).is_none());
    }

    #[test]
    fn test_fallback_walk_stays_in_first_absorbing_state() {
        let table = TransitionTable::from_transitions(
            2,
            [Transition::new(0, 0, 1.0, 0), Transition::new(1, 1, 1.0, 1)],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let pi = stationary_distribution(&table, &mut rng);
        assert_distribution(&pi);
        assert_eq!(pi, vec![1.0, 0.0]);
    }

    #[test]
    fn test_simulation_approximates_solution() {
        let table = TransitionTable::from_transitions(
            2,
            [
                Transition::new(0, 0, 0.9, 0),
                Transition::new(0, 1, 0.1, 1),
                Transition::new(1, 0, 0.5, 0),
                Transition::new(1, 1, 0.5, 1),
            ],
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let simulated = simulate_stationary(&table, &mut rng, 50_000);
        assert_distribution(&simulated);
        assert!((simulated[0] - 5.0 / 6.0).abs() < 0.02);
    }
}
