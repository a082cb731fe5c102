//! Property-based tests for automata and candidate selection.

use proptest::prelude::*;

use granger_runtime::automata::stationary::{simulate_stationary, SIMULATION_STEPS};
use granger_runtime::automata::{Automaton, Transition};
use granger_runtime::{dimensional_extremes, make_cross_automaton, LearnerConfig, Symbol};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Random complete tables: `(state, symbol) -> (weight, next)`.
fn arb_transitions() -> impl Strategy<Value = Vec<Transition>> {
    (1usize..6, 1usize..4).prop_flat_map(|(n, k)| {
        prop::collection::vec((0.0f64..5.0, 0..n), n * k).prop_map(move |cells| {
            cells
                .into_iter()
                .enumerate()
                .map(|(i, (weight, next))| Transition::new(i / k, i % k, weight, next))
                .collect()
        })
    })
}

fn assert_distribution(pi: &[f64], n: usize) {
    assert_eq!(pi.len(), n);
    let total: f64 = pi.iter().sum();
    assert!((total - 1.0).abs() < 1e-6, "sum {total}: {pi:?}");
    assert!(pi.iter().all(|&p| p >= -1e-9), "{pi:?}");
}

proptest! {
    #[test]
    fn stationary_distribution_is_a_distribution(transitions in arb_transitions()) {
        let k = transitions.iter().map(|t| t.symbol).max().unwrap() + 1;
        let mut automaton = Automaton::from_transitions(k, transitions, 7).unwrap();
        let n = automaton.nr_states();
        assert_distribution(automaton.stationary_distribution(), n);

        let mut rng = StdRng::seed_from_u64(7);
        let simulated = simulate_stationary(automaton.table(), &mut rng, SIMULATION_STEPS);
        assert_distribution(&simulated, n);
    }

    #[test]
    fn extremes_are_eligible_points(
        cells in prop::collection::vec((0.0f64..1.0, 0u64..4), 1..20),
        epsilon in 0.0f64..0.2,
    ) {
        let points: Vec<Vec<f64>> = cells.iter().map(|&(p, _)| vec![p, 1.0 - p]).collect();
        let occurrences: Vec<u64> = cells.iter().map(|&(_, c)| c).collect();
        let extremes = dimensional_extremes(&points, &occurrences, epsilon, 1);
        for &i in &extremes {
            prop_assert!(occurrences[i] >= 1);
        }
        if occurrences.iter().any(|&c| c >= 1) {
            prop_assert!(!extremes.is_empty());
        }
    }

    #[test]
    fn learned_automata_are_well_formed(
        word_a in prop::collection::vec(0usize..3, 20..200),
        word_b in prop::collection::vec(0usize..2, 200),
    ) {
        let word_b: Vec<Symbol> = word_b[..word_a.len()].to_vec();
        let config = LearnerConfig {
            min_occurrences: 1,
            max_length: Some(2),
            ..Default::default()
        };
        if let Some(mut model) = make_cross_automaton(&word_a, &word_b, &config).unwrap() {
            let n = model.nr_states();
            let table = model.automaton().table();
            for state in 0..n {
                prop_assert!(table.edge_row(state).iter().all(|&next| next < n));
                prop_assert!(table.weight_row(state).iter().all(|&w| w >= 0.0));
                let row = model.morph().row(state);
                prop_assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            }
            assert_distribution(model.automaton_mut().stationary_distribution(), n);
            let dependence = model.dependence_coefficient(&word_a, &word_b).unwrap();
            prop_assert!(dependence.is_finite());
        }
    }
}
