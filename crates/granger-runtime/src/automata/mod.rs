//! Probabilistic finite-state automata.
//!
//! - [`Automaton`]: a PFSA with dense transition tables and its own RNG
//! - [`CrossAutomaton`]: an automaton whose states also emit secondary symbols
//! - [`compose`]: product of two automata projected back onto the second one
//!
//! Both automaton kinds sample through the [`Generator`] trait and expose
//! their structure through [`StateMachine`], so composition accepts either.

pub mod automaton;
pub mod composition;
pub mod cross;
pub mod scc;
pub mod stationary;
pub mod table;

use std::fmt;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

pub use automaton::Automaton;
pub use composition::{compose, Composition};
pub use cross::{CrossAutomaton, Morph};
pub use table::{Transition, TransitionTable};

use granger_core::Symbol;

/// Random symbol source.
pub trait Generator {
    type Output;

    /// Samples from the current state without moving.
    fn peek(&mut self) -> Self::Output;

    /// Samples from the current state and moves.
    fn next(&mut self) -> Self::Output;

    fn generate(&mut self, length: usize) -> Vec<Self::Output> {
        (0..length).map(|_| self.next()).collect()
    }
}

/// Read access to the parts composition needs.
pub trait StateMachine {
    fn automaton(&self) -> &Automaton;

    /// Secondary emissions, for crossed models.
    fn morph(&self) -> Option<&Morph> {
        None
    }
}

impl StateMachine for Automaton {
    fn automaton(&self) -> &Automaton {
        self
    }
}

impl StateMachine for CrossAutomaton {
    fn automaton(&self) -> &Automaton {
        CrossAutomaton::automaton(self)
    }

    fn morph(&self) -> Option<&Morph> {
        Some(CrossAutomaton::morph(self))
    }
}

/// Either kind of automaton.
#[derive(Debug, Clone)]
pub enum Model {
    Plain(Automaton),
    Crossed(CrossAutomaton),
}

impl Model {
    pub fn automaton_mut(&mut self) -> &mut Automaton {
        match self {
            Model::Plain(automaton) => automaton,
            Model::Crossed(cross) => cross.automaton_mut(),
        }
    }

    pub fn as_crossed(&self) -> Option<&CrossAutomaton> {
        match self {
            Model::Crossed(cross) => Some(cross),
            Model::Plain(_) => None,
        }
    }

    pub fn nr_states(&self) -> usize {
        StateMachine::automaton(self).nr_states()
    }

    pub fn stationary_distribution(&mut self) -> &[f64] {
        self.automaton_mut().stationary_distribution()
    }

    pub fn symbol_matrices(&self) -> Vec<Vec<Vec<f64>>> {
        StateMachine::automaton(self).symbol_matrices()
    }

    pub fn extract_strongly_connected_automaton(self, state_counts: &[u64]) -> Self {
        match self {
            Model::Plain(automaton) => {
                Model::Plain(automaton.extract_strongly_connected_automaton(state_counts))
            }
            Model::Crossed(cross) => {
                Model::Crossed(cross.extract_strongly_connected_automaton(state_counts))
            }
        }
    }

    pub fn dump(&self) -> String {
        match self {
            Model::Plain(automaton) => automaton.dump(),
            Model::Crossed(cross) => cross.dump(),
        }
    }
}

impl StateMachine for Model {
    fn automaton(&self) -> &Automaton {
        match self {
            Model::Plain(automaton) => automaton,
            Model::Crossed(cross) => cross.automaton(),
        }
    }

    fn morph(&self) -> Option<&Morph> {
        self.as_crossed().map(CrossAutomaton::morph)
    }
}

impl From<Automaton> for Model {
    fn from(automaton: Automaton) -> Self {
        Model::Plain(automaton)
    }
}

impl From<CrossAutomaton> for Model {
    fn from(cross: CrossAutomaton) -> Self {
        Model::Crossed(cross)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Plain(automaton) => fmt::Display::fmt(automaton, f),
            Model::Crossed(cross) => fmt::Display::fmt(cross, f),
        }
    }
}

/// Draws an index proportionally to `weights`.
///
/// Rows without positive mass are sampled uniformly. Negative entries count
/// as zero.
pub(crate) fn sample_index<R: Rng>(rng: &mut R, weights: &[f64]) -> Symbol {
    if weights.is_empty() {
        return 0;
    }
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= f64::EPSILON {
        return rng.gen_range(0..weights.len());
    }
    match WeightedIndex::new(weights.iter().map(|w| w.max(0.0))) {
        Ok(distribution) => distribution.sample(rng),
        Err(_) => rng.gen_range(0..weights.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_row_samples_uniformly() {
        // Chi-square goodness of fit, 3 degrees of freedom, p = 0.001 -> 16.27
        let mut rng = StdRng::seed_from_u64(42);
        let weights = [0.0; 4];
        let draws = 8000;
        let mut counts = [0u64; 4];
        for _ in 0..draws {
            counts[sample_index(&mut rng, &weights)] += 1;
        }
        let expected = draws as f64 / 4.0;
        let statistic: f64 = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();
        assert!(statistic < 16.27, "chi-square {statistic} for {counts:?}");
    }

    #[test]
    fn test_zero_weight_symbols_are_never_drawn() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_ne!(sample_index(&mut rng, &[0.3, 0.0, 0.7]), 1);
        }
    }

    #[test]
    fn test_model_dispatch() {
        let automaton = Automaton::from_transitions(2, [Transition::new(0, 1, 1.0, 0)], 3).unwrap();
        let model = Model::from(automaton);
        assert!(model.morph().is_none());
        assert!(model.as_crossed().is_none());
        assert_eq!(model.nr_states(), 1);

        let cross = CrossAutomaton::from_transitions(
            2,
            [Transition::new(0, 1, 1.0, 0)],
            3,
            vec![vec![0.2, 0.3, 0.5]],
            3,
        )
        .unwrap();
        let model = Model::from(cross);
        assert_eq!(model.morph().map(Morph::secondary_alphabet_size), Some(3));
        assert!(model.dump().ends_with("0, 0:0.2, 1:0.3, 2:0.5\n"));
    }
}
