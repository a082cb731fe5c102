//! Learning cross automata from symbol sequences.
//!
//! A cross automaton for the pair `(word_a, word_b)` has one state per
//! distinguishable "derivative": the distribution of the next `word_b` symbol
//! after a context read from `word_a`. Construction:
//!
//! 1. Count, for every candidate context, the `word_b` symbols following it.
//! 2. Pick the extremal derivatives and seed state 0 with the most frequent
//!    of their contexts.
//! 3. Extend state contexts symbol by symbol (breadth first). A derivative
//!    within `epsilon` of an existing state is wired to it, otherwise it
//!    becomes a new state.
//! 4. Keep the best-supported strongly connected part.
//!
//! The auto-regressive automaton of a single stream is the cross automaton
//! of the stream with itself, with the morph rows doubling as weights.

use std::borrow::Cow;
use std::collections::VecDeque;

use tracing::{debug, warn};

use granger_core::numeric::{euclidean_distance, fix_last_entry, mass, normalize_counts};
use granger_core::types::{check_alphabet, infer_alphabet_size};
use granger_core::{
    GrangerError, GrangerResult, LearnerConfig, Predictor, SelectorKind, StateId, Symbol,
};

use crate::automata::{compose, Automaton, Composition, CrossAutomaton, Morph, TransitionTable};
use crate::extremal::{dimensional_extremes, quickhull};
use crate::trace::{ConstructionTrace, PredictorTrace, StateTrace};
use crate::words::{all_words, Context, CrossCounts};

/// Derivatives with less mass than this never occurred.
const MIN_DERIVATIVE_MASS: f64 = 0.95;

/// A state under construction.
struct State {
    id: StateId,
    derivative: Vec<f64>,
    context: Context,
    transitions: Vec<Option<StateId>>,
}

impl State {
    fn new(id: StateId, derivative: Vec<f64>, context: Context, alphabet_size: usize) -> Self {
        Self {
            id,
            derivative,
            context,
            transitions: vec![None; alphabet_size],
        }
    }
}

/// Configures and runs the construction of one cross automaton.
#[derive(Debug, Clone)]
pub struct CrossBuilder<'a> {
    word_a: &'a [Symbol],
    word_b: &'a [Symbol],
    alphabet_a: usize,
    alphabet_b: usize,
    config: &'a LearnerConfig,
    sublanguage: Option<&'a [Context]>,
    morph_as_weight: bool,
}

impl<'a> CrossBuilder<'a> {
    /// Alphabets are inferred from the words.
    pub fn new(
        word_a: &'a [Symbol],
        word_b: &'a [Symbol],
        config: &'a LearnerConfig,
    ) -> GrangerResult<Self> {
        config.validate()?;
        if word_a.is_empty() {
            return Err(GrangerError::EmptySequence("word_a".to_string()));
        }
        if word_b.is_empty() {
            return Err(GrangerError::EmptySequence("word_b".to_string()));
        }
        Ok(Self {
            word_a,
            word_b,
            alphabet_a: infer_alphabet_size(word_a),
            alphabet_b: infer_alphabet_size(word_b),
            config,
            sublanguage: None,
            morph_as_weight: false,
        })
    }

    /// Uses explicit alphabet sizes instead of inferred ones.
    pub fn with_alphabets(mut self, alphabet_a: usize, alphabet_b: usize) -> GrangerResult<Self> {
        if alphabet_a == 0 || alphabet_b == 0 {
            return Err(GrangerError::invalid_parameter(
                "alphabet_size",
                "an alphabet needs at least one symbol",
            ));
        }
        check_alphabet(self.word_a, alphabet_a)?;
        check_alphabet(self.word_b, alphabet_b)?;
        self.alphabet_a = alphabet_a;
        self.alphabet_b = alphabet_b;
        Ok(self)
    }

    /// Uses `sublanguage` as the candidate contexts.
    pub fn with_sublanguage(mut self, sublanguage: &'a [Context]) -> Self {
        self.sublanguage = Some(sublanguage);
        self
    }

    /// Weights transitions by the morph row instead of 1.
    pub fn morph_as_weight(mut self, enabled: bool) -> Self {
        self.morph_as_weight = enabled;
        self
    }

    /// Learns the automaton, or `None` if the data supports no model.
    pub fn build(&self) -> Option<CrossAutomaton> {
        self.construct(None)
    }

    /// Like [`CrossBuilder::build`], also returning intermediate results.
    pub fn build_traced(&self) -> (Option<CrossAutomaton>, ConstructionTrace) {
        let mut trace = ConstructionTrace::default();
        let model = self.construct(Some(&mut trace));
        (model, trace)
    }

    fn construct(&self, mut trace: Option<&mut ConstructionTrace>) -> Option<CrossAutomaton> {
        let config = self.config;
        let max_length = config.resolved_max_length(self.alphabet_a);
        let candidates: Cow<'_, [Context]> = match self.sublanguage {
            Some(sublanguage) => Cow::Borrowed(sublanguage),
            None => Cow::Owned(all_words(self.alphabet_a, max_length)),
        };

        let mut counts = CrossCounts::new(self.word_a, self.word_b, self.alphabet_b, max_length);
        let candidate_counts: Vec<Vec<u64>> = candidates
            .iter()
            .map(|context| counts.counts(context).to_vec())
            .collect();
        let occurrences: Vec<u64> = candidate_counts.iter().map(|c| c.iter().sum()).collect();
        let derivatives: Vec<Vec<f64>> = candidate_counts
            .iter()
            .map(|c| normalize_counts(c))
            .collect();

        let hull = match config.selector {
            SelectorKind::DimensionalExtremes => dimensional_extremes(
                &derivatives,
                &occurrences,
                config.epsilon,
                config.min_occurrences,
            ),
            SelectorKind::Quickhull => quickhull(
                &derivatives,
                &occurrences,
                config.epsilon,
                config.min_occurrences,
            ),
        };
        // most frequent extremal context, lowest index on ties
        let mut chosen: Option<usize> = None;
        for &candidate in &hull {
            if chosen.map_or(true, |best| occurrences[candidate] > occurrences[best]) {
                chosen = Some(candidate);
            }
        }

        if let Some(trace) = trace.as_deref_mut() {
            trace.alphabet_a = self.alphabet_a;
            trace.alphabet_b = self.alphabet_b;
            trace.max_length = max_length;
            trace.candidates = candidates.iter().map(|c| c.to_vec()).collect();
            trace.counts = candidate_counts.clone();
            trace.derivatives = derivatives.clone();
            trace.occurrences = occurrences.clone();
            trace.hull = hull.iter().copied().collect();
            trace.chosen = chosen;
        }

        let Some(chosen) = chosen.filter(|&c| occurrences[c] > 0) else {
            debug!(
                candidates = candidates.len(),
                extremal = hull.len(),
                "no extremal context with support, no automaton learned"
            );
            return None;
        };

        let states = self.expand(
            &mut counts,
            candidates[chosen].clone(),
            derivatives[chosen].clone(),
        );

        let nr_states = states.len();
        let mut table = TransitionTable::new(nr_states, self.alphabet_a);
        let mut rows = Vec::with_capacity(nr_states);
        let mut produced = 0usize;
        for state in &states {
            let mut row = state.derivative.clone();
            fix_last_entry(&mut row);
            for (symbol, next) in state.transitions.iter().enumerate() {
                if let Some(next) = *next {
                    let weight = if self.morph_as_weight {
                        row.get(symbol).copied().unwrap_or(0.0).max(0.0)
                    } else {
                        1.0
                    };
                    table.set(state.id, symbol, weight, next);
                    produced += 1;
                }
            }
            rows.push(row);
        }
        if produced == 0 {
            debug!(states = nr_states, "expansion produced no transitions");
            return None;
        }

        let state_counts: Vec<u64> = states
            .iter()
            .map(|state| counts.occurrences(&state.context))
            .collect();
        let model = CrossAutomaton::from_parts(
            Automaton::new(table, config.seed),
            Morph::from_rows(self.alphabet_b, rows),
        );
        if let Some(trace) = trace.as_deref_mut() {
            trace.states = states
                .iter()
                .zip(&state_counts)
                .map(|(state, &count)| StateTrace {
                    id: state.id,
                    context: state.context.to_vec(),
                    count,
                })
                .collect();
            trace.raw = Some(model.dump());
        }

        let model = model.extract_strongly_connected_automaton(&state_counts);
        debug!(
            raw_states = nr_states,
            states = model.nr_states(),
            alphabet_a = self.alphabet_a,
            alphabet_b = self.alphabet_b,
            "learned cross automaton"
        );
        if let Some(trace) = trace {
            trace.final_dump = Some(model.dump());
        }
        Some(model)
    }

    /// Breadth-first expansion from the seed context.
    fn expand(
        &self,
        counts: &mut CrossCounts<'_>,
        seed: Context,
        derivative: Vec<f64>,
    ) -> Vec<State> {
        let epsilon = self.config.epsilon;
        let max_states = self.config.max_states;
        let mut states = vec![State::new(0, derivative, seed, self.alphabet_a)];
        let mut open = VecDeque::from([0]);
        let mut capped = false;

        while let Some(current) = open.pop_front() {
            for symbol in 0..self.alphabet_a {
                let mut context = states[current].context.clone();
                context.push(symbol);
                let derivative = counts.derivative(&context);
                if mass(&derivative) <= MIN_DERIVATIVE_MASS {
                    continue;
                }

                let peer = states
                    .iter()
                    .find(|peer| euclidean_distance(&derivative, &peer.derivative) <= epsilon)
                    .map(|peer| peer.id);
                let target = match peer {
                    Some(id) => id,
                    None if states.len() >= max_states => {
                        if !capped {
                            warn!(
                                max_states,
                                "state limit reached, merging novel contexts into nearest states"
                            );
                            capped = true;
                        }
                        nearest_state(&states, &derivative)
                    }
                    None => {
                        let id = states.len();
                        states.push(State::new(id, derivative, context, self.alphabet_a));
                        open.push_back(id);
                        id
                    }
                };
                states[current].transitions[symbol] = Some(target);
            }
        }
        states
    }
}

fn nearest_state(states: &[State], derivative: &[f64]) -> StateId {
    let mut nearest = 0;
    let mut smallest = f64::INFINITY;
    for state in states {
        let distance = euclidean_distance(derivative, &state.derivative);
        if distance < smallest {
            smallest = distance;
            nearest = state.id;
        }
    }
    nearest
}

/// Learns the cross automaton of `word_b` given `word_a`.
pub fn make_cross_automaton(
    word_a: &[Symbol],
    word_b: &[Symbol],
    config: &LearnerConfig,
) -> GrangerResult<Option<CrossAutomaton>> {
    Ok(CrossBuilder::new(word_a, word_b, config)?.build())
}

/// Learns the next-symbol automaton of `word`.
pub fn make_auto_regressive_automaton(
    word: &[Symbol],
    config: &LearnerConfig,
) -> GrangerResult<Option<CrossAutomaton>> {
    Ok(CrossBuilder::new(word, word, config)?
        .morph_as_weight(true)
        .build())
}

/// Predictor from a composition whose projection drives `xpfsa`'s morph.
pub fn predictor_from_composition(
    composition: &mut Composition,
    dependence_coefficient: f64,
    xpfsa: &CrossAutomaton,
) -> Predictor {
    let projection = composition.projection_mut();
    let init_distribution = projection.stationary_distribution().to_vec();
    Predictor {
        init_distribution,
        dependence_coefficient,
        symbol_matrices: projection.symbol_matrices(),
        crossed_probabilities: xpfsa.morph().rows().to_vec(),
    }
}

/// Composes the source's auto-regressive automaton with a cross automaton
/// into a predictor.
pub fn predictor_for(
    pfsa: &CrossAutomaton,
    xpfsa: &CrossAutomaton,
    dependence_coefficient: f64,
) -> GrangerResult<Predictor> {
    let mut composition = compose(pfsa, xpfsa)?;
    Ok(predictor_from_composition(
        &mut composition,
        dependence_coefficient,
        xpfsa,
    ))
}

/// Builds the predictor of `word_b` from `word_a` and records every
/// intermediate result.
///
/// Returns `None` when either automaton cannot be learned.
pub fn trace_predictor_creation(
    word_a: &[Symbol],
    word_b: &[Symbol],
    config: &LearnerConfig,
) -> GrangerResult<Option<(Predictor, PredictorTrace)>> {
    let (pfsa, pfsa_trace) = CrossBuilder::new(word_a, word_a, config)?
        .morph_as_weight(true)
        .build_traced();
    let (xpfsa, xpfsa_trace) = CrossBuilder::new(word_a, word_b, config)?.build_traced();
    let (Some(pfsa), Some(xpfsa)) = (pfsa, xpfsa) else {
        return Ok(None);
    };

    let dependence_coefficient =
        xpfsa.dependence_coefficient_with(word_a, word_b, config.zero_entropy_policy)?;
    let mut composition = compose(&pfsa, &xpfsa)?;
    let predictor = predictor_from_composition(&mut composition, dependence_coefficient, &xpfsa);
    let trace = PredictorTrace {
        pfsa: pfsa_trace,
        xpfsa: xpfsa_trace,
        dependence_coefficient,
        composition: composition.product().dump(),
        projection: composition.projection().dump(),
        projection_stationary_distribution: predictor.init_distribution.clone(),
        xpfsa_weight_matrix: xpfsa.morph().rows().to_vec(),
        symbol_matrices: predictor.symbol_matrices.clone(),
        predictor: predictor.clone(),
    };
    Ok(Some((predictor, trace)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automata::StateMachine;

    fn period_two() -> Vec<Symbol> {
        [0, 1].repeat(500)
    }

    fn config(max_length: usize) -> LearnerConfig {
        LearnerConfig {
            epsilon: 0.05,
            min_occurrences: 1,
            max_length: Some(max_length),
            ..Default::default()
        }
    }

    #[test]
    fn test_period_two_stream_learns_two_states() {
        let word = period_two();
        let config = config(2);
        let model = make_auto_regressive_automaton(&word, &config)
            .unwrap()
            .expect("periodic stream yields a model");
        assert_eq!(model.nr_states(), 2);

        let table = model.automaton().table();
        assert_eq!(table.edge(0, 1), 1);
        assert_eq!(table.edge(1, 0), 0);
        assert_eq!(table.weight(0, 1), 1.0);
        assert_eq!(table.weight(0, 0), 0.0);

        let mut automaton = model.automaton().clone();
        let pi = automaton.stationary_distribution();
        assert!((pi[0] - 0.5).abs() < 1e-6, "stationary {pi:?}");
        assert!((pi[1] - 0.5).abs() < 1e-6, "stationary {pi:?}");
    }

    #[test]
    fn test_constant_stream_learns_single_state() {
        let word = vec![0; 200];
        let model = make_auto_regressive_automaton(&word, &config(3))
            .unwrap()
            .unwrap();
        assert_eq!(model.nr_states(), 1);
        assert_eq!(model.morph().row(0), &[1.0, 0.0]);
        assert_eq!(model.automaton().table().edge(0, 0), 0);
    }

    #[test]
    fn test_too_short_sequences_yield_none() {
        let config = LearnerConfig::default();
        assert!(make_cross_automaton(&[0], &[1], &config).unwrap().is_none());
    }

    #[test]
    fn test_input_errors() {
        let config = LearnerConfig::default();
        assert!(matches!(
            make_cross_automaton(&[], &[1], &config),
            Err(GrangerError::EmptySequence(_))
        ));
        let word = [0, 1, 2];
        let builder = CrossBuilder::new(&word, &word, &config).unwrap();
        assert!(matches!(
            builder.with_alphabets(2, 3),
            Err(GrangerError::SymbolOutOfRange { symbol: 2, .. })
        ));
        let bad = LearnerConfig {
            epsilon: -1.0,
            ..Default::default()
        };
        assert!(CrossBuilder::new(&word, &word, &bad).is_err());
    }

    #[test]
    fn test_state_cap_wires_to_nearest() {
        let word = period_two();
        let config = LearnerConfig {
            max_states: 1,
            ..config(2)
        };
        let model = make_auto_regressive_automaton(&word, &config).unwrap().unwrap();
        assert_eq!(model.nr_states(), 1);
        assert_eq!(model.automaton().table().edge(0, 1), 0);
    }

    #[test]
    fn test_trace_records_construction() {
        let word = period_two();
        let config = config(2);
        let (model, trace) = CrossBuilder::new(&word, &word, &config)
            .unwrap()
            .morph_as_weight(true)
            .build_traced();
        assert!(model.is_some());
        assert_eq!(trace.alphabet_a, 2);
        assert_eq!(trace.max_length, 2);
        assert_eq!(trace.candidates.len(), 6);
        assert_eq!(trace.occurrences[0], 500);
        assert_eq!(trace.chosen, Some(0));
        assert!(trace.hull.contains(&0));
        assert_eq!(trace.states.len(), 2);
        assert_eq!(trace.states[1].context, vec![0, 1]);
        assert!(trace.raw.is_some());
        assert!(trace.final_dump.is_some());
    }

    #[test]
    fn test_quickhull_selector_agrees_on_binary_alphabet() {
        let word = period_two();
        let config = LearnerConfig {
            selector: SelectorKind::Quickhull,
            ..config(2)
        };
        let model = make_auto_regressive_automaton(&word, &config).unwrap().unwrap();
        assert_eq!(model.nr_states(), 2);
    }

    #[test]
    fn test_shared_sublanguage() {
        let word = period_two();
        let config = config(2);
        let sublanguage = all_words(2, 2);
        let model = CrossBuilder::new(&word, &word, &config)
            .unwrap()
            .with_sublanguage(&sublanguage)
            .morph_as_weight(true)
            .build()
            .unwrap();
        assert_eq!(model.nr_states(), 2);
    }

    #[test]
    fn test_predictor_of_periodic_stream() {
        let word = period_two();
        let config = config(2);
        let (predictor, trace) = trace_predictor_creation(&word, &word, &config)
            .unwrap()
            .unwrap();
        assert!(predictor.validate().is_ok());
        assert_eq!(predictor.nr_states(), 2);
        assert!((trace.dependence_coefficient - 1.0).abs() < 1e-9);

        // after a 0 the stream always continues with 1
        let prediction = predictor.local_prediction(&[1, 0]).unwrap();
        assert!(prediction[1] > 0.99, "prediction {prediction:?}");
        let json = trace.to_json_pretty().unwrap();
        assert!(json.contains("\"final\""));
    }

    #[test]
    fn test_composition_projection_is_crossed() {
        let word = period_two();
        let config = config(2);
        let pfsa = make_auto_regressive_automaton(&word, &config).unwrap().unwrap();
        let xpfsa = make_cross_automaton(&word, &word, &config).unwrap().unwrap();
        let composition = compose(&pfsa, &xpfsa).unwrap();
        assert!(composition.projection().morph().is_some());
        assert_eq!(composition.projection().nr_states(), xpfsa.nr_states());
    }
}
