//! Cross automata: a primary automaton whose states also emit symbols of a
//! secondary alphabet.
//!
//! Learned from a pair of streams, the primary automaton tracks the source
//! stream and each state's morph row is the distribution of the target
//! stream's next symbol. How much the morph rows sharpen the target's
//! marginals is the dependence coefficient.

use std::fmt::{self, Write as _};

use granger_core::numeric::{fix_last_entry, mass, neg_entropy, normalize_counts};
use granger_core::types::check_alphabet;
use granger_core::{GrangerError, GrangerResult, StateId, Symbol, ZeroEntropyPolicy};

use super::automaton::Automaton;
use super::scc;
use super::table::Transition;
use super::{sample_index, Generator};

/// Rows may miss a total mass of one by this much.
const ROW_MASS_TOLERANCE: f64 = 1e-9;

/// Per-state distributions over the secondary alphabet.
#[derive(Debug, Clone, PartialEq)]
pub struct Morph {
    secondary_alphabet_size: usize,
    rows: Vec<Vec<f64>>,
}

impl Morph {
    /// Checks that every row is a distribution over the secondary alphabet.
    ///
    /// An all-zero row is accepted; sampling from it is uniform.
    pub fn new(secondary_alphabet_size: usize, rows: Vec<Vec<f64>>) -> GrangerResult<Self> {
        if secondary_alphabet_size == 0 {
            return Err(GrangerError::invalid_parameter(
                "secondary_alphabet_size",
                "an alphabet needs at least one symbol",
            ));
        }
        for (state, row) in rows.iter().enumerate() {
            if row.len() != secondary_alphabet_size {
                return Err(GrangerError::AlphabetMismatch {
                    expected: secondary_alphabet_size,
                    found: row.len(),
                });
            }
            if row.iter().any(|v| !v.is_finite() || *v < -1e-9) {
                return Err(GrangerError::invalid_parameter(
                    "morph",
                    format!("row of state {state} is not a distribution"),
                ));
            }
            let total = mass(row);
            if total != 0.0 && (total - 1.0).abs() > ROW_MASS_TOLERANCE {
                return Err(GrangerError::invalid_parameter(
                    "morph",
                    format!("row of state {state} sums to {total}"),
                ));
            }
        }
        Ok(Self::from_rows(secondary_alphabet_size, rows))
    }

    pub(crate) fn from_rows(secondary_alphabet_size: usize, rows: Vec<Vec<f64>>) -> Self {
        Self {
            secondary_alphabet_size,
            rows,
        }
    }

    pub fn secondary_alphabet_size(&self) -> usize {
        self.secondary_alphabet_size
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, state: StateId) -> &[f64] {
        &self.rows[state]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn select(&self, states: &[StateId]) -> Self {
        Self::from_rows(
            self.secondary_alphabet_size,
            states.iter().map(|&s| self.rows[s].clone()).collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct CrossAutomaton {
    automaton: Automaton,
    morph: Morph,
}

impl CrossAutomaton {
    /// Pairs an automaton with one morph row per state.
    pub fn new(automaton: Automaton, morph: Morph) -> GrangerResult<Self> {
        if morph.len() != automaton.nr_states() {
            return Err(GrangerError::invalid_parameter(
                "morph",
                format!(
                    "{} rows for an automaton with {} states",
                    morph.len(),
                    automaton.nr_states()
                ),
            ));
        }
        Ok(Self { automaton, morph })
    }

    pub(crate) fn from_parts(automaton: Automaton, morph: Morph) -> Self {
        Self { automaton, morph }
    }

    pub fn from_transitions(
        primary_alphabet_size: usize,
        transitions: impl IntoIterator<Item = Transition>,
        secondary_alphabet_size: usize,
        morph: Vec<Vec<f64>>,
        seed: u64,
    ) -> GrangerResult<Self> {
        let automaton = Automaton::from_transitions(primary_alphabet_size, transitions, seed)?;
        Self::new(automaton, Morph::new(secondary_alphabet_size, morph)?)
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    pub fn automaton_mut(&mut self) -> &mut Automaton {
        &mut self.automaton
    }

    pub fn morph(&self) -> &Morph {
        &self.morph
    }

    pub fn nr_states(&self) -> usize {
        self.automaton.nr_states()
    }

    pub fn secondary_alphabet_size(&self) -> usize {
        self.morph.secondary_alphabet_size()
    }

    pub fn into_parts(self) -> (Automaton, Morph) {
        (self.automaton, self.morph)
    }

    fn sample_secondary(&mut self) -> Symbol {
        let state = self.automaton.cursor();
        sample_index(self.automaton.rng_mut(), self.morph.row(state))
    }

    /// Samples a primary and a secondary symbol without moving.
    pub fn crossed_peek(&mut self) -> (Symbol, Symbol) {
        let primary = self.automaton.peek();
        (primary, self.sample_secondary())
    }

    /// Samples both symbols from the current state, then advances on the
    /// primary one.
    pub fn crossed_next(&mut self) -> (Symbol, Symbol) {
        let primary = self.automaton.peek();
        let secondary = self.sample_secondary();
        self.automaton.advance(primary);
        (primary, secondary)
    }

    /// Visit frequencies of replaying `word` from the initial state.
    ///
    /// The initial state counts as visited. The automaton's own cursor does
    /// not move.
    pub fn stream_run(&self, word: &[Symbol]) -> GrangerResult<Vec<f64>> {
        let table = self.automaton.table();
        check_alphabet(word, table.alphabet_size())?;
        let mut visits = vec![0u64; table.nr_states()];
        let mut cursor = 0;
        visits[cursor] += 1;
        for &symbol in word {
            cursor = table.edge(cursor, symbol);
            visits[cursor] += 1;
        }
        let mut frequencies = normalize_counts(&visits);
        fix_last_entry(&mut frequencies);
        Ok(frequencies)
    }

    /// Dependence of `word_b` on `word_a`, with zero-entropy targets scoring 0.
    pub fn dependence_coefficient(
        &self,
        word_a: &[Symbol],
        word_b: &[Symbol],
    ) -> GrangerResult<f64> {
        self.dependence_coefficient_with(word_a, word_b, ZeroEntropyPolicy::Independent)
    }

    /// `1 - H(morph | states) / H(word_b)`, both entropies in bits.
    ///
    /// The conditional entropy weighs each state's morph entropy by how often
    /// `word_a` visits it.
    pub fn dependence_coefficient_with(
        &self,
        word_a: &[Symbol],
        word_b: &[Symbol],
        policy: ZeroEntropyPolicy,
    ) -> GrangerResult<f64> {
        if word_b.is_empty() {
            return Err(GrangerError::EmptySequence("word_b".to_string()));
        }
        let k = self.secondary_alphabet_size();
        check_alphabet(word_b, k)?;
        let mut counts = vec![0u64; k];
        for &symbol in word_b {
            counts[symbol] += 1;
        }
        let denominator = neg_entropy(&normalize_counts(&counts));
        if denominator == 0.0 {
            return Ok(policy.coefficient());
        }

        let visits = self.stream_run(word_a)?;
        let numerator: f64 = visits
            .iter()
            .zip(self.morph.rows())
            .map(|(&share, row)| share * neg_entropy(row))
            .sum();
        Ok(1.0 - numerator / denominator)
    }

    /// Restricts to the best-supported strongly connected part, carrying
    /// morph rows along.
    pub fn extract_strongly_connected_automaton(self, state_counts: &[u64]) -> Self {
        match scc::reduce(self.automaton.table(), state_counts) {
            Some(reduction) => {
                let morph = self.morph.select(&reduction.states);
                Self::from_parts(self.automaton.reduced(reduction), morph)
            }
            None => self,
        }
    }

    /// Arc listing followed by one `s, 0:p0, 1:p1, …` line per state.
    pub fn dump(&self) -> String {
        let mut out = self.automaton.dump();
        for (state, row) in self.morph.rows().iter().enumerate() {
            let _ = write!(out, "{state}");
            for (symbol, p) in row.iter().enumerate() {
                let _ = write!(out, ", {symbol}:{p}");
            }
            out.push('\n');
        }
        out
    }
}

impl Generator for CrossAutomaton {
    type Output = (Symbol, Symbol);

    fn peek(&mut self) -> (Symbol, Symbol) {
        self.crossed_peek()
    }

    fn next(&mut self) -> (Symbol, Symbol) {
        self.crossed_next()
    }
}

impl fmt::Display for CrossAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.automaton)?;
        for (state, row) in self.morph.rows().iter().enumerate() {
            writeln!(f, "q{state} => {row:?}")?;
        }
        write!(f, "secondary alphabet: 0..{}", self.secondary_alphabet_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Remembers the last primary symbol and echoes it on the secondary side.
    fn echo() -> CrossAutomaton {
        CrossAutomaton::from_transitions(
            2,
            [
                Transition::new(0, 0, 1.0, 0),
                Transition::new(0, 1, 1.0, 1),
                Transition::new(1, 0, 1.0, 0),
                Transition::new(1, 1, 1.0, 1),
            ],
            2,
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            5,
        )
        .unwrap()
    }

    #[test]
    fn test_morph_shape_is_checked() {
        let automaton = echo().automaton().clone();
        let morph = Morph::new(2, vec![vec![1.0, 0.0]]).unwrap();
        assert!(CrossAutomaton::new(automaton, morph).is_err());
        assert!(matches!(
            Morph::new(3, vec![vec![1.0, 0.0]]),
            Err(GrangerError::AlphabetMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn test_morph_rows_must_sum_to_one() {
        let err = CrossAutomaton::from_transitions(
            2,
            [Transition::new(0, 0, 1.0, 0), Transition::new(0, 1, 1.0, 0)],
            2,
            vec![vec![2.0, 2.0]],
            1,
        )
        .unwrap_err();
        assert!(matches!(err, GrangerError::InvalidParameter { name: "morph", .. }));
        assert!(Morph::new(2, vec![vec![0.5, 0.25]]).is_err());
        assert!(Morph::new(2, vec![vec![0.0, 0.0]]).is_ok());
        assert!(Morph::new(3, vec![vec![0.2, 0.3, 0.5 + 1e-12]]).is_ok());
    }

    #[test]
    fn test_connected_automaton_is_extracted_unchanged() {
        let mut cross = echo();
        cross.automaton_mut().swallow(&[1]).unwrap();
        let pi = cross.automaton_mut().stationary_distribution().to_vec();
        let morph = cross.morph().clone();
        let extracted = cross.extract_strongly_connected_automaton(&[3, 5]);
        assert_eq!(extracted.nr_states(), 2);
        assert_eq!(extracted.automaton().cursor(), 1);
        assert_eq!(extracted.automaton().cached_stationary(), Some(pi.as_slice()));
        assert_eq!(extracted.morph(), &morph);
        assert_eq!(extracted.automaton().seed(), 5);
    }

    #[test]
    fn test_crossed_next_advances_on_primary_only() {
        let mut cross = echo();
        for _ in 0..50 {
            let state = cross.automaton().cursor();
            let (primary, secondary) = cross.crossed_next();
            assert_eq!(secondary, state, "morph rows are one-hot");
            assert_eq!(cross.automaton().cursor(), primary);
        }
    }

    #[test]
    fn test_stream_run_counts_initial_state() {
        let cross = echo();
        let run = cross.stream_run(&[1, 1, 0]).unwrap();
        assert_eq!(run, vec![0.5, 0.5]);
        assert_eq!(cross.automaton().cursor(), 0);
        assert!(cross.stream_run(&[3]).is_err());
    }

    #[test]
    fn test_deterministic_echo_has_full_dependence() {
        let cross = echo();
        let word_a = [0, 1, 1, 0, 1, 0, 0, 1];
        let word_b = [1, 0, 1, 1, 0, 1, 0, 0];
        let coefficient = cross.dependence_coefficient(&word_a, &word_b).unwrap();
        assert!((coefficient - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_entropy_target_uses_policy() {
        let cross = echo();
        let word_a = [0, 1, 0];
        let word_b = [1, 1, 1];
        assert_eq!(cross.dependence_coefficient(&word_a, &word_b).unwrap(), 0.0);
        let fixed = cross
            .dependence_coefficient_with(&word_a, &word_b, ZeroEntropyPolicy::Fixed(1.0))
            .unwrap();
        assert_eq!(fixed, 1.0);
        assert!(matches!(
            cross.dependence_coefficient(&word_a, &[]),
            Err(GrangerError::EmptySequence(_))
        ));
    }

    #[test]
    fn test_dump_appends_morph_rows() {
        let dump = echo().dump();
        assert!(dump.ends_with("0, 0:1, 1:0\n1, 0:0, 1:1\n"));
        assert!(dump.starts_with("0, 0, 1, 0\n"));
    }

    #[test]
    fn test_reduction_carries_morph_rows() {
        // 0 -> 1 <-> 2; state 0 is transient.
        let cross = CrossAutomaton::from_transitions(
            1,
            [
                Transition::new(0, 0, 1.0, 1),
                Transition::new(1, 0, 1.0, 2),
                Transition::new(2, 0, 1.0, 1),
            ],
            2,
            vec![vec![1.0, 0.0], vec![0.25, 0.75], vec![0.5, 0.5]],
            9,
        )
        .unwrap();
        let reduced = cross.extract_strongly_connected_automaton(&[1, 1, 1]);
        assert_eq!(reduced.nr_states(), 2);
        assert_eq!(reduced.morph().row(0), &[0.25, 0.75]);
        assert_eq!(reduced.morph().row(1), &[0.5, 0.5]);
        assert_eq!(reduced.automaton().seed(), 9);
    }
}
