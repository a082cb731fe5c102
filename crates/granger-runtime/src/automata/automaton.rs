//! Plain probabilistic finite-state automata.

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

use granger_core::{GrangerResult, StateId, Symbol};
use granger_core::types::check_alphabet;

use super::scc::{self, Reduction};
use super::stationary;
use super::table::{Transition, TransitionTable};
use super::{sample_index, Generator};

/// A PFSA over a dense alphabet with its own seeded random source.
///
/// Apart from the cursor, the random source and the cached stationary
/// distribution, an automaton never changes after construction.
#[derive(Debug, Clone)]
pub struct Automaton {
    table: TransitionTable,
    cursor: StateId,
    seed: u64,
    rng: StdRng,
    stationary: Option<Vec<f64>>,
}

impl Automaton {
    pub fn new(table: TransitionTable, seed: u64) -> Self {
        Self {
            table,
            cursor: 0,
            seed,
            rng: StdRng::seed_from_u64(seed),
            stationary: None,
        }
    }

    /// Builds an automaton from `(state, symbol, weight, next)` arcs.
    pub fn from_transitions(
        alphabet_size: usize,
        transitions: impl IntoIterator<Item = Transition>,
        seed: u64,
    ) -> GrangerResult<Self> {
        Ok(Self::new(
            TransitionTable::from_transitions(alphabet_size, transitions)?,
            seed,
        ))
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn nr_states(&self) -> usize {
        self.table.nr_states()
    }

    pub fn alphabet_size(&self) -> usize {
        self.table.alphabet_size()
    }

    pub fn cursor(&self) -> StateId {
        self.cursor
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Moves the cursor back to the initial state.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Advances the cursor through every symbol of `word`.
    pub fn swallow(&mut self, word: &[Symbol]) -> GrangerResult<()> {
        check_alphabet(word, self.alphabet_size())?;
        for &symbol in word {
            self.advance(symbol);
        }
        Ok(())
    }

    /// Follows the arc for `symbol`, which must be in the alphabet.
    pub(crate) fn advance(&mut self, symbol: Symbol) {
        self.cursor = self.table.edge(self.cursor, symbol);
    }

    fn sample(&mut self) -> Symbol {
        sample_index(&mut self.rng, self.table.weight_row(self.cursor))
    }

    /// Stationary distribution over states, computed once and cached.
    pub fn stationary_distribution(&mut self) -> &[f64] {
        if self.stationary.is_none() {
            let pi = stationary::stationary_distribution(&self.table, &mut self.rng);
            self.stationary = Some(pi);
        }
        self.stationary.as_deref().unwrap_or_default()
    }

    /// The cached stationary distribution, if it was computed.
    pub fn cached_stationary(&self) -> Option<&[f64]> {
        self.stationary.as_deref()
    }

    /// Tarjan components of the transition graph, in completion order.
    pub fn strongly_connected_components(&self) -> Vec<std::collections::BTreeSet<StateId>> {
        scc::strongly_connected_components(&self.table)
    }

    /// Restricts the automaton to its best-supported strongly connected part.
    ///
    /// `state_counts[s]` is the support of state `s`. A strongly connected
    /// automaton is returned as is.
    pub fn extract_strongly_connected_automaton(self, state_counts: &[u64]) -> Self {
        match scc::reduce(&self.table, state_counts) {
            Some(reduction) => self.reduced(reduction),
            None => self,
        }
    }

    pub(crate) fn reduced(&self, reduction: Reduction) -> Self {
        Self::new(reduction.table, self.seed)
    }

    pub fn symbol_matrices(&self) -> Vec<Vec<Vec<f64>>> {
        self.table.symbol_matrices()
    }

    /// Comma-separated arc listing. Diagnostics only.
    pub fn dump(&self) -> String {
        self.table.dump()
    }

    /// Stationary distribution for display without touching this automaton.
    pub(crate) fn stationary_for_display(&self) -> Vec<f64> {
        match &self.stationary {
            Some(pi) => pi.clone(),
            None => stationary::stationary_distribution(&self.table, &mut self.rng.clone()),
        }
    }
}

impl Generator for Automaton {
    type Output = Symbol;

    fn peek(&mut self) -> Symbol {
        self.sample()
    }

    fn next(&mut self) -> Symbol {
        let symbol = self.sample();
        self.advance(symbol);
        symbol
    }
}

impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in self.table.transitions() {
            writeln!(f, "q{} -({}, {})-> q{}", t.state, t.symbol, t.weight, t.next)?;
        }
        writeln!(f, "alphabet: 0..{}", self.alphabet_size())?;
        write!(f, "stationary: {:?}", self.stationary_for_display())
    }
}
