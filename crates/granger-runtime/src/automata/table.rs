//! Dense transition tables.

use std::fmt::Write as _;

use granger_core::{GrangerError, GrangerResult, StateId, Symbol};

/// A single `(state, symbol, weight, next)` arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: StateId,
    pub symbol: Symbol,
    pub weight: f64,
    pub next: StateId,
}

impl Transition {
    pub fn new(state: StateId, symbol: Symbol, weight: f64, next: StateId) -> Self {
        Self {
            state,
            symbol,
            weight,
            next,
        }
    }
}

/// `edges[state][symbol]` and `weights[state][symbol]`, stored row-major.
///
/// Arcs that were never set point back to state 0 with weight 0.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionTable {
    nr_states: usize,
    alphabet_size: usize,
    edges: Vec<StateId>,
    weights: Vec<f64>,
}

impl TransitionTable {
    pub fn new(nr_states: usize, alphabet_size: usize) -> Self {
        Self {
            nr_states,
            alphabet_size,
            edges: vec![0; nr_states * alphabet_size],
            weights: vec![0.0; nr_states * alphabet_size],
        }
    }

    /// Builds a table from explicit arcs.
    ///
    /// The state count is one past the largest state mentioned as a source or
    /// a target.
    pub fn from_transitions(
        alphabet_size: usize,
        transitions: impl IntoIterator<Item = Transition>,
    ) -> GrangerResult<Self> {
        if alphabet_size == 0 {
            return Err(GrangerError::invalid_parameter(
                "alphabet_size",
                "an alphabet needs at least one symbol",
            ));
        }
        let transitions: Vec<Transition> = transitions.into_iter().collect();
        let nr_states = transitions
            .iter()
            .map(|t| t.state.max(t.next) + 1)
            .max()
            .ok_or_else(|| {
                GrangerError::invalid_parameter(
                    "transitions",
                    "at least one transition is required",
                )
            })?;

        let mut table = Self::new(nr_states, alphabet_size);
        for (position, t) in transitions.into_iter().enumerate() {
            if t.symbol >= alphabet_size {
                return Err(GrangerError::SymbolOutOfRange {
                    symbol: t.symbol,
                    position,
                    alphabet_size,
                });
            }
            if !t.weight.is_finite() || t.weight < 0.0 {
                return Err(GrangerError::invalid_parameter(
                    "transitions",
                    format!(
                        "weight {} of transition {position} is not a non-negative number",
                        t.weight
                    ),
                ));
            }
            table.set(t.state, t.symbol, t.weight, t.next);
        }
        Ok(table)
    }

    #[inline]
    fn slot(&self, state: StateId, symbol: Symbol) -> usize {
        state * self.alphabet_size + symbol
    }

    pub fn set(&mut self, state: StateId, symbol: Symbol, weight: f64, next: StateId) {
        let slot = self.slot(state, symbol);
        self.edges[slot] = next;
        self.weights[slot] = weight;
    }

    pub fn nr_states(&self) -> usize {
        self.nr_states
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    #[inline]
    pub fn edge(&self, state: StateId, symbol: Symbol) -> StateId {
        self.edges[self.slot(state, symbol)]
    }

    #[inline]
    pub fn weight(&self, state: StateId, symbol: Symbol) -> f64 {
        self.weights[self.slot(state, symbol)]
    }

    pub fn edge_row(&self, state: StateId) -> &[StateId] {
        let start = state * self.alphabet_size;
        &self.edges[start..start + self.alphabet_size]
    }

    pub fn weight_row(&self, state: StateId) -> &[f64] {
        let start = state * self.alphabet_size;
        &self.weights[start..start + self.alphabet_size]
    }

    /// Every arc in state-then-symbol order.
    pub fn transitions(&self) -> impl Iterator<Item = Transition> + '_ {
        (0..self.nr_states).flat_map(move |state| {
            (0..self.alphabet_size).map(move |symbol| {
                Transition::new(
                    state,
                    symbol,
                    self.weight(state, symbol),
                    self.edge(state, symbol),
                )
            })
        })
    }

    /// State-to-state matrix; weights of symbols sharing a target add up.
    pub fn state_matrix(&self) -> Vec<Vec<f64>> {
        let mut matrix = vec![vec![0.0; self.nr_states]; self.nr_states];
        for t in self.transitions() {
            matrix[t.state][t.next] += t.weight;
        }
        matrix
    }

    /// One matrix per symbol: `Γσ[a][edges[a][σ]] = weights[a][σ]`.
    pub fn symbol_matrices(&self) -> Vec<Vec<Vec<f64>>> {
        let n = self.nr_states;
        let mut matrices = vec![vec![vec![0.0; n]; n]; self.alphabet_size];
        for t in self.transitions() {
            matrices[t.symbol][t.state][t.next] = t.weight;
        }
        matrices
    }

    /// Comma-separated `s, σ, w, t` lines. Diagnostics only.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for t in self.transitions() {
            let _ = writeln!(out, "{}, {}, {}, {}", t.state, t.symbol, t.weight, t.next);
        }
        out
    }
}
