//! Symbols, states and streams

use crate::error::{GrangerError, GrangerResult};

/// A symbol of a dense alphabet `0..k`.
pub type Symbol = usize;

/// Index of an automaton state. State 0 is the initial state.
pub type StateId = usize;

/// A finite sequence of symbols.
pub type Word = Vec<Symbol>;

/// Smallest alphabet size ever inferred from data.
pub const MIN_ALPHABET_SIZE: usize = 2;

/// Alphabet size implied by a sequence: `max(2, max_symbol + 1)`.
pub fn infer_alphabet_size(symbols: &[Symbol]) -> usize {
    symbols
        .iter()
        .max()
        .map_or(MIN_ALPHABET_SIZE, |&max| (max + 1).max(MIN_ALPHABET_SIZE))
}

/// Fails on the first symbol that does not fit the alphabet.
pub fn check_alphabet(symbols: &[Symbol], alphabet_size: usize) -> GrangerResult<()> {
    match symbols.iter().position(|&s| s >= alphabet_size) {
        Some(position) => Err(GrangerError::SymbolOutOfRange {
            symbol: symbols[position],
            position,
            alphabet_size,
        }),
        None => Ok(()),
    }
}

/// A symbol sequence together with the alphabet it is drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    symbols: Vec<Symbol>,
    alphabet_size: usize,
}

impl Stream {
    /// Wraps `symbols`, inferring the alphabet size.
    pub fn new(symbols: Vec<Symbol>) -> Self {
        let alphabet_size = infer_alphabet_size(&symbols);
        Self {
            symbols,
            alphabet_size,
        }
    }

    /// Wraps `symbols` over an explicit alphabet.
    pub fn with_alphabet(symbols: Vec<Symbol>, alphabet_size: usize) -> GrangerResult<Self> {
        if alphabet_size == 0 {
            return Err(GrangerError::invalid_parameter(
                "alphabet_size",
                "an alphabet needs at least one symbol",
            ));
        }
        check_alphabet(&symbols, alphabet_size)?;
        Ok(Self {
            symbols,
            alphabet_size,
        })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Relative symbol frequencies over the whole alphabet.
    ///
    /// An empty stream yields the uniform distribution.
    pub fn marginals(&self) -> Vec<f64> {
        if self.symbols.is_empty() {
            return vec![1.0 / self.alphabet_size as f64; self.alphabet_size];
        }
        let mut counts = vec![0u64; self.alphabet_size];
        for &symbol in &self.symbols {
            counts[symbol] += 1;
        }
        let total = self.symbols.len() as f64;
        counts.into_iter().map(|c| c as f64 / total).collect()
    }

    pub fn into_symbols(self) -> Vec<Symbol> {
        self.symbols
    }
}

impl AsRef<[Symbol]> for Stream {
    fn as_ref(&self) -> &[Symbol] {
        &self.symbols
    }
}

impl From<Vec<Symbol>> for Stream {
    fn from(symbols: Vec<Symbol>) -> Self {
        Stream::new(symbols)
    }
}
