//! Context words and cross-count tables.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use granger_core::numeric::normalize_counts;
use granger_core::Symbol;

/// A context word; contexts rarely exceed four symbols.
pub type Context = SmallVec<[Symbol; 4]>;

/// All words of length `1..=max_length`, shorter words first and
/// lexicographic within a length.
pub fn all_words(alphabet_size: usize, max_length: usize) -> Vec<Context> {
    let mut words = Vec::new();
    let mut layer: Vec<Context> = vec![Context::new()];
    for _ in 0..max_length {
        let mut next = Vec::with_capacity(layer.len() * alphabet_size);
        for word in &layer {
            for symbol in 0..alphabet_size {
                let mut extended = word.clone();
                extended.push(symbol);
                next.push(extended);
            }
        }
        words.extend(next.iter().cloned());
        layer = next;
    }
    words
}

/// Counts of the secondary symbol that follows each primary context.
///
/// An occurrence of a context at `primary[i..i + L]` counts `secondary[i + L]`
/// when that symbol exists. Contexts up to the tabulated length are counted in
/// one pass over the data; longer ones are scanned for and cached on demand.
pub struct CrossCounts<'a> {
    primary: &'a [Symbol],
    secondary: &'a [Symbol],
    secondary_alphabet_size: usize,
    tabulated_length: usize,
    counts: FxHashMap<Context, Vec<u64>>,
}

impl<'a> CrossCounts<'a> {
    pub fn new(
        primary: &'a [Symbol],
        secondary: &'a [Symbol],
        secondary_alphabet_size: usize,
        tabulated_length: usize,
    ) -> Self {
        let mut counts: FxHashMap<Context, Vec<u64>> = FxHashMap::default();
        for start in 0..primary.len() {
            for length in 1..=tabulated_length {
                let end = start + length;
                if end > primary.len() || end >= secondary.len() {
                    break;
                }
                counts
                    .entry(Context::from_slice(&primary[start..end]))
                    .or_insert_with(|| vec![0; secondary_alphabet_size])[secondary[end]] += 1;
            }
        }
        Self {
            primary,
            secondary,
            secondary_alphabet_size,
            tabulated_length,
            counts,
        }
    }

    /// Next-symbol counts after `context`.
    pub fn counts(&mut self, context: &[Symbol]) -> &[u64] {
        let tabulated = context.len() <= self.tabulated_length;
        let (primary, secondary, k) = (self.primary, self.secondary, self.secondary_alphabet_size);
        self.counts
            .entry(Context::from_slice(context))
            .or_insert_with(|| {
                if tabulated {
                    vec![0; k]
                } else {
                    scan(primary, secondary, k, context)
                }
            })
    }

    /// Number of times `context` is followed by a secondary symbol.
    pub fn occurrences(&mut self, context: &[Symbol]) -> u64 {
        self.counts(context).iter().sum()
    }

    /// Normalised next-symbol distribution; zeros if `context` never occurs.
    pub fn derivative(&mut self, context: &[Symbol]) -> Vec<f64> {
        normalize_counts(self.counts(context))
    }
}

fn scan(primary: &[Symbol], secondary: &[Symbol], k: usize, context: &[Symbol]) -> Vec<u64> {
    let mut counts = vec![0; k];
    if context.is_empty() {
        return counts;
    }
    for (start, window) in primary.windows(context.len()).enumerate() {
        let end = start + context.len();
        if end >= secondary.len() {
            break;
        }
        if window == context {
            counts[secondary[end]] += 1;
        }
    }
    counts
}
