//! Learner and network configuration
//!
//! Both structs deserialize with every field optional, falling back to the
//! defaults below.
//!
//! # Example JSON configuration:
//! ```json
//! {
//!   "learner": {
//!     "epsilon": 0.05,
//!     "min_occurrences": 1,
//!     "max_length": 3,
//!     "seed": 7,
//!     "zero_entropy_policy": { "kind": "fixed", "value": 1.0 }
//!   },
//!   "timeshift": 2,
//!   "minimal_dependence": 0.3
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GrangerError, GrangerResult};

/// Coefficient reported when the secondary stream has zero entropy.
///
/// A constant stream cannot be explained any better than it already is, so
/// the dependence ratio is undefined there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ZeroEntropyPolicy {
    /// Report no dependence (coefficient 0).
    #[default]
    Independent,
    /// Report a fixed coefficient.
    Fixed(f64),
}

impl ZeroEntropyPolicy {
    pub fn coefficient(&self) -> f64 {
        match self {
            ZeroEntropyPolicy::Independent => 0.0,
            ZeroEntropyPolicy::Fixed(value) => *value,
        }
    }
}

/// How extremal candidate contexts are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Per-axis minima and maxima within epsilon.
    #[default]
    DimensionalExtremes,
    /// Hull vertices in two dimensions, per-axis extremes otherwise.
    Quickhull,
}

/// Parameters for learning a single (cross) automaton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Distance under which two derivatives are merged into one state.
    pub epsilon: f64,
    /// Minimum context occurrences for a candidate seed.
    pub min_occurrences: u64,
    /// Longest candidate context; `None` picks a length from epsilon.
    pub max_length: Option<usize>,
    /// Upper bound on states created during expansion.
    pub max_states: usize,
    /// Seed for the automaton's random source.
    pub seed: u64,
    /// Candidate selection strategy.
    pub selector: SelectorKind,
    /// Dependence coefficient for zero-entropy targets.
    pub zero_entropy_policy: ZeroEntropyPolicy,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.05,
            min_occurrences: 0,
            max_length: Some(3),
            max_states: 4096,
            seed: 1,
            selector: SelectorKind::default(),
            zero_entropy_policy: ZeroEntropyPolicy::default(),
        }
    }
}

impl LearnerConfig {
    pub fn validate(&self) -> GrangerResult<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(GrangerError::invalid_parameter(
                "epsilon",
                format!("must be a positive number, got {}", self.epsilon),
            ));
        }
        if self.max_length == Some(0) {
            return Err(GrangerError::invalid_parameter(
                "max_length",
                "contexts need at least one symbol",
            ));
        }
        if self.max_states == 0 {
            return Err(GrangerError::invalid_parameter(
                "max_states",
                "at least the seed state is required",
            ));
        }
        if let ZeroEntropyPolicy::Fixed(value) = self.zero_entropy_policy {
            if !value.is_finite() {
                return Err(GrangerError::invalid_parameter(
                    "zero_entropy_policy",
                    "fixed coefficient must be finite",
                ));
            }
        }
        Ok(())
    }

    /// Longest context word for an alphabet of `alphabet_size` symbols.
    ///
    /// Without an explicit length this is `ceil(ln(1/ε) / ln(k))`, so that
    /// a context of that length is rarer than `ε` under a uniform source.
    pub fn resolved_max_length(&self, alphabet_size: usize) -> usize {
        if let Some(length) = self.max_length {
            return length;
        }
        if alphabet_size < 2 {
            return 1;
        }
        let length = ((1.0 / self.epsilon).ln() / (alphabet_size as f64).ln()).ceil();
        if length.is_finite() && length >= 1.0 {
            length as usize
        } else {
            1
        }
    }

    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }
}

/// Parameters for building a causal network over many streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Settings shared by every automaton in the network.
    pub learner: LearnerConfig,
    /// Largest delay considered; delays run over `0..=timeshift`.
    pub timeshift: usize,
    /// Edges need a coefficient strictly above this value, in `[0, 1]`.
    pub minimal_dependence: f64,
    /// Learn pairs on the rayon pool.
    pub parallel: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            learner: LearnerConfig {
                min_occurrences: 1,
                ..LearnerConfig::default()
            },
            timeshift: 0,
            minimal_dependence: 0.3,
            parallel: true,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> GrangerResult<()> {
        self.learner.validate()?;
        if !(0.0..=1.0).contains(&self.minimal_dependence) {
            return Err(GrangerError::invalid_parameter(
                "minimal_dependence",
                format!("must lie in [0, 1], got {}", self.minimal_dependence),
            ));
        }
        Ok(())
    }
}
