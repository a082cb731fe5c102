//! Persisted predictor record
//!
//! A predictor is the self-contained, serialisable form of a learned
//! cross-model: a distribution over hidden states, one transition matrix per
//! observed symbol, and per-state emission rows over the target alphabet.
//! Feeding observed symbols moves the state distribution; the prediction is
//! the state distribution times the emission rows.

use serde::{Deserialize, Serialize};

use crate::error::{GrangerError, GrangerResult};
use crate::numeric::{mass, vec_mat_mul};
use crate::types::Symbol;

/// Dependence assigned to fallback auto-predictors.
///
/// Small enough to vanish next to any learned edge, but non-zero so the
/// forecaster keeps feeding the predictor.
pub const FALLBACK_DEPENDENCE: f64 = 1e-6;

/// Entries this far below zero are tolerated as rounding residue.
const NEGATIVE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictor {
    /// Initial distribution over hidden states.
    pub init_distribution: Vec<f64>,
    /// Weight of this predictor when mixed with others.
    pub dependence_coefficient: f64,
    /// `symbol_matrices[σ][a][b]`: weight of moving from state `a` to `b` on `σ`.
    pub symbol_matrices: Vec<Vec<Vec<f64>>>,
    /// `crossed_probabilities[a][τ]`: probability of target symbol `τ` in state `a`.
    pub crossed_probabilities: Vec<Vec<f64>>,
}

/// One fed symbol and the state distribution it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub symbol: Symbol,
    pub result: Vec<f64>,
}

/// Step-by-step record of [`Predictor::local_prediction_traced`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalTrace {
    pub steps: Vec<TraceStep>,
    pub prediction: Vec<f64>,
}

impl Predictor {
    /// Single-state predictor that always emits `marginals`.
    ///
    /// Every symbol loops back to the only state, so observations never
    /// change its output.
    pub fn prior(input_alphabet_size: usize, marginals: Vec<f64>, dependence: f64) -> Self {
        Self {
            init_distribution: vec![1.0],
            dependence_coefficient: dependence,
            symbol_matrices: vec![vec![vec![1.0]]; input_alphabet_size],
            crossed_probabilities: vec![marginals],
        }
    }

    pub fn nr_states(&self) -> usize {
        self.init_distribution.len()
    }

    /// Number of symbols the predictor can be fed.
    pub fn input_alphabet_size(&self) -> usize {
        self.symbol_matrices.len()
    }

    /// Width of the emitted distribution.
    pub fn output_alphabet_size(&self) -> usize {
        self.crossed_probabilities.first().map_or(0, Vec::len)
    }

    /// True when the predictor cannot react to observations.
    ///
    /// A single state, or an initial distribution concentrated on one state,
    /// marks a model that either is trivially one state or was not learned.
    pub fn is_degenerate(&self) -> bool {
        self.nr_states() <= 1 || self.init_distribution.contains(&1.0)
    }

    /// Checks dimensions and that every entry is a usable weight.
    pub fn validate(&self) -> GrangerResult<()> {
        let n = self.nr_states();
        if n == 0 {
            return Err(GrangerError::malformed("init_distribution is empty"));
        }
        check_weights("init_distribution", &self.init_distribution)?;
        if !self.dependence_coefficient.is_finite() {
            return Err(GrangerError::malformed(
                "dependence_coefficient is not finite",
            ));
        }
        if self.symbol_matrices.is_empty() {
            return Err(GrangerError::malformed("symbol_matrices is empty"));
        }
        for (symbol, matrix) in self.symbol_matrices.iter().enumerate() {
            if matrix.len() != n {
                return Err(GrangerError::malformed(format!(
                    "symbol matrix {symbol} has {} rows, expected {n}",
                    matrix.len()
                )));
            }
            for row in matrix {
                if row.len() != n {
                    return Err(GrangerError::malformed(format!(
                        "symbol matrix {symbol} has a row of width {}, expected {n}",
                        row.len()
                    )));
                }
                check_weights("symbol_matrices", row)?;
            }
        }
        if self.crossed_probabilities.len() != n {
            return Err(GrangerError::malformed(format!(
                "crossed_probabilities has {} rows, expected {n}",
                self.crossed_probabilities.len()
            )));
        }
        let width = self.output_alphabet_size();
        if width == 0 {
            return Err(GrangerError::malformed("crossed_probabilities rows are empty"));
        }
        for row in &self.crossed_probabilities {
            if row.len() != width {
                return Err(GrangerError::malformed(
                    "crossed_probabilities rows differ in width",
                ));
            }
            check_weights("crossed_probabilities", row)?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> GrangerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> GrangerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a predictor.
    pub fn from_json(json: &str) -> GrangerResult<Self> {
        let predictor: Predictor = serde_json::from_str(json)?;
        predictor.validate()?;
        Ok(predictor)
    }

    /// Moves `state` through `symbol` and renormalises.
    ///
    /// A step that would leave no mass is skipped. `position` only labels the
    /// error for out-of-range symbols.
    pub fn feed(&self, state: &mut Vec<f64>, symbol: Symbol, position: usize) -> GrangerResult<()> {
        let matrix = self
            .symbol_matrices
            .get(symbol)
            .ok_or(GrangerError::SymbolOutOfRange {
                symbol,
                position,
                alphabet_size: self.input_alphabet_size(),
            })?;
        let next = vec_mat_mul(state, matrix);
        let total = mass(&next);
        if total == 0.0 {
            return Ok(());
        }
        *state = next.into_iter().map(|v| v / total).collect();
        Ok(())
    }

    /// Emission distribution for a state distribution.
    pub fn emission(&self, state: &[f64]) -> Vec<f64> {
        vec_mat_mul(state, &self.crossed_probabilities)
    }

    /// Prediction after replaying `observed` from the initial distribution.
    pub fn local_prediction(&self, observed: &[Symbol]) -> GrangerResult<Vec<f64>> {
        let mut state = self.init_distribution.clone();
        for (position, &symbol) in observed.iter().enumerate() {
            self.feed(&mut state, symbol, position)?;
        }
        Ok(self.emission(&state))
    }

    /// Like [`Predictor::local_prediction`], recording every state update.
    pub fn local_prediction_traced(&self, observed: &[Symbol]) -> GrangerResult<LocalTrace> {
        let mut state = self.init_distribution.clone();
        let mut steps = Vec::with_capacity(observed.len());
        for (position, &symbol) in observed.iter().enumerate() {
            self.feed(&mut state, symbol, position)?;
            steps.push(TraceStep {
                symbol,
                result: state.clone(),
            });
        }
        Ok(LocalTrace {
            steps,
            prediction: self.emission(&state),
        })
    }
}

fn check_weights(field: &str, values: &[f64]) -> GrangerResult<()> {
    match values
        .iter()
        .find(|v| !v.is_finite() || **v < -NEGATIVE_TOLERANCE)
    {
        Some(bad) => Err(GrangerError::malformed(format!(
            "{field} contains an invalid weight {bad}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two states; symbol 0 leads to state 0, symbol 1 to state 1.
    fn switch_predictor() -> Predictor {
        Predictor {
            init_distribution: vec![0.5, 0.5],
            dependence_coefficient: 0.8,
            symbol_matrices: vec![
                vec![vec![0.5, 0.0], vec![0.5, 0.0]],
                vec![vec![0.0, 0.5], vec![0.0, 0.5]],
            ],
            crossed_probabilities: vec![vec![0.9, 0.1], vec![0.2, 0.8]],
        }
    }

    #[test]
    fn test_local_prediction_follows_last_symbol() {
        let predictor = switch_predictor();
        let initial = predictor.local_prediction(&[]).unwrap();
        assert!((initial[0] - 0.55).abs() < 1e-12);

        let after_one = predictor.local_prediction(&[0, 1]).unwrap();
        assert!((after_one[0] - 0.2).abs() < 1e-12);
        assert!((after_one[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_zero_mass_step_is_skipped() {
        let mut predictor = switch_predictor();
        predictor.symbol_matrices[1] = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let mut state = vec![1.0, 0.0];
        predictor.feed(&mut state, 1, 0).unwrap();
        assert_eq!(state, vec![1.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_symbol() {
        let predictor = switch_predictor();
        let err = predictor.local_prediction(&[0, 2]).unwrap_err();
        assert!(matches!(
            err,
            GrangerError::SymbolOutOfRange {
                symbol: 2,
                position: 1,
                alphabet_size: 2
            }
        ));
    }

    #[test]
    fn test_prior_ignores_observations() {
        let prior = Predictor::prior(3, vec![0.2, 0.8], FALLBACK_DEPENDENCE);
        assert!(prior.validate().is_ok());
        assert!(prior.is_degenerate());
        assert_eq!(prior.local_prediction(&[2, 1, 0]).unwrap(), vec![0.2, 0.8]);
    }

    #[test]
    fn test_validation_catches_shape_errors() {
        let mut predictor = switch_predictor();
        predictor.symbol_matrices[0].pop();
        assert!(matches!(
            predictor.validate(),
            Err(GrangerError::MalformedPredictor(_))
        ));

        let mut predictor = switch_predictor();
        predictor.crossed_probabilities[1] = vec![1.0];
        assert!(predictor.validate().is_err());

        let mut predictor = switch_predictor();
        predictor.init_distribution[0] = f64::NAN;
        assert!(predictor.validate().is_err());
    }

    #[test]
    fn test_json_field_names() {
        let json = switch_predictor().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in [
            "init_distribution",
            "dependence_coefficient",
            "symbol_matrices",
            "crossed_probabilities",
        ] {
            assert!(value.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn test_traced_prediction_records_each_step() {
        let trace = switch_predictor().local_prediction_traced(&[1, 0]).unwrap();
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.steps[0].result, vec![0.0, 1.0]);
        assert_eq!(trace.steps[1].result, vec![1.0, 0.0]);
        assert!((trace.prediction[0] - 0.9).abs() < 1e-12);
    }
}
