//! Serialisable records of how automata and predictors were built.

use serde::Serialize;

use granger_core::{Predictor, StateId, Symbol};

/// A state created during expansion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateTrace {
    pub id: StateId,
    pub context: Vec<Symbol>,
    pub count: u64,
}

/// Intermediate results of learning one cross automaton.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstructionTrace {
    pub alphabet_a: usize,
    pub alphabet_b: usize,
    pub max_length: usize,
    /// Candidate contexts, in the order of the other per-candidate fields.
    pub candidates: Vec<Vec<Symbol>>,
    pub counts: Vec<Vec<u64>>,
    pub derivatives: Vec<Vec<f64>>,
    pub occurrences: Vec<u64>,
    /// Candidate indices selected as extremal.
    pub hull: Vec<usize>,
    /// Candidate index of the seed context.
    pub chosen: Option<usize>,
    /// States before reduction to a strongly connected part.
    pub states: Vec<StateTrace>,
    /// Dump before reduction.
    pub raw: Option<String>,
    /// Dump after reduction.
    #[serde(rename = "final")]
    pub final_dump: Option<String>,
}

/// Everything that went into one predictor.
#[derive(Debug, Clone, Serialize)]
pub struct PredictorTrace {
    pub pfsa: ConstructionTrace,
    pub xpfsa: ConstructionTrace,
    pub dependence_coefficient: f64,
    pub composition: String,
    pub projection: String,
    pub projection_stationary_distribution: Vec<f64>,
    pub xpfsa_weight_matrix: Vec<Vec<f64>>,
    pub symbol_matrices: Vec<Vec<Vec<f64>>>,
    pub predictor: Predictor,
}

impl PredictorTrace {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One edge's share of a target's prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeForecast {
    pub source: String,
    pub delay: usize,
    pub weight: f64,
    pub normalized_weight: f64,
    pub prediction: Vec<f64>,
}
