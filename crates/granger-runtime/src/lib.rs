//! Granger Runtime - automaton learning and forecasting
//!
//! This crate learns probabilistic finite-state automata from symbol
//! streams, measures Granger-style dependence between streams and assembles
//! the resulting predictors into a causal network that can forecast and
//! generate.
//!
//! ```rust
//! use granger_runtime::{make_auto_regressive_automaton, LearnerConfig};
//!
//! let word = [0, 1].repeat(200);
//! let config = LearnerConfig {
//!     min_occurrences: 1,
//!     max_length: Some(2),
//!     ..Default::default()
//! };
//! let mut model = make_auto_regressive_automaton(&word, &config)
//!     .unwrap()
//!     .expect("a periodic stream has a model");
//! assert_eq!(model.nr_states(), 2);
//! let pi = model.automaton_mut().stationary_distribution();
//! assert!((pi[0] - 0.5).abs() < 1e-9);
//! ```

pub mod automata;
pub mod builder;
pub mod extremal;
pub mod forecast;
pub mod network;
pub mod trace;
pub mod words;

pub use automata::{
    compose, Automaton, Composition, CrossAutomaton, Generator, Model, Morph, StateMachine,
    Transition, TransitionTable,
};
pub use builder::{
    make_auto_regressive_automaton, make_cross_automaton, predictor_for,
    predictor_from_composition, trace_predictor_creation, CrossBuilder,
};
pub use extremal::{dimensional_extremes, quickhull};
pub use forecast::{generate, predict, predict_stepwise, Forecaster};
pub use network::{make_granger_network, prune, CausalNetwork, Edge};
pub use trace::{ConstructionTrace, EdgeForecast, PredictorTrace, StateTrace};

pub use granger_core::{
    GrangerError, GrangerResult, LearnerConfig, NetworkConfig, Predictor, SelectorKind, Stream,
    Symbol, ZeroEntropyPolicy,
};
