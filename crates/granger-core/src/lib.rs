//! # Granger Core
//!
//! Foundational types shared by the Granger causal-inference engine.
//!
//! The engine learns probabilistic finite-state automata (PFSA) from integer
//! symbol streams, scores how much one stream helps predict another, and
//! turns the resulting models into online predictors. This crate holds the
//! pieces every layer agrees on:
//!
//! - **Symbols and streams**: dense alphabets `0..k` and validated sequences
//! - **Errors**: a single [`GrangerError`] enum with a crate-wide result alias
//! - **Configuration**: learner and network parameters with serde support
//! - **Predictors**: the persisted predictor record and its JSON round-trip
//!
//! ## Modules
//!
//! - [`types`]: `Symbol`, `StateId`, `Word` and [`Stream`]
//! - [`error`]: [`GrangerError`] and [`GrangerResult`]
//! - [`config`]: [`LearnerConfig`], [`NetworkConfig`], [`ZeroEntropyPolicy`]
//! - [`numeric`]: probability-vector helpers used by the runtime
//! - [`predictor`]: the [`Predictor`] record
//!
//! ## Quick Start
//!
//! ```rust
//! use granger_core::{Predictor, Stream};
//!
//! let stream = Stream::new(vec![0, 1, 1, 0, 2]);
//! assert_eq!(stream.alphabet_size(), 3);
//!
//! // A single-state predictor always emits the marginals.
//! let prior = Predictor::prior(stream.alphabet_size(), stream.marginals(), 1e-6);
//! let prediction = prior.local_prediction(&[0, 1]).unwrap();
//! assert!((prediction.iter().sum::<f64>() - 1.0).abs() < 1e-12);
//! ```
//!
//! ## See Also
//!
//! - `granger_runtime`: automaton learning, composition and forecasting

pub mod config;
pub mod error;
pub mod numeric;
pub mod predictor;
pub mod types;

pub use config::{LearnerConfig, NetworkConfig, SelectorKind, ZeroEntropyPolicy};
pub use error::{GrangerError, GrangerResult};
pub use predictor::{Predictor, FALLBACK_DEPENDENCE};
pub use types::{Stream, StateId, Symbol, Word};
