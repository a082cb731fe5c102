//! Forecasting with a causal network.
//!
//! Every edge keeps its own distribution over hidden states. At time `t` an
//! edge with delay `d` consumes its source's symbol at `t - d`; a target's
//! forecast mixes the emissions of its edges by dependence coefficient.

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use granger_core::numeric::fix_last_entry;
use granger_core::{GrangerError, GrangerResult, Symbol};

use crate::automata::sample_index;
use crate::network::CausalNetwork;
use crate::trace::EdgeForecast;

/// Running state of every edge in a network.
#[derive(Debug, Clone)]
pub struct Forecaster<'n> {
    network: &'n CausalNetwork,
    /// `states[target][edge]`
    states: Vec<Vec<Vec<f64>>>,
}

impl<'n> Forecaster<'n> {
    pub fn new(network: &'n CausalNetwork) -> Self {
        let states = network
            .iter()
            .map(|(_, edges)| {
                edges
                    .iter()
                    .map(|edge| edge.predictor.init_distribution.clone())
                    .collect()
            })
            .collect();
        Self { network, states }
    }

    pub fn network(&self) -> &'n CausalNetwork {
        self.network
    }

    /// Feeds the symbols observed at `time`.
    ///
    /// Edges whose delay has not elapsed yet, and edges with zero dependence,
    /// are left untouched.
    pub fn step<S: AsRef<[Symbol]>>(
        &mut self,
        time: usize,
        history: &IndexMap<String, S>,
    ) -> GrangerResult<()> {
        for ((_, edges), states) in self.network.iter().zip(self.states.iter_mut()) {
            for (edge, state) in edges.iter().zip(states.iter_mut()) {
                if edge.predictor.dependence_coefficient == 0.0 || time < edge.delay {
                    continue;
                }
                let symbols = history
                    .get(&edge.source)
                    .ok_or_else(|| GrangerError::UnknownStream(edge.source.clone()))?
                    .as_ref();
                let position = time - edge.delay;
                let Some(&symbol) = symbols.get(position) else {
                    return Err(GrangerError::LengthMismatch {
                        name: edge.source.clone(),
                        expected: position + 1,
                        found: symbols.len(),
                    });
                };
                edge.predictor.feed(state, symbol, position)?;
            }
        }
        Ok(())
    }

    /// Per-edge contributions to `target`'s forecast.
    ///
    /// Weights are the dependence coefficients normalised to sum to one, or
    /// equal when they sum to zero.
    pub fn breakdown(&self, target: &str) -> GrangerResult<Vec<EdgeForecast>> {
        let index = self
            .network
            .iter()
            .position(|(name, _)| name == target)
            .ok_or_else(|| GrangerError::UnknownStream(target.to_string()))?;
        let edges = self.network.edges(target).unwrap_or_default();
        let states = &self.states[index];

        let total: f64 = edges
            .iter()
            .map(|edge| edge.predictor.dependence_coefficient)
            .sum();
        let equal = 1.0 / edges.len().max(1) as f64;
        Ok(edges
            .iter()
            .zip(states)
            .map(|(edge, state)| {
                let weight = edge.predictor.dependence_coefficient;
                EdgeForecast {
                    source: edge.source.clone(),
                    delay: edge.delay,
                    weight,
                    normalized_weight: if total == 0.0 { equal } else { weight / total },
                    prediction: edge.predictor.emission(state),
                }
            })
            .collect())
    }

    /// Mixed forecast of the next symbol of every target.
    pub fn prediction(&self) -> GrangerResult<IndexMap<String, Vec<f64>>> {
        let mut predictions = IndexMap::with_capacity(self.network.len());
        for target in self.network.targets() {
            let parts = self.breakdown(target)?;
            let Some(width) = parts.first().map(|part| part.prediction.len()) else {
                return Err(GrangerError::malformed(format!(
                    "target {target} has no edges"
                )));
            };
            let mut mixed = vec![0.0; width];
            for part in &parts {
                if part.prediction.len() != width {
                    return Err(GrangerError::AlphabetMismatch {
                        expected: width,
                        found: part.prediction.len(),
                    });
                }
                for (total, p) in mixed.iter_mut().zip(&part.prediction) {
                    *total += part.normalized_weight * p;
                }
            }
            fix_last_entry(&mut mixed);
            predictions.insert(target.to_string(), mixed);
        }
        Ok(predictions)
    }
}

fn observation_length<S: AsRef<[Symbol]>>(
    observations: &IndexMap<String, S>,
) -> GrangerResult<usize> {
    let Some(length) = observations.values().next().map(|s| s.as_ref().len()) else {
        return Ok(0);
    };
    for (name, symbols) in observations {
        if symbols.as_ref().len() != length {
            return Err(GrangerError::LengthMismatch {
                name: name.clone(),
                expected: length,
                found: symbols.as_ref().len(),
            });
        }
    }
    Ok(length)
}

impl CausalNetwork {
    /// Forecast of every target after consuming all `observations`.
    pub fn predict<S: AsRef<[Symbol]>>(
        &self,
        observations: &IndexMap<String, S>,
    ) -> GrangerResult<IndexMap<String, Vec<f64>>> {
        let length = observation_length(observations)?;
        let mut forecaster = Forecaster::new(self);
        for time in 0..length {
            forecaster.step(time, observations)?;
        }
        forecaster.prediction()
    }

    /// Forecasts before the first symbol and after each one; `len + 1`
    /// entries in total.
    pub fn predict_stepwise<S: AsRef<[Symbol]>>(
        &self,
        observations: &IndexMap<String, S>,
    ) -> GrangerResult<Vec<IndexMap<String, Vec<f64>>>> {
        let length = observation_length(observations)?;
        let mut forecaster = Forecaster::new(self);
        let mut predictions = Vec::with_capacity(length + 1);
        predictions.push(forecaster.prediction()?);
        for time in 0..length {
            forecaster.step(time, observations)?;
            predictions.push(forecaster.prediction()?);
        }
        Ok(predictions)
    }

    /// Samples `length` symbols for every target, feeding each one back.
    pub fn generate(
        &self,
        length: usize,
        seed: u64,
    ) -> GrangerResult<IndexMap<String, Vec<Symbol>>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut history: IndexMap<String, Vec<Symbol>> = self
            .targets()
            .map(|target| (target.to_string(), Vec::with_capacity(length)))
            .collect();
        let mut forecaster = Forecaster::new(self);
        for time in 0..length {
            let prediction = forecaster.prediction()?;
            for (target, distribution) in &prediction {
                let symbol = sample_index(&mut rng, distribution);
                if let Some(symbols) = history.get_mut(target) {
                    symbols.push(symbol);
                }
            }
            forecaster.step(time, &history)?;
        }
        debug!(length, targets = history.len(), seed, "generated streams");
        Ok(history)
    }
}

/// Free-function form of [`CausalNetwork::predict`].
pub fn predict<S: AsRef<[Symbol]>>(
    network: &CausalNetwork,
    observations: &IndexMap<String, S>,
) -> GrangerResult<IndexMap<String, Vec<f64>>> {
    network.predict(observations)
}

/// Free-function form of [`CausalNetwork::predict_stepwise`].
pub fn predict_stepwise<S: AsRef<[Symbol]>>(
    network: &CausalNetwork,
    observations: &IndexMap<String, S>,
) -> GrangerResult<Vec<IndexMap<String, Vec<f64>>>> {
    network.predict_stepwise(observations)
}

/// Free-function form of [`CausalNetwork::generate`].
pub fn generate(
    network: &CausalNetwork,
    length: usize,
    seed: u64,
) -> GrangerResult<IndexMap<String, Vec<Symbol>>> {
    network.generate(length, seed)
}
