//! Causal networks over many streams.
//!
//! For every ordered pair of streams `(source, target)` and every delay, a
//! cross automaton measures how much the source's past explains the
//! target's next symbol. Pairs scoring above the configured threshold become
//! predictor edges into the target; every target also keeps an
//! auto-predictor learned from its own history.

use indexmap::IndexMap;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use granger_core::{
    GrangerError, GrangerResult, LearnerConfig, NetworkConfig, Predictor, Stream,
    FALLBACK_DEPENDENCE,
};

use crate::automata::CrossAutomaton;
use crate::builder::{predictor_for, CrossBuilder};
use crate::words::{all_words, Context};

/// A predictor feeding one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Stream whose symbols are fed to the predictor.
    pub source: String,
    /// How many steps the source lags behind the target.
    pub delay: usize,
    pub predictor: Predictor,
    /// Marks the target's own fallback predictor.
    #[serde(default)]
    pub auto: bool,
}

/// Incoming edges per target stream, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CausalNetwork {
    targets: IndexMap<String, Vec<Edge>>,
}

impl CausalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: impl Into<String>, edge: Edge) {
        self.targets.entry(target.into()).or_default().push(edge);
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn edges(&self, target: &str) -> Option<&[Edge]> {
        self.targets.get(target).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Edge])> {
        self.targets
            .iter()
            .map(|(target, edges)| (target.as_str(), edges.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.targets.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> GrangerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a network and validates every predictor.
    pub fn from_json(json: &str) -> GrangerResult<Self> {
        let network: CausalNetwork = serde_json::from_str(json)?;
        for edges in network.targets.values() {
            for edge in edges {
                edge.predictor.validate()?;
            }
        }
        Ok(network)
    }

    /// Drops weak or degenerate edges.
    ///
    /// An edge survives when its dependence is at least `minimal_dependence`
    /// and its predictor is not degenerate. A target left without edges
    /// keeps its auto-predictor with the fallback dependence.
    pub fn prune(&self, minimal_dependence: f64) -> CausalNetwork {
        let mut pruned = CausalNetwork::new();
        for (target, edges) in &self.targets {
            let mut kept: Vec<Edge> = edges
                .iter()
                .filter(|edge| {
                    edge.predictor.dependence_coefficient >= minimal_dependence
                        && !edge.predictor.is_degenerate()
                })
                .cloned()
                .collect();
            if kept.is_empty() {
                let fallback = edges
                    .iter()
                    .rev()
                    .find(|edge| edge.auto)
                    .or_else(|| edges.last());
                if let Some(edge) = fallback {
                    let mut edge = edge.clone();
                    edge.predictor.dependence_coefficient = FALLBACK_DEPENDENCE;
                    kept.push(edge);
                }
            }
            debug!(target = %target, before = edges.len(), after = kept.len(), "pruned edges");
            pruned.targets.insert(target.clone(), kept);
        }
        pruned
    }
}

/// Free-function form of [`CausalNetwork::prune`].
pub fn prune(network: &CausalNetwork, minimal_dependence: f64) -> CausalNetwork {
    network.prune(minimal_dependence)
}

/// Result of learning one `(source, target, delay)` pair.
struct PairOutcome {
    edge: Option<Edge>,
    auto: Option<Edge>,
}

/// Learns the causal network of `streams`.
///
/// All streams must have the same length, longer than the largest delay.
pub fn make_granger_network(
    streams: &IndexMap<String, Stream>,
    config: &NetworkConfig,
) -> GrangerResult<CausalNetwork> {
    config.validate()?;
    let names: Vec<&String> = streams.keys().collect();
    let words: Vec<&Stream> = streams.values().collect();
    let Some(first) = words.first() else {
        return Err(GrangerError::invalid_parameter(
            "streams",
            "at least one stream is required",
        ));
    };
    let length = first.len();
    for (name, stream) in streams {
        if stream.is_empty() {
            return Err(GrangerError::EmptySequence(name.clone()));
        }
        if stream.len() != length {
            return Err(GrangerError::LengthMismatch {
                name: name.clone(),
                expected: length,
                found: stream.len(),
            });
        }
    }
    if length <= config.timeshift {
        return Err(GrangerError::invalid_parameter(
            "timeshift",
            format!("streams of length {length} cannot be shifted by {}", config.timeshift),
        ));
    }

    let learner = &config.learner;
    let delays = config.timeshift + 1;
    let mut sublanguages: FxHashMap<usize, Vec<Context>> = FxHashMap::default();
    for stream in &words {
        let k = stream.alphabet_size();
        sublanguages
            .entry(k)
            .or_insert_with(|| all_words(k, learner.resolved_max_length(k)));
    }

    info!(
        streams = words.len(),
        delays,
        length,
        parallel = config.parallel,
        "building causal network"
    );

    // Auto-regressive automata per (stream, delay).
    let auto_jobs: Vec<(usize, usize)> = (0..words.len())
        .flat_map(|i| (0..delays).map(move |d| (i, d)))
        .collect();
    let pfsas: Vec<Option<CrossAutomaton>> = run_jobs(config.parallel, &auto_jobs, |&(i, d)| {
        let stream = words[i];
        let word = &stream.symbols()[..length - d];
        let k = stream.alphabet_size();
        let learner = learner.with_seed(derive_seed(learner.seed, &[i, i, d, 0]));
        Ok(CrossBuilder::new(word, word, &learner)?
            .with_alphabets(k, k)?
            .with_sublanguage(&sublanguages[&k])
            .morph_as_weight(true)
            .build())
    })?;

    // Cross automata and predictors per (source, target, delay).
    let pair_jobs: Vec<(usize, usize, usize)> = (0..words.len())
        .flat_map(|i| (0..words.len()).flat_map(move |j| (0..delays).map(move |d| (i, j, d))))
        .collect();
    let outcomes = run_jobs(config.parallel, &pair_jobs, |&(i, j, d)| {
        let learner = learner.with_seed(derive_seed(learner.seed, &[i, j, d, 1]));
        learn_pair(
            words[i],
            words[j],
            names[i],
            d,
            pfsas[i * delays + d].as_ref(),
            i == j && d == 0,
            &learner,
            &sublanguages[&words[i].alphabet_size()],
            config.minimal_dependence,
        )
    })?;

    let mut network = CausalNetwork::new();
    for name in &names {
        network.targets.insert((*name).clone(), Vec::new());
    }
    let mut autos: Vec<Option<Edge>> = vec![None; words.len()];
    for (&(i, j, _), outcome) in pair_jobs.iter().zip(outcomes) {
        if let Some(edge) = outcome.edge {
            network.insert(names[j].as_str(), edge);
        }
        if outcome.auto.is_some() {
            autos[i] = outcome.auto;
        }
    }
    for (i, auto) in autos.into_iter().enumerate() {
        let edge = match auto {
            Some(edge) => edge,
            None => prior_edge(words[i], names[i]),
        };
        network.insert(names[i].as_str(), edge);
    }

    info!(
        targets = network.len(),
        edges = network.edge_count(),
        "causal network built"
    );
    Ok(network)
}

#[allow(clippy::too_many_arguments)]
fn learn_pair(
    source: &Stream,
    target: &Stream,
    source_name: &str,
    delay: usize,
    pfsa: Option<&CrossAutomaton>,
    is_auto: bool,
    learner: &LearnerConfig,
    sublanguage: &[Context],
    minimal_dependence: f64,
) -> GrangerResult<PairOutcome> {
    let length = source.len();
    let word_a = &source.symbols()[..length - delay];
    let word_b = &target.symbols()[delay..];
    let xpfsa = CrossBuilder::new(word_a, word_b, learner)?
        .with_alphabets(source.alphabet_size(), target.alphabet_size())?
        .with_sublanguage(sublanguage)
        .build();

    let (Some(pfsa), Some(xpfsa)) = (pfsa, xpfsa) else {
        debug!(source = source_name, delay, "no automaton learned for pair");
        return Ok(PairOutcome {
            edge: None,
            auto: is_auto.then(|| prior_edge(source, source_name)),
        });
    };

    let dependence =
        xpfsa.dependence_coefficient_with(word_a, word_b, learner.zero_entropy_policy)?;
    debug!(source = source_name, delay, dependence, states = xpfsa.nr_states(), "learned pair");

    let auto = if is_auto {
        Some(Edge {
            source: source_name.to_string(),
            delay: 0,
            predictor: predictor_for(pfsa, &xpfsa, FALLBACK_DEPENDENCE)?,
            auto: true,
        })
    } else {
        None
    };
    let edge = if dependence > minimal_dependence {
        Some(Edge {
            source: source_name.to_string(),
            delay,
            predictor: predictor_for(pfsa, &xpfsa, dependence)?,
            auto: false,
        })
    } else {
        None
    };
    Ok(PairOutcome { edge, auto })
}

/// Auto-predictor emitting the stream's marginals.
fn prior_edge(stream: &Stream, name: &str) -> Edge {
    Edge {
        source: name.to_string(),
        delay: 0,
        predictor: Predictor::prior(
            stream.alphabet_size(),
            stream.marginals(),
            FALLBACK_DEPENDENCE,
        ),
        auto: true,
    }
}

fn run_jobs<J, T, F>(parallel: bool, jobs: &[J], job: F) -> GrangerResult<Vec<T>>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> GrangerResult<T> + Sync + Send,
{
    if parallel {
        jobs.par_iter().map(&job).collect()
    } else {
        jobs.iter().map(&job).collect()
    }
}

/// Mixes a job's coordinates into the base seed.
fn derive_seed(seed: u64, parts: &[usize]) -> u64 {
    parts.iter().fold(seed, |acc, &part| {
        splitmix64(acc ^ (part as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    })
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
