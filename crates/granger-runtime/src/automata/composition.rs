//! Synchronous product of two automata and its projection.
//!
//! Both automata read the same symbol stream. The product tracks the pair of
//! states, weighted by the first automaton; projecting it onto the second
//! automaton's states averages the first automaton's weights under the
//! product's stationary distribution. The projection therefore moves like the
//! second automaton but emits symbols with the first one's statistics.

use tracing::debug;

use granger_core::{GrangerError, GrangerResult, StateId};

use super::automaton::Automaton;
use super::cross::CrossAutomaton;
use super::table::TransitionTable;
use super::{Model, StateMachine};

/// Owned product and projection of a composition.
#[derive(Debug, Clone)]
pub struct Composition {
    product: Automaton,
    projection: Model,
}

impl Composition {
    /// Product automaton; state `(x, y)` has id `y * |A| + x`.
    pub fn product(&self) -> &Automaton {
        &self.product
    }

    /// Projection onto the second automaton's states.
    pub fn projection(&self) -> &Model {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut Model {
        &mut self.projection
    }

    pub fn into_projection(self) -> Model {
        self.projection
    }
}

/// Composes `a` with `b`.
///
/// `b` must read at least every symbol `a` can emit. The projection is crossed
/// whenever `b` is, with `b`'s morph rows copied. Neither input is modified.
pub fn compose<A, B>(a: &A, b: &B) -> GrangerResult<Composition>
where
    A: StateMachine + ?Sized,
    B: StateMachine + ?Sized,
{
    let model_a = a.automaton();
    let model_b = b.automaton();
    let (table_a, table_b) = (model_a.table(), model_b.table());
    let (ka, kb) = (table_a.alphabet_size(), table_b.alphabet_size());
    if kb < ka {
        return Err(GrangerError::AlphabetMismatch {
            expected: ka,
            found: kb,
        });
    }

    let (na, nb) = (table_a.nr_states(), table_b.nr_states());
    let state_id = |x: StateId, y: StateId| y * na + x;
    let alphabet_size = ka.max(kb);

    let mut product_table = TransitionTable::new(na * nb, alphabet_size);
    for x in 0..na {
        for y in 0..nb {
            for symbol in 0..ka {
                product_table.set(
                    state_id(x, y),
                    symbol,
                    table_a.weight(x, symbol),
                    state_id(table_a.edge(x, symbol), table_b.edge(y, symbol)),
                );
            }
        }
    }
    let mut product = Automaton::new(product_table, model_a.seed());
    let stationary = product.stationary_distribution().to_vec();

    let mut projection_table = TransitionTable::new(nb, alphabet_size);
    for y in 0..nb {
        let occupancy: f64 = (0..na).map(|x| stationary[state_id(x, y)]).sum();
        for symbol in 0..kb {
            let mut weight = 0.0;
            if symbol < ka {
                weight = (0..na)
                    .map(|x| table_a.weight(x, symbol) * stationary[state_id(x, y)])
                    .sum();
            }
            let weight = if weight > 0.0 && occupancy > 0.0 {
                weight / occupancy
            } else {
                0.0
            };
            projection_table.set(y, symbol, weight, table_b.edge(y, symbol));
        }
    }

    let projected = Automaton::new(projection_table, model_b.seed());
    let projection = match b.morph() {
        Some(morph) => Model::Crossed(CrossAutomaton::from_parts(projected, morph.clone())),
        None => Model::Plain(projected),
    };
    debug!(
        product_states = na * nb,
        projection_states = nb,
        crossed = projection.as_crossed().is_some(),
        "composed automata"
    );
    Ok(Composition {
        product,
        projection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automata::table::Transition;

    /// Emits 0 and 1 with probability 0.5 from its single state.
    fn coin() -> Automaton {
        Automaton::from_transitions(
            2,
            [Transition::new(0, 0, 0.5, 0), Transition::new(0, 1, 0.5, 0)],
            1,
        )
        .unwrap()
    }

    /// Remembers the last symbol; state s emits s on the secondary side.
    fn memory() -> CrossAutomaton {
        CrossAutomaton::from_transitions(
            2,
            [
                Transition::new(0, 0, 1.0, 0),
                Transition::new(0, 1, 1.0, 1),
                Transition::new(1, 0, 1.0, 0),
                Transition::new(1, 1, 1.0, 1),
            ],
            2,
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_product_state_numbering() {
        let a = memory();
        let b = memory();
        let composition = compose(&a, &b).unwrap();
        let product = composition.product();
        assert_eq!(product.nr_states(), 4);
        // (x=0, y=1) is id 2; symbol 1 moves both to state 1: id 3
        assert_eq!(product.table().edge(2, 1), 3);
        assert_eq!(product.table().edge(2, 0), 0);
        assert_eq!(product.seed(), 2);
    }

    #[test]
    fn test_projection_carries_first_weights() {
        let a = coin();
        let b = memory();
        let mut composition = compose(&a, &b).unwrap();
        let projection = composition.projection_mut();
        assert_eq!(projection.nr_states(), 2);
        let table = StateMachine::automaton(projection).table().clone();
        for y in 0..2 {
            assert!((table.weight(y, 0) - 0.5).abs() < 1e-9);
            assert!((table.weight(y, 1) - 0.5).abs() < 1e-9);
            assert_eq!(table.edge(y, 1), 1);
        }
        let pi = projection.stationary_distribution().to_vec();
        assert!((pi[0] - 0.5).abs() < 1e-9);

        let morph = projection.morph().unwrap();
        assert_eq!(morph.rows(), memory().morph().rows());
    }

    #[test]
    fn test_plain_second_gives_plain_projection() {
        let composition = compose(&memory(), &coin()).unwrap();
        assert!(composition.projection().as_crossed().is_none());
        assert_eq!(composition.projection().nr_states(), 1);
    }

    #[test]
    fn test_smaller_second_alphabet_is_rejected() {
        let wide = Automaton::from_transitions(3, [Transition::new(0, 2, 1.0, 0)], 1).unwrap();
        assert!(matches!(
            compose(&wide, &coin()),
            Err(GrangerError::AlphabetMismatch { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn test_inputs_are_untouched() {
        let a = coin();
        let b = memory();
        let _ = compose(&a, &b).unwrap();
        assert!(a.cached_stationary().is_none());
        assert_eq!(b.automaton().cursor(), 0);
    }
}
