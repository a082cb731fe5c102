//! Strongly connected components and reduction to one of them.

use std::collections::BTreeSet;

use granger_core::numeric::squared_distance;
use granger_core::StateId;

use super::table::TransitionTable;

/// Tarjan's algorithm with an explicit call stack.
///
/// Every arc counts, including weight-0 defaults. Components are returned
/// in the order Tarjan completes them.
pub fn strongly_connected_components(table: &TransitionTable) -> Vec<BTreeSet<StateId>> {
    let n = table.nr_states();
    let k = table.alphabet_size();
    // 0 marks unvisited, discovery numbers start at 1
    let mut index = vec![0usize; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<StateId> = Vec::new();
    let mut frames: Vec<(StateId, usize)> = Vec::new();
    let mut components = Vec::new();
    let mut counter = 0;

    for root in 0..n {
        if index[root] != 0 {
            continue;
        }
        counter += 1;
        index[root] = counter;
        lowlink[root] = counter;
        stack.push(root);
        on_stack[root] = true;
        frames.push((root, 0));

        while let Some(frame) = frames.last_mut() {
            let state = frame.0;
            if frame.1 < k {
                let child = table.edge(state, frame.1);
                frame.1 += 1;
                if index[child] == 0 {
                    counter += 1;
                    index[child] = counter;
                    lowlink[child] = counter;
                    stack.push(child);
                    on_stack[child] = true;
                    frames.push((child, 0));
                } else if on_stack[child] {
                    lowlink[state] = lowlink[state].min(index[child]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[state]);
            }
            if lowlink[state] == index[state] {
                let mut component = BTreeSet::new();
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    component.insert(member);
                    if member == state {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }
    components
}

/// Surviving states (old ids, ascending) and their renumbered table.
#[derive(Debug, Clone)]
pub(crate) struct Reduction {
    pub states: Vec<StateId>,
    pub table: TransitionTable,
}

/// Reduces `table` to its best-supported component.
///
/// Returns `None` when the table is already strongly connected.
pub(crate) fn reduce(table: &TransitionTable, state_counts: &[u64]) -> Option<Reduction> {
    let mut components = strongly_connected_components(table);
    if components.len() <= 1 {
        return None;
    }
    if components.iter().any(|c| c.len() > 1) {
        components.retain(|c| c.len() > 1);
    }

    let support = |component: &BTreeSet<StateId>| -> u64 {
        component
            .iter()
            .map(|&s| state_counts.get(s).copied().unwrap_or(0))
            .sum()
    };
    let mut chosen = &components[0];
    let mut best = support(chosen);
    for component in &components[1..] {
        let candidate = support(component);
        if candidate > best {
            best = candidate;
            chosen = component;
        }
    }

    let states: Vec<StateId> = chosen.iter().copied().collect();
    let mut renumber = vec![usize::MAX; table.nr_states()];
    for (new_id, &state) in states.iter().enumerate() {
        renumber[state] = new_id;
    }

    let k = table.alphabet_size();
    let mut reduced = TransitionTable::new(states.len(), k);
    for (new_id, &state) in states.iter().enumerate() {
        for symbol in 0..k {
            let mut target = table.edge(state, symbol);
            if !chosen.contains(&target) {
                target = nearest_state(table, target, &states);
            }
            reduced.set(new_id, symbol, table.weight(state, symbol), renumber[target]);
        }
    }
    Some(Reduction {
        states,
        table: reduced,
    })
}

/// Candidate whose weight row is closest to `target`'s; first wins ties.
fn nearest_state(table: &TransitionTable, target: StateId, candidates: &[StateId]) -> StateId {
    let row = table.weight_row(target);
    let mut nearest = candidates[0];
    let mut smallest = f64::INFINITY;
    for &candidate in candidates {
        let distance = squared_distance(row, table.weight_row(candidate));
        if distance < smallest {
            smallest = distance;
            nearest = candidate;
        }
    }
    nearest
}
