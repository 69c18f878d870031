//! Slot ordering, layering and chunking of the interaction sequence.

use std::ops::Range;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashSet;
use satmap_ir::Circuit;
use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};
use crate::extract::Interactions;

/// How interactions are ordered into slots and grouped into layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layering {
    /// Program order, one slot per layer.
    #[default]
    Trivial,
    /// Program order; a layer closes when the next interaction touches a
    /// qubit already used in it.
    Conflict,
    /// Topological layers of the dependency DAG; slots are reordered layer
    /// by layer.
    Dependency,
}

/// The slot order of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Interaction index (into [`Interactions::interactions`]) of each slot.
    pub slots: Vec<usize>,
    /// Layer id of each slot; nondecreasing.
    pub layers: Vec<usize>,
}

impl Schedule {
    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether there are no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of distinct layers.
    pub fn num_layers(&self) -> usize {
        self.layers.last().map_or(0, |&l| l + 1)
    }

    /// For each slot of `window`, whether it opens a layer inside the window.
    /// The first slot of a window always does.
    pub fn layer_starts(&self, window: &Range<usize>) -> Vec<bool> {
        window
            .clone()
            .map(|k| k == window.start || self.layers[k] != self.layers[k - 1])
            .collect()
    }
}

/// Order the interactions of `circuit` into slots.
pub fn schedule(circuit: &Circuit, interactions: &Interactions, layering: Layering) -> MapResult<Schedule> {
    let n = interactions.len();
    match layering {
        Layering::Trivial => Ok(Schedule {
            slots: (0..n).collect(),
            layers: (0..n).collect(),
        }),
        Layering::Conflict => Ok(conflict_layers(interactions)),
        Layering::Dependency => dependency_layers(circuit, interactions),
    }
}

fn conflict_layers(interactions: &Interactions) -> Schedule {
    let mut layers = Vec::with_capacity(interactions.len());
    let mut busy = FxHashSet::default();
    let mut layer = 0;

    for (i, inter) in interactions.interactions.iter().enumerate() {
        if i > 0 && (busy.contains(&inter.control) || busy.contains(&inter.target)) {
            layer += 1;
            busy.clear();
        }
        busy.insert(inter.control);
        busy.insert(inter.target);
        layers.push(layer);
    }

    Schedule {
        slots: (0..interactions.len()).collect(),
        layers,
    }
}

/// Layer each interaction by the longest chain of interactions before it in
/// the dependency DAG of the whole circuit. Single-qubit gates pass
/// dependencies through without adding depth; barriers join their wires.
fn dependency_layers(circuit: &Circuit, interactions: &Interactions) -> MapResult<Schedule> {
    let instructions = circuit.instructions();
    let mut dag: DiGraph<usize, ()> = DiGraph::with_capacity(instructions.len(), 0);
    let nodes: Vec<NodeIndex> = (0..instructions.len()).map(|i| dag.add_node(i)).collect();

    let mut last_on_qubit: Vec<Option<NodeIndex>> = vec![None; circuit.num_qubits()];
    let mut last_on_clbit: Vec<Option<NodeIndex>> = vec![None; circuit.num_clbits()];
    for (i, inst) in instructions.iter().enumerate() {
        for q in &inst.qubits {
            if let Some(prev) = last_on_qubit[q.index()].replace(nodes[i]) {
                dag.update_edge(prev, nodes[i], ());
            }
        }
        for c in &inst.clbits {
            if let Some(prev) = last_on_clbit[c.0 as usize].replace(nodes[i]) {
                dag.update_edge(prev, nodes[i], ());
            }
        }
    }

    let order = toposort(&dag, None)
        .map_err(|_| MapError::MalformedCircuit("instruction dependencies form a cycle".into()))?;

    let mut is_interaction = vec![false; instructions.len()];
    for inter in &interactions.interactions {
        is_interaction[inter.instruction] = true;
    }

    // Interactions on the longest path ending at each instruction, inclusive.
    let mut reach = vec![0usize; instructions.len()];
    for node in order {
        let i = dag[node];
        let before = dag
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|p| reach[dag[p]])
            .max()
            .unwrap_or(0);
        reach[i] = before + usize::from(is_interaction[i]);
    }

    let mut keyed: Vec<(usize, usize)> = interactions
        .interactions
        .iter()
        .enumerate()
        .map(|(idx, inter)| (reach[inter.instruction] - 1, idx))
        .collect();
    keyed.sort_unstable();

    // Renumber so that layer ids are dense.
    let mut layers = Vec::with_capacity(keyed.len());
    let mut dense = 0;
    for (k, &(level, _)) in keyed.iter().enumerate() {
        if k > 0 && level != keyed[k - 1].0 {
            dense += 1;
        }
        layers.push(dense);
    }

    Ok(Schedule {
        slots: keyed.into_iter().map(|(_, idx)| idx).collect(),
        layers,
    })
}

/// Split `num_slots` slots into chunks of about `slice_size`.
///
/// The chunk count is `ceil(num_slots / slice_size)`; every chunk gets
/// `num_slots / chunks` slots and the last one absorbs the remainder.
pub fn chunk_windows(num_slots: usize, slice_size: usize) -> Vec<Range<usize>> {
    if num_slots == 0 || slice_size == 0 {
        return vec![];
    }
    let chunks = num_slots.div_ceil(slice_size);
    let size = num_slots / chunks;
    (0..chunks)
        .map(|c| {
            let end = if c + 1 == chunks { num_slots } else { (c + 1) * size };
            c * size..end
        })
        .collect()
}
