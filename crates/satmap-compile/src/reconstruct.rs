//! Rebuilding the physical circuit from a verified schedule.

use satmap_ir::{Circuit, Instruction, QubitId};

use crate::error::{MapError, MapResult};
use crate::extract::Interactions;
use crate::layout::Layout;
use crate::ordering::Schedule;
use crate::topology::Topology;

/// A verified mapping of every slot.
#[derive(Debug, Clone, Copy)]
pub struct SlotPlan<'a> {
    pub interactions: &'a Interactions,
    pub schedule: &'a Schedule,
    /// Layout at each slot.
    pub layouts: &'a [Layout],
    /// Swaps entering each slot.
    pub swaps: &'a [Vec<(u32, u32)>],
}

/// Wire predecessors of every instruction: the previous instruction on each
/// of its qubits and classical bits.
fn predecessors(circuit: &Circuit) -> Vec<Vec<usize>> {
    let mut last_qubit: Vec<Option<usize>> = vec![None; circuit.num_qubits()];
    let mut last_clbit: Vec<Option<usize>> = vec![None; circuit.num_clbits()];
    circuit
        .instructions()
        .iter()
        .enumerate()
        .map(|(i, inst)| {
            let mut preds: Vec<usize> = inst
                .qubits
                .iter()
                .filter_map(|q| last_qubit.get_mut(q.index()).and_then(|s| s.replace(i)))
                .chain(
                    inst.clbits
                        .iter()
                        .filter_map(|c| last_clbit.get_mut(c.0 as usize).and_then(|s| s.replace(i))),
                )
                .collect();
            preds.sort_unstable();
            preds.dedup();
            preds
        })
        .collect()
}

struct Emitter<'a> {
    source: &'a Circuit,
    topology: &'a Topology,
    out: Circuit,
    emitted: Vec<bool>,
    is_interaction: Vec<bool>,
    preds: Vec<Vec<usize>>,
}

impl Emitter<'_> {
    fn push(&mut self, inst: Instruction) -> MapResult<()> {
        if let [a, b] = inst.qubits.as_slice() {
            if inst.is_gate() && !self.topology.is_adjacent(a.0, b.0) {
                return Err(MapError::NonAdjacentInteraction {
                    gate: inst.name().to_string(),
                    instruction: self.out.len(),
                    physical: (a.0, b.0),
                });
            }
        }
        self.out.apply(inst)?;
        Ok(())
    }

    fn place(&mut self, index: usize, layout: &Layout) -> MapResult<()> {
        let inst = self.source.instructions()[index]
            .map_qubits(|q| layout.physical(q).map_or(q, QubitId));
        self.emitted[index] = true;
        self.push(inst)
    }

    /// Emit every pending transitive wire predecessor of `index`, deepest
    /// first. Those must all be non-interactions.
    fn emit_before(&mut self, index: usize, layout: &Layout) -> MapResult<()> {
        let mut stack: Vec<(usize, bool)> =
            self.preds[index].iter().rev().map(|&p| (p, false)).collect();
        while let Some((i, expanded)) = stack.pop() {
            if self.emitted[i] {
                continue;
            }
            if expanded {
                self.place(i, layout)?;
                continue;
            }
            if self.is_interaction[i] {
                return Err(MapError::MalformedCircuit(format!(
                    "slot order places instruction {index} before its dependency {i}"
                )));
            }
            stack.push((i, true));
            for &p in self.preds[i].iter().rev() {
                if !self.emitted[p] {
                    stack.push((p, false));
                }
            }
        }
        Ok(())
    }
}

/// Rebuild `circuit` on physical qubits.
///
/// Instructions come out in an order consistent with the slot order: before
/// each slot's interaction, its pending wire predecessors are emitted under
/// the current layout, then the slot's swaps as `swap` gates. Whatever is
/// left after the last slot follows under the final layout. Every emitted
/// two-qubit gate, swaps included, must sit on a coupling edge.
pub fn reconstruct(
    circuit: &Circuit,
    plan: SlotPlan<'_>,
    topology: &Topology,
) -> MapResult<Circuit> {
    let n = circuit.instructions().len();
    let mut is_interaction = vec![false; n];
    for inter in &plan.interactions.interactions {
        is_interaction[inter.instruction] = true;
    }
    let width = topology.num_qubits();
    let mut emitter = Emitter {
        source: circuit,
        topology,
        out: Circuit::with_size(circuit.name(), width, circuit.num_clbits() as u32),
        emitted: vec![false; n],
        is_interaction,
        preds: predecessors(circuit),
    };

    let logical = plan.interactions.logical_count;
    let mut current = plan
        .layouts
        .first()
        .cloned()
        .unwrap_or_else(|| Layout::trivial(logical, width as usize));

    for (slot, &inter) in plan.schedule.slots.iter().enumerate() {
        let index = plan.interactions.interactions[inter].instruction;
        let Some(target) = plan.layouts.get(slot) else {
            return Err(MapError::MalformedCircuit(format!("no layout for slot {slot}")));
        };

        emitter.emit_before(index, &current)?;

        for &(u, v) in plan.swaps.get(slot).map_or(&[][..], Vec::as_slice) {
            emitter.push(Instruction::two_qubit_gate("swap", QubitId(u), QubitId(v)))?;
            current.swap(u, v);
        }
        debug_assert_eq!(&current, target);
        current = target.clone();
        emitter.place(index, &current)?;
    }

    for i in 0..n {
        if !emitter.emitted[i] {
            emitter.place(i, &current)?;
        }
    }
    Ok(emitter.out)
}
