//! Interaction extraction.

use satmap_ir::{Circuit, QubitId};
use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// A two-qubit operation of the logical circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// First operand (control for `cx`).
    pub control: QubitId,
    /// Second operand.
    pub target: QubitId,
    /// Index of the instruction in the circuit.
    pub instruction: usize,
}

/// The interaction sequence of a circuit, in program order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interactions {
    /// Number of logical qubits: one past the highest qubit index any
    /// instruction touches.
    pub logical_count: usize,
    /// Two-qubit operations in program order.
    pub interactions: Vec<Interaction>,
}

impl Interactions {
    /// Number of interactions.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether there are no interactions.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}

/// Extract the interaction sequence of `circuit`.
///
/// Every gate with exactly two qubit operands is an interaction. Gates on
/// three or more qubits cannot sit on a single coupling edge and are
/// rejected; barriers of any width are fine.
pub fn extract(circuit: &Circuit) -> MapResult<Interactions> {
    let declared = circuit.num_qubits();
    let mut logical_count = 0;
    let mut interactions = vec![];

    for (index, instruction) in circuit.instructions().iter().enumerate() {
        for q in &instruction.qubits {
            if q.index() >= declared {
                return Err(MapError::MalformedCircuit(format!(
                    "instruction {index} ('{}') uses {q}, but only {declared} qubits are declared",
                    instruction.name()
                )));
            }
            logical_count = logical_count.max(q.index() + 1);
        }

        if instruction.is_barrier() || !instruction.is_gate() {
            continue;
        }
        match instruction.qubits.as_slice() {
            [control, target] if control == target => {
                return Err(MapError::MalformedCircuit(format!(
                    "instruction {index} ('{}') uses {control} twice",
                    instruction.name()
                )));
            }
            &[control, target] => interactions.push(Interaction {
                control,
                target,
                instruction: index,
            }),
            qubits if qubits.len() > 2 => {
                return Err(MapError::MalformedCircuit(format!(
                    "instruction {index} ('{}') acts on {} qubits; decompose it first",
                    instruction.name(),
                    qubits.len()
                )));
            }
            _ => {}
        }
    }

    Ok(Interactions {
        logical_count,
        interactions,
    })
}
