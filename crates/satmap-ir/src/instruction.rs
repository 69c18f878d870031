//! Circuit instructions.

use serde::{Deserialize, Serialize};

use crate::qubit::{ClbitId, QubitId};

/// The kind of instruction in a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// A gate, identified by name. Parameters are kept as source text so
    /// that symbolic angles survive a parse/emit cycle unchanged.
    Gate {
        /// Gate name as written in the source (`cx`, `rz`, ...).
        name: String,
        /// Parameter expressions, verbatim.
        params: Vec<String>,
    },
    /// Measurement operation.
    Measure,
    /// Reset qubit to |0⟩.
    Reset,
    /// Barrier (synchronization point).
    Barrier,
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits this instruction operates on.
    pub qubits: Vec<QubitId>,
    /// Classical bits this instruction operates on (for measure).
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// Create a gate instruction.
    pub fn gate(
        name: impl Into<String>,
        params: impl IntoIterator<Item = String>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> Self {
        Self {
            kind: InstructionKind::Gate {
                name: name.into(),
                params: params.into_iter().collect(),
            },
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create an unparameterised two-qubit gate instruction.
    pub fn two_qubit_gate(name: impl Into<String>, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(name, [], [q1, q2])
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a reset instruction.
    pub fn reset(qubit: QubitId) -> Self {
        Self {
            kind: InstructionKind::Reset,
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Name of the instruction as it appears in QASM.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate { name, .. } => name,
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
        }
    }

    /// Check if this is a gate.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate { .. })
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// A gate acting on exactly two qubits, i.e. one that needs the two
    /// qubits to sit on adjacent physical qubits.
    pub fn is_two_qubit_gate(&self) -> bool {
        self.is_gate() && self.qubits.len() == 2
    }

    /// Copy of this instruction with every qubit operand passed through `f`.
    #[must_use]
    pub fn map_qubits(&self, mut f: impl FnMut(QubitId) -> QubitId) -> Self {
        Self {
            kind: self.kind.clone(),
            qubits: self.qubits.iter().map(|&q| f(q)).collect(),
            clbits: self.clbits.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_qubit_gate() {
        let inst = Instruction::two_qubit_gate("cx", QubitId(0), QubitId(1));
        assert!(inst.is_two_qubit_gate());
        assert_eq!(inst.name(), "cx");

        let barrier = Instruction::barrier([QubitId(0), QubitId(1)]);
        assert!(!barrier.is_two_qubit_gate());
    }

    #[test]
    fn test_map_qubits() {
        let inst = Instruction::gate("rz", ["pi/2".to_string()], [QubitId(2)]);
        let mapped = inst.map_qubits(|q| QubitId(q.0 + 3));
        assert_eq!(mapped.qubits, vec![QubitId(5)]);
        assert_eq!(mapped.kind, inst.kind);
    }
}
