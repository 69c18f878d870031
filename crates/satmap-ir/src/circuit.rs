//! Circuit container and builder API.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::{Instruction, InstructionKind};
use crate::qubit::{ClbitId, QubitId};

/// A named register: a contiguous range of flat bit indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    /// Register name as declared (`q`, `c`, ...).
    pub name: String,
    /// Flat index of the register's first bit.
    pub start: u32,
    /// Number of bits in the register.
    pub size: u32,
}

impl Register {
    /// Flat index of bit `offset` of this register, if in range.
    pub fn flat(&self, offset: u32) -> Option<u32> {
        (offset < self.size).then(|| self.start + offset)
    }

    /// Whether flat index `id` belongs to this register.
    pub fn contains(&self, id: u32) -> bool {
        id >= self.start && id < self.start + self.size
    }
}

/// A quantum circuit: declared registers plus an ordered instruction list.
///
/// Operands are validated against the declared registers when an
/// instruction is applied, so a `Circuit` never refers to undeclared bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    name: String,
    qregs: Vec<Register>,
    cregs: Vec<Register>,
    num_qubits: u32,
    num_clbits: u32,
    instructions: Vec<Instruction>,
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qregs: vec![],
            cregs: vec![],
            num_qubits: 0,
            num_clbits: 0,
            instructions: vec![],
        }
    }

    /// Create a circuit with one quantum register `q` and one classical
    /// register `c` of the given sizes.
    pub fn with_size(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        let mut circuit = Self::new(name);
        if num_qubits > 0 {
            circuit.qregs.push(Register {
                name: "q".into(),
                start: 0,
                size: num_qubits,
            });
            circuit.num_qubits = num_qubits;
        }
        if num_clbits > 0 {
            circuit.cregs.push(Register {
                name: "c".into(),
                start: 0,
                size: num_clbits,
            });
            circuit.num_clbits = num_clbits;
        }
        circuit
    }

    /// Declare a quantum register and return its qubit ids.
    pub fn add_qreg(&mut self, name: impl Into<String>, size: u32) -> IrResult<Vec<QubitId>> {
        let name = name.into();
        if self.qregs.iter().chain(&self.cregs).any(|r| r.name == name) {
            return Err(IrError::DuplicateRegister(name));
        }
        let start = self.num_qubits;
        self.qregs.push(Register { name, start, size });
        self.num_qubits += size;
        Ok((start..start + size).map(QubitId).collect())
    }

    /// Declare a classical register and return its bit ids.
    pub fn add_creg(&mut self, name: impl Into<String>, size: u32) -> IrResult<Vec<ClbitId>> {
        let name = name.into();
        if self.qregs.iter().chain(&self.cregs).any(|r| r.name == name) {
            return Err(IrError::DuplicateRegister(name));
        }
        let start = self.num_clbits;
        self.cregs.push(Register { name, start, size });
        self.num_clbits += size;
        Ok((start..start + size).map(ClbitId).collect())
    }

    /// Append an instruction after validating its operands.
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        self.validate(&instruction)?;
        self.instructions.push(instruction);
        Ok(self)
    }

    fn validate(&self, instruction: &Instruction) -> IrResult<()> {
        let gate_name = || Some(instruction.name().to_string());
        for (i, &q) in instruction.qubits.iter().enumerate() {
            if q.0 >= self.num_qubits {
                return Err(IrError::QubitNotFound {
                    qubit: q,
                    gate_name: gate_name(),
                });
            }
            if instruction.qubits[..i].contains(&q) {
                return Err(IrError::DuplicateQubit {
                    qubit: q,
                    gate_name: gate_name(),
                });
            }
        }
        for &c in &instruction.clbits {
            if c.0 >= self.num_clbits {
                return Err(IrError::ClbitNotFound {
                    clbit: c,
                    gate_name: gate_name(),
                });
            }
        }
        if matches!(instruction.kind, InstructionKind::Measure)
            && instruction.qubits.len() != instruction.clbits.len()
        {
            return Err(IrError::MeasureArity {
                qubits: instruction.qubits.len(),
                clbits: instruction.clbits.len(),
            });
        }
        Ok(())
    }

    /// Apply a named gate with parameters.
    pub fn gate(
        &mut self,
        name: impl Into<String>,
        params: impl IntoIterator<Item = String>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.apply(Instruction::gate(name, params, qubits))
    }

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::gate("h", [], [qubit]))
    }

    /// Apply CNOT gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::two_qubit_gate("cx", control, target))
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::two_qubit_gate("swap", q1, q2))
    }

    /// Measure a qubit into a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.apply(Instruction::measure(qubit, clbit))
    }

    /// Measure qubit `i` into classical bit `i` for every qubit that has a
    /// matching classical bit.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        for i in 0..self.num_qubits.min(self.num_clbits) {
            self.measure(QubitId(i), ClbitId(i))?;
        }
        Ok(self)
    }

    /// Reset a qubit.
    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::reset(qubit))
    }

    /// Apply a barrier across the given qubits.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.apply(Instruction::barrier(qubits))
    }

    /// Circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits as usize
    }

    /// Number of declared classical bits.
    pub fn num_clbits(&self) -> usize {
        self.num_clbits as usize
    }

    /// Declared quantum registers, in declaration order.
    pub fn qregs(&self) -> &[Register] {
        &self.qregs
    }

    /// Declared classical registers, in declaration order.
    pub fn cregs(&self) -> &[Register] {
        &self.cregs
    }

    /// Instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the circuit has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Two-qubit gates in program order, with their instruction index.
    pub fn two_qubit_ops(&self) -> impl Iterator<Item = (usize, &Instruction)> + '_ {
        self.instructions
            .iter()
            .enumerate()
            .filter(|(_, inst)| inst.is_two_qubit_gate())
    }

    /// One past the highest qubit index used by any instruction.
    pub fn used_qubits(&self) -> usize {
        self.instructions
            .iter()
            .flat_map(|inst| inst.qubits.iter())
            .map(|q| q.index() + 1)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_circuit() {
        let mut circuit = Circuit::with_size("bell", 2, 2);
        circuit.h(QubitId(0)).unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.measure_all().unwrap();

        assert_eq!(circuit.len(), 4);
        assert_eq!(circuit.two_qubit_ops().count(), 1);
        assert_eq!(circuit.used_qubits(), 2);
    }

    #[test]
    fn test_registers_are_contiguous() {
        let mut circuit = Circuit::new("regs");
        let a = circuit.add_qreg("a", 2).unwrap();
        let b = circuit.add_qreg("b", 3).unwrap();
        assert_eq!(a, vec![QubitId(0), QubitId(1)]);
        assert_eq!(b[0], QubitId(2));
        assert_eq!(circuit.qregs()[1].flat(2), Some(4));
        assert_eq!(circuit.qregs()[1].flat(3), None);
        assert!(matches!(
            circuit.add_creg("a", 1),
            Err(IrError::DuplicateRegister(_))
        ));
    }

    #[test]
    fn test_rejects_undeclared_qubit() {
        let mut circuit = Circuit::with_size("small", 2, 0);
        let err = circuit.cx(QubitId(0), QubitId(5)).unwrap_err();
        assert!(matches!(err, IrError::QubitNotFound { .. }));
        assert!(circuit.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_operand() {
        let mut circuit = Circuit::with_size("dup", 2, 0);
        let err = circuit.cx(QubitId(1), QubitId(1)).unwrap_err();
        assert!(matches!(err, IrError::DuplicateQubit { .. }));
    }
}
