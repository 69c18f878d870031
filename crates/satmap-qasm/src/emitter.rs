//! QASM2 emitter for serializing circuits.

use std::fmt::Write;

use satmap_ir::{Circuit, Instruction, InstructionKind};

use crate::error::ParseResult;

/// Emit a circuit as OpenQASM 2.0 source code.
///
/// All registers are flattened into a single `qreg q[n]` and `creg c[m]`,
/// so the output of a mapped circuit is indexed by physical qubit.
pub fn emit(circuit: &Circuit) -> ParseResult<String> {
    let mut out = String::new();
    out.push_str("OPENQASM 2.0;\n");
    out.push_str("include \"qelib1.inc\";\n");

    if circuit.num_qubits() > 0 {
        let _ = writeln!(out, "qreg q[{}];", circuit.num_qubits());
    }
    if circuit.num_clbits() > 0 {
        let _ = writeln!(out, "creg c[{}];", circuit.num_clbits());
    }

    for instruction in circuit.instructions() {
        emit_instruction(&mut out, instruction);
    }
    Ok(out)
}

fn emit_instruction(out: &mut String, instruction: &Instruction) {
    let qubits = instruction
        .qubits
        .iter()
        .map(|q| format!("q[{}]", q.0))
        .collect::<Vec<_>>()
        .join(",");

    match &instruction.kind {
        InstructionKind::Gate { name, params } if params.is_empty() => {
            let _ = writeln!(out, "{name} {qubits};");
        }
        InstructionKind::Gate { name, params } => {
            let _ = writeln!(out, "{name}({}) {qubits};", params.join(","));
        }
        InstructionKind::Measure => {
            for (q, c) in instruction.qubits.iter().zip(&instruction.clbits) {
                let _ = writeln!(out, "measure q[{}] -> c[{}];", q.0, c.0);
            }
        }
        InstructionKind::Reset => {
            let _ = writeln!(out, "reset {qubits};");
        }
        InstructionKind::Barrier => {
            let _ = writeln!(out, "barrier {qubits};");
        }
    }
}
