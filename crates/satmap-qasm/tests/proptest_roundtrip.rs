//! Property-based tests for QASM2 roundtrip conversion.

use proptest::prelude::*;
use satmap_ir::{Circuit, QubitId};
use satmap_qasm::{emit, parse};

#[derive(Debug, Clone)]
enum GateOp {
    H(u32),
    Rz(u32, String),
    Cx(u32, u32),
    Cz(u32, u32),
    Barrier,
}

impl GateOp {
    fn apply(self, circuit: &mut Circuit) {
        let _ = match self {
            GateOp::H(q) => circuit.h(QubitId(q)),
            GateOp::Rz(q, angle) => circuit.gate("rz", [angle], [QubitId(q)]),
            GateOp::Cx(a, b) => circuit.cx(QubitId(a), QubitId(b)),
            GateOp::Cz(a, b) => circuit.gate("cz", [], [QubitId(a), QubitId(b)]),
            GateOp::Barrier => {
                let all: Vec<_> = (0..circuit.num_qubits() as u32).map(QubitId).collect();
                circuit.barrier(all)
            }
        };
    }
}

fn distinct_pair(num_qubits: u32) -> impl Strategy<Value = (u32, u32)> {
    (0..num_qubits, 0..num_qubits).prop_filter("distinct operands", |(a, b)| a != b)
}

fn arb_gate_op(num_qubits: u32) -> impl Strategy<Value = GateOp> {
    prop_oneof![
        (0..num_qubits).prop_map(GateOp::H),
        (0..num_qubits, prop::sample::select(vec!["pi/2", "-pi/4", "0.125", "2*pi/3"]))
            .prop_map(|(q, a)| GateOp::Rz(q, a.to_string())),
        distinct_pair(num_qubits).prop_map(|(a, b)| GateOp::Cx(a, b)),
        distinct_pair(num_qubits).prop_map(|(a, b)| GateOp::Cz(a, b)),
        Just(GateOp::Barrier),
    ]
}

fn arb_circuit() -> impl Strategy<Value = Circuit> {
    (2_u32..=6).prop_flat_map(|num_qubits| {
        prop::collection::vec(arb_gate_op(num_qubits), 0..=20).prop_map(move |ops| {
            let mut circuit = Circuit::with_size("test", num_qubits, num_qubits);
            for op in ops {
                op.apply(&mut circuit);
            }
            let _ = circuit.measure_all();
            circuit
        })
    })
}

proptest! {
    /// Emitting and re-parsing keeps every instruction and the interaction order.
    #[test]
    fn test_roundtrip_preserves_instructions(circuit in arb_circuit()) {
        let qasm = emit(&circuit).expect("emit failed");
        let parsed = parse(&qasm).expect("parse failed");

        prop_assert_eq!(parsed.num_qubits(), circuit.num_qubits());
        prop_assert_eq!(parsed.num_clbits(), circuit.num_clbits());
        prop_assert_eq!(parsed.instructions(), circuit.instructions());
    }

    #[test]
    fn test_emit_is_deterministic(circuit in arb_circuit()) {
        prop_assert_eq!(emit(&circuit).unwrap(), emit(&circuit).unwrap());
    }
}
