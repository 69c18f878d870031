//! Swap counting and fidelity estimates.

use satmap_ir::Circuit;

use crate::calibration::Calibration;
use crate::error::{MapError, MapResult};

/// Number of swaps in a per-slot schedule.
pub fn swap_count(swaps: &[Vec<(u32, u32)>]) -> usize {
    swaps.iter().map(Vec::len).sum()
}

/// Estimated success probability of a physical circuit.
///
/// Each two-qubit gate contributes `1 - e` for the error rate `e` of its
/// edge; a `swap` is three such gates and contributes `(1 - e)^3`. Every
/// other instruction is taken as error-free.
pub fn fidelity(circuit: &Circuit, calibration: &Calibration) -> MapResult<f64> {
    let mut total = 1.0;
    for (index, inst) in circuit.two_qubit_ops() {
        let (a, b) = (inst.qubits[0].0, inst.qubits[1].0);
        let success = calibration
            .success_rate(a, b)
            .ok_or_else(|| MapError::NonAdjacentInteraction {
                gate: inst.name().to_string(),
                instruction: index,
                physical: (a, b),
            })?;
        total *= if inst.name() == "swap" {
            success.powi(3)
        } else {
            success
        };
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use satmap_ir::QubitId;

    fn calibration() -> Calibration {
        Calibration::from_edge_rates([((0, 1), 0.1), ((1, 2), 0.2)]).unwrap()
    }

    #[test]
    fn test_single_interaction() {
        let mut c = Circuit::with_size("t", 2, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap();
        assert!((fidelity(&c, &calibration()).unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_swap_counts_cubed() {
        let mut c = Circuit::with_size("t", 2, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.swap(QubitId(1), QubitId(0)).unwrap();
        let expected = 0.9 * 0.9f64.powi(3);
        assert!((fidelity(&c, &calibration()).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_single_qubit_gates_are_free() {
        let mut c = Circuit::with_size("t", 3, 0);
        c.h(QubitId(2)).unwrap();
        c.cx(QubitId(2), QubitId(1)).unwrap();
        assert!((fidelity(&c, &calibration()).unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_uncalibrated_edge() {
        let mut c = Circuit::with_size("t", 3, 0);
        c.cx(QubitId(0), QubitId(2)).unwrap();
        assert!(matches!(
            fidelity(&c, &calibration()),
            Err(MapError::NonAdjacentInteraction { physical: (0, 2), .. })
        ));
    }

    #[test]
    fn test_swap_count() {
        assert_eq!(swap_count(&[vec![], vec![(0, 1), (1, 2)], vec![(2, 3)]]), 3);
    }
}
