//! Decoding oracle models into per-slot layouts and checking them.

use tracing::debug;

use crate::codec::Var;
use crate::encoder::Instance;
use crate::error::{MapError, MapResult};
use crate::layout::{Layout, compose_swaps};
use crate::oracle::Model;
use crate::topology::Topology;

/// Raw content of a model, before any check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// `(logical, physical)` pairs of each slot, in variable order.
    pub placements: Vec<Vec<(u32, u32)>>,
    /// Swaps entering each slot, in step order. Null swaps are dropped.
    pub swaps: Vec<Vec<(u32, u32)>>,
}

impl Decoded {
    /// Whether the chunk's last slot has any placement at all.
    pub fn has_boundary(&self) -> bool {
        self.placements.last().is_some_and(|p| !p.is_empty())
    }
}

/// Read placements and swaps out of `model`.
///
/// Swap variables only carry meaning at the instance's swap slots and are
/// ignored elsewhere.
pub fn decode(instance: &Instance, model: &Model) -> MapResult<Decoded> {
    let codec = instance.codec();
    let slots = instance.dims.slots;
    let mut placements = vec![Vec::new(); slots];
    let mut steps: Vec<Vec<(usize, u32, u32)>> = vec![Vec::new(); slots];

    for id in model.true_vars() {
        match codec.decode(id)?.var {
            Var::Placement { phys, log, slot } => {
                placements[slot].push((log as u32, phys as u32));
            }
            Var::Swap { u, v, step, slot } if u != v && instance.swap_slots.contains(&slot) => {
                steps[slot].push((step, u as u32, v as u32));
            }
            _ => {}
        }
    }

    let swaps = steps
        .into_iter()
        .map(|mut s| {
            s.sort_unstable();
            s.into_iter().map(|(_, u, v)| (u, v)).collect()
        })
        .collect();
    Ok(Decoded { placements, swaps })
}

/// Check a chunk's placements and swaps, returning one layout per slot.
///
/// - every slot's placement is a bijection onto distinct physical qubits;
/// - slot 0 equals `boundary` when one is given;
/// - every swap is on a coupling edge, and none precede slot 0;
/// - from slot to slot, every logical qubit moves exactly as the slot's
///   swaps move it.
pub fn verify(
    chunk: usize,
    decoded: &Decoded,
    topology: &Topology,
    logical_count: usize,
    boundary: Option<&Layout>,
) -> MapResult<Vec<Layout>> {
    let phys = topology.num_qubits() as usize;
    let mut layouts: Vec<Layout> = Vec::with_capacity(decoded.placements.len());

    let checked = slot_layouts(chunk, decoded, phys, logical_count)?;
    for (slot, layout) in checked.into_iter().enumerate() {
        let swaps = decoded.swaps.get(slot).map_or(&[][..], Vec::as_slice);
        for &edge in swaps {
            if slot == 0 || !topology.is_adjacent(edge.0, edge.1) {
                return Err(MapError::InvalidSwapEdge { chunk, slot, edge });
            }
        }

        match layouts.last() {
            None => {
                if let Some(expected) = boundary {
                    check_boundary(chunk, expected, &layout)?;
                }
            }
            Some(prev) => {
                let image = compose_swaps(swaps, phys);
                for (q, before) in prev.iter() {
                    let expected = image[before as usize];
                    let found = layout.physical(q).unwrap_or(u32::MAX);
                    if found != expected {
                        return Err(MapError::UnexplainedMapping {
                            chunk,
                            slot,
                            logical: q.0,
                            expected,
                            found,
                        });
                    }
                }
            }
        }
        layouts.push(layout);
    }

    debug!(chunk, slots = layouts.len(), "chunk verified");
    Ok(layouts)
}

/// One layout per slot, failing on the first slot whose placement is not a
/// bijection.
pub fn slot_layouts(
    chunk: usize,
    decoded: &Decoded,
    num_physical: usize,
    logical_count: usize,
) -> MapResult<Vec<Layout>> {
    decoded
        .placements
        .iter()
        .enumerate()
        .map(|(slot, pairs)| {
            Layout::from_pairs(logical_count, num_physical, pairs.iter().copied()).map_err(|conflict| {
                MapError::NonInjectiveMapping {
                    chunk,
                    slot,
                    detail: conflict.to_string(),
                }
            })
        })
        .collect()
}

fn check_boundary(chunk: usize, expected: &Layout, found: &Layout) -> MapResult<()> {
    for (q, p) in expected.iter() {
        let actual = found.physical(q).unwrap_or(u32::MAX);
        if actual != p {
            return Err(MapError::InconsistentBoundary {
                chunk,
                logical: q.0,
                expected: p,
                found: actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(placements: Vec<Vec<(u32, u32)>>, swaps: Vec<Vec<(u32, u32)>>) -> Decoded {
        Decoded { placements, swaps }
    }

    #[test]
    fn test_accepts_explained_swap() {
        let topology = Topology::linear(3);
        let d = decoded(
            vec![vec![(0, 0), (1, 1)], vec![(0, 1), (1, 0)]],
            vec![vec![], vec![(0, 1)]],
        );
        let layouts = verify(0, &d, &topology, 2, None).unwrap();
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[1].physical(satmap_ir::QubitId(0)), Some(1));
    }

    #[test]
    fn test_rejects_unexplained_move() {
        let topology = Topology::linear(3);
        let d = decoded(
            vec![vec![(0, 0), (1, 1)], vec![(0, 2), (1, 1)]],
            vec![vec![], vec![]],
        );
        let err = verify(3, &d, &topology, 2, None).unwrap_err();
        assert!(matches!(
            err,
            MapError::UnexplainedMapping {
                chunk: 3,
                slot: 1,
                logical: 0,
                expected: 0,
                found: 2
            }
        ));
    }

    #[test]
    fn test_rejects_duplicate_physical() {
        let topology = Topology::linear(3);
        let d = decoded(vec![vec![(0, 1), (1, 1)]], vec![vec![]]);
        assert!(matches!(
            verify(0, &d, &topology, 2, None),
            Err(MapError::NonInjectiveMapping { slot: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_swap_off_topology() {
        let topology = Topology::linear(3);
        let d = decoded(
            vec![vec![(0, 0), (1, 1)], vec![(0, 2), (1, 1)]],
            vec![vec![], vec![(0, 2)]],
        );
        assert!(matches!(
            verify(0, &d, &topology, 2, None),
            Err(MapError::InvalidSwapEdge { edge: (0, 2), .. })
        ));
    }

    #[test]
    fn test_rejects_swap_before_first_slot() {
        let topology = Topology::linear(3);
        let d = decoded(vec![vec![(0, 0), (1, 1)]], vec![vec![(0, 1)]]);
        assert!(matches!(
            verify(0, &d, &topology, 2, None),
            Err(MapError::InvalidSwapEdge { slot: 0, .. })
        ));
    }

    #[test]
    fn test_boundary_must_match() {
        let topology = Topology::linear(3);
        let boundary = Layout::trivial(2, 3);
        let d = decoded(vec![vec![(0, 1), (1, 0)]], vec![vec![]]);
        assert!(matches!(
            verify(1, &d, &topology, 2, Some(&boundary)),
            Err(MapError::InconsistentBoundary {
                chunk: 1,
                logical: 0,
                expected: 0,
                found: 1
            })
        ));
    }
}
