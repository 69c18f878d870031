//! Logical-to-physical qubit layouts.

use satmap_ir::QubitId;
use serde::{Deserialize, Serialize};

/// A bijective placement of logical qubits onto physical qubits.
///
/// Every logical qubit `0..num_logical` has exactly one physical qubit;
/// physical qubits may be left empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout {
    logical_to_physical: Vec<u32>,
    physical_to_logical: Vec<Option<QubitId>>,
}

/// Why a set of (logical, physical) pairs is not a layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutConflict {
    /// A logical qubit is placed twice.
    LogicalTwice { logical: u32, first: u32, second: u32 },
    /// A physical qubit hosts two logical qubits.
    PhysicalTwice { physical: u32, first: u32, second: u32 },
    /// A logical qubit has no placement.
    Unplaced { logical: u32 },
    /// An index is out of range.
    OutOfRange { logical: u32, physical: u32 },
}

impl std::fmt::Display for LayoutConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutConflict::LogicalTwice {
                logical,
                first,
                second,
            } => write!(f, "logical {logical} placed on both {first} and {second}"),
            LayoutConflict::PhysicalTwice {
                physical,
                first,
                second,
            } => write!(f, "physical {physical} hosts both {first} and {second}"),
            LayoutConflict::Unplaced { logical } => write!(f, "logical {logical} is not placed"),
            LayoutConflict::OutOfRange { logical, physical } => {
                write!(f, "pair ({logical}, {physical}) is out of range")
            }
        }
    }
}

impl Layout {
    /// The layout placing logical `i` on physical `i`.
    pub fn trivial(num_logical: usize, num_physical: usize) -> Self {
        let mut physical_to_logical = vec![None; num_physical];
        for (i, slot) in physical_to_logical.iter_mut().enumerate().take(num_logical) {
            *slot = Some(QubitId(i as u32));
        }
        Self {
            logical_to_physical: (0..num_logical as u32).collect(),
            physical_to_logical,
        }
    }

    /// Build a layout from `(logical, physical)` pairs.
    ///
    /// Fails unless the pairs place every logical qubit exactly once and no
    /// physical qubit twice.
    pub fn from_pairs(
        num_logical: usize,
        num_physical: usize,
        pairs: impl IntoIterator<Item = (u32, u32)>,
    ) -> Result<Self, LayoutConflict> {
        let mut logical_to_physical: Vec<Option<u32>> = vec![None; num_logical];
        let mut physical_to_logical: Vec<Option<QubitId>> = vec![None; num_physical];

        for (logical, physical) in pairs {
            let (l, p) = (logical as usize, physical as usize);
            if l >= num_logical || p >= num_physical {
                return Err(LayoutConflict::OutOfRange { logical, physical });
            }
            if let Some(first) = logical_to_physical[l] {
                return Err(LayoutConflict::LogicalTwice {
                    logical,
                    first,
                    second: physical,
                });
            }
            if let Some(first) = physical_to_logical[p] {
                return Err(LayoutConflict::PhysicalTwice {
                    physical,
                    first: first.0,
                    second: logical,
                });
            }
            logical_to_physical[l] = Some(physical);
            physical_to_logical[p] = Some(QubitId(logical));
        }

        let logical_to_physical = logical_to_physical
            .into_iter()
            .enumerate()
            .map(|(l, p)| p.ok_or(LayoutConflict::Unplaced { logical: l as u32 }))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            logical_to_physical,
            physical_to_logical,
        })
    }

    /// Physical qubit hosting `logical`.
    #[inline]
    pub fn physical(&self, logical: QubitId) -> Option<u32> {
        self.logical_to_physical.get(logical.index()).copied()
    }

    /// Logical qubit on `physical`, if any.
    #[inline]
    pub fn logical(&self, physical: u32) -> Option<QubitId> {
        self.physical_to_logical
            .get(physical as usize)
            .copied()
            .flatten()
    }

    /// Exchange the occupants of two physical qubits.
    pub fn swap(&mut self, p1: u32, p2: u32) {
        let (a, b) = (p1 as usize, p2 as usize);
        if a >= self.physical_to_logical.len() || b >= self.physical_to_logical.len() {
            return;
        }
        self.physical_to_logical.swap(a, b);
        if let Some(l) = self.physical_to_logical[a] {
            self.logical_to_physical[l.index()] = p1;
        }
        if let Some(l) = self.physical_to_logical[b] {
            self.logical_to_physical[l.index()] = p2;
        }
    }

    /// Number of logical qubits.
    pub fn num_logical(&self) -> usize {
        self.logical_to_physical.len()
    }

    /// Number of physical qubits.
    pub fn num_physical(&self) -> usize {
        self.physical_to_logical.len()
    }

    /// `(logical, physical)` pairs in logical order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        self.logical_to_physical
            .iter()
            .enumerate()
            .map(|(l, &p)| (QubitId(l as u32), p))
    }
}

/// Final position of every physical qubit's occupant after applying `swaps`
/// in order, starting from the identity.
///
/// Entry `i` of the result is where the content of physical `i` ends up.
pub fn compose_swaps(swaps: &[(u32, u32)], num_physical: usize) -> Vec<u32> {
    let mut image: Vec<u32> = (0..num_physical as u32).collect();
    for &(u, v) in swaps {
        for pos in &mut image {
            if *pos == u {
                *pos = v;
            } else if *pos == v {
                *pos = u;
            }
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_trivial_layout() {
        let layout = Layout::trivial(2, 4);
        assert_eq!(layout.physical(QubitId(1)), Some(1));
        assert_eq!(layout.logical(3), None);
        assert_eq!(layout.num_physical(), 4);
    }

    #[test]
    fn test_from_pairs_conflicts() {
        assert_eq!(
            Layout::from_pairs(2, 3, [(0, 1), (1, 1)]),
            Err(LayoutConflict::PhysicalTwice {
                physical: 1,
                first: 0,
                second: 1
            })
        );
        assert_eq!(
            Layout::from_pairs(2, 3, [(0, 1)]),
            Err(LayoutConflict::Unplaced { logical: 1 })
        );
        assert!(matches!(
            Layout::from_pairs(1, 3, [(0, 1), (0, 2)]),
            Err(LayoutConflict::LogicalTwice { .. })
        ));
    }

    #[test]
    fn test_swap_with_empty_qubit() {
        let mut layout = Layout::from_pairs(1, 3, [(0, 0)]).unwrap();
        layout.swap(0, 2);
        assert_eq!(layout.physical(QubitId(0)), Some(2));
        assert_eq!(layout.logical(0), None);
    }

    #[test]
    fn test_compose_swaps() {
        // 0 -> 1 -> 2 across two swaps.
        let image = compose_swaps(&[(0, 1), (1, 2)], 3);
        assert_eq!(image, vec![2, 0, 1]);
    }

    proptest! {
        #[test]
        fn prop_swaps_agree_with_composition(
            swaps in prop::collection::vec((0u32..6, 0u32..6), 0..8),
        ) {
            let mut layout = Layout::trivial(6, 6);
            for &(u, v) in &swaps {
                layout.swap(u, v);
            }
            let image = compose_swaps(&swaps, 6);
            for l in 0..6u32 {
                prop_assert_eq!(layout.physical(QubitId(l)), Some(image[l as usize]));
            }
        }
    }
}
