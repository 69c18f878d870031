//! Bijection between structured propositions and solver literal ids.
//!
//! Each variable family owns a contiguous id range sized to the product of
//! its index domains. Families are laid out in the fixed order
//! `p, r, x, s, b, w, d`; inside a family indices are flattened row-major in
//! the order they appear in [`Var`]. The id of a variable is `1 + offset`,
//! and a negative id denotes the negated literal.

use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};

/// Dimensions of one chunk instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dims {
    /// Physical qubits.
    pub phys: usize,
    /// Logical qubits.
    pub log: usize,
    /// Slots in the chunk.
    pub slots: usize,
    /// Swap steps per layer.
    pub swaps: usize,
    /// Swap selector options per step: every edge plus the null swap.
    pub edge_options: usize,
}

/// A propositional variable of the mapping encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Var {
    /// `p[u, v, k]`: the interaction at slot `k` runs forward on edge `(u, v)`.
    Forward { u: usize, v: usize, slot: usize },
    /// `r[u, v, k]`: the interaction at slot `k` runs reversed on edge `(u, v)`.
    Reverse { u: usize, v: usize, slot: usize },
    /// `x[phys, log, k]`: logical `log` sits on physical `phys` at slot `k`.
    Placement { phys: usize, log: usize, slot: usize },
    /// `s[u, v, t, k]`: swap step `t` before slot `k` exchanges `u` and `v`.
    /// `(0, 0)` is the null swap.
    Swap { u: usize, v: usize, step: usize, slot: usize },
    /// `b[i, t, k]`: ordering bit of the swap selector, true once one of the
    /// first `i + 1` options of step `t` is chosen.
    Order { option: usize, step: usize, slot: usize },
    /// `w[i, i2, k]`: some logical qubit moves from `i` to `i2` entering slot `k`.
    Distance { from: usize, to: usize, slot: usize },
    /// `d[log, k]`: logical `log` moves entering slot `k`.
    Displaced { log: usize, slot: usize },
}

/// Variable families in id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Forward,
    Reverse,
    Placement,
    Swap,
    Order,
    Distance,
    Displaced,
}

impl Family {
    /// All families, in id order.
    pub const ALL: [Family; 7] = [
        Family::Forward,
        Family::Reverse,
        Family::Placement,
        Family::Swap,
        Family::Order,
        Family::Distance,
        Family::Displaced,
    ];
}

impl Var {
    /// Family of this variable.
    pub fn family(&self) -> Family {
        match self {
            Var::Forward { .. } => Family::Forward,
            Var::Reverse { .. } => Family::Reverse,
            Var::Placement { .. } => Family::Placement,
            Var::Swap { .. } => Family::Swap,
            Var::Order { .. } => Family::Order,
            Var::Distance { .. } => Family::Distance,
            Var::Displaced { .. } => Family::Displaced,
        }
    }

    /// Positive literal.
    #[inline]
    pub fn pos(self) -> Lit {
        Lit {
            var: self,
            positive: true,
        }
    }

    /// Negative literal.
    #[inline]
    pub fn neg(self) -> Lit {
        Lit {
            var: self,
            positive: false,
        }
    }
}

/// A variable with a polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit {
    pub var: Var,
    pub positive: bool,
}

impl std::ops::Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit {
            var: self.var,
            positive: !self.positive,
        }
    }
}

/// Encoder/decoder for one set of [`Dims`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralCodec {
    dims: Dims,
}

impl LiteralCodec {
    pub fn new(dims: Dims) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> Dims {
        self.dims
    }

    fn shape(&self, family: Family) -> Vec<usize> {
        let Dims {
            phys,
            log,
            slots,
            swaps,
            edge_options,
        } = self.dims;
        match family {
            Family::Forward | Family::Reverse | Family::Distance => vec![phys, phys, slots],
            Family::Placement => vec![phys, log, slots],
            Family::Swap => vec![phys, phys, swaps, slots],
            Family::Order => vec![edge_options, swaps, slots],
            Family::Displaced => vec![log, slots],
        }
    }

    fn size(&self, family: Family) -> usize {
        self.shape(family).iter().product()
    }

    /// Zero-based id range `[start, end)` of a family, before the `+1` shift.
    pub fn family_range(&self, family: Family) -> std::ops::Range<usize> {
        let mut start = 0;
        for f in Family::ALL {
            let size = self.size(f);
            if f == family {
                return start..start + size;
            }
            start += size;
        }
        start..start
    }

    /// Total number of variables.
    pub fn num_vars(&self) -> usize {
        Family::ALL.iter().map(|&f| self.size(f)).sum()
    }

    fn indices(var: &Var) -> Vec<usize> {
        match *var {
            Var::Forward { u, v, slot } | Var::Reverse { u, v, slot } => vec![u, v, slot],
            Var::Placement { phys, log, slot } => vec![phys, log, slot],
            Var::Swap { u, v, step, slot } => vec![u, v, step, slot],
            Var::Order { option, step, slot } => vec![option, step, slot],
            Var::Distance { from, to, slot } => vec![from, to, slot],
            Var::Displaced { log, slot } => vec![log, slot],
        }
    }

    fn build(family: Family, idx: &[usize]) -> Var {
        match family {
            Family::Forward => Var::Forward { u: idx[0], v: idx[1], slot: idx[2] },
            Family::Reverse => Var::Reverse { u: idx[0], v: idx[1], slot: idx[2] },
            Family::Placement => Var::Placement { phys: idx[0], log: idx[1], slot: idx[2] },
            Family::Swap => Var::Swap { u: idx[0], v: idx[1], step: idx[2], slot: idx[3] },
            Family::Order => Var::Order { option: idx[0], step: idx[1], slot: idx[2] },
            Family::Distance => Var::Distance { from: idx[0], to: idx[1], slot: idx[2] },
            Family::Displaced => Var::Displaced { log: idx[0], slot: idx[1] },
        }
    }

    /// Whether every index of `var` lies inside its domain.
    pub fn contains(&self, var: &Var) -> bool {
        Self::indices(var)
            .iter()
            .zip(self.shape(var.family()))
            .all(|(&i, d)| i < d)
    }

    /// Id of a variable (always positive).
    ///
    /// Indices must lie inside the codec's dimensions; that is checked in
    /// debug builds only.
    pub fn var_id(&self, var: &Var) -> i64 {
        debug_assert!(self.contains(var), "{var:?} outside {:?}", self.dims);
        let shape = self.shape(var.family());
        let offset = Self::indices(var)
            .iter()
            .zip(&shape)
            .fold(0, |acc, (&i, &d)| acc * d + i);
        (self.family_range(var.family()).start + offset + 1) as i64
    }

    /// Signed id of a literal.
    pub fn encode(&self, lit: Lit) -> i64 {
        let id = self.var_id(&lit.var);
        if lit.positive { id } else { -id }
    }

    /// Encode a clause.
    pub fn encode_clause(&self, clause: &[Lit]) -> Vec<i64> {
        clause.iter().map(|&l| self.encode(l)).collect()
    }

    /// Literal of a signed id.
    pub fn decode(&self, id: i64) -> MapResult<Lit> {
        let num_vars = self.num_vars() as i64;
        let invalid = MapError::InvalidLiteralId { id, num_vars };
        let magnitude = id.unsigned_abs() as usize;
        if id == 0 || magnitude > num_vars as usize {
            return Err(invalid);
        }
        let mut offset = magnitude - 1;
        for family in Family::ALL {
            let size = self.size(family);
            if offset < size {
                let shape = self.shape(family);
                let mut idx = vec![0; shape.len()];
                for (i, &d) in idx.iter_mut().zip(&shape).rev() {
                    *i = offset % d;
                    offset /= d;
                }
                return Ok(Lit {
                    var: Self::build(family, &idx),
                    positive: id > 0,
                });
            }
            offset -= size;
        }
        Err(invalid)
    }
}
