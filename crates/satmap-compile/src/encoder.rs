//! Constraint encoder: one chunk of the mapping problem as a weighted CNF.

use itertools::Itertools;
use tracing::debug;

use crate::calibration::Calibration;
use crate::codec::{Dims, Lit, LiteralCodec, Var};
use crate::config::RoutingMode;
use crate::error::{MapError, MapResult};
use crate::layout::compose_swaps;
use crate::topology::Topology;

/// A soft clause: satisfied if possible, costing `weight` when violated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftClause {
    pub weight: u64,
    pub lits: Vec<i64>,
}

/// Hard and soft clauses of one chunk attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub dims: Dims,
    /// Hard clauses; the first `structural` are produced by the encoder
    /// itself, the rest are the caller's extra clauses.
    pub hard: Vec<Vec<i64>>,
    pub soft: Vec<SoftClause>,
    pub structural: usize,
    /// Slots whose swap selector is encoded, in increasing order.
    pub swap_slots: Vec<usize>,
}

impl Instance {
    pub fn codec(&self) -> LiteralCodec {
        LiteralCodec::new(self.dims)
    }

    pub fn num_vars(&self) -> usize {
        self.codec().num_vars()
    }

    /// Weight marking hard clauses: one more than all soft weights together.
    pub fn top(&self) -> u64 {
        self.soft
            .iter()
            .map(|c| c.weight)
            .fold(1u64, u64::saturating_add)
    }

    /// Hard clauses emitted by the encoder, without caller extras.
    pub fn structural_clauses(&self) -> &[Vec<i64>] {
        &self.hard[..self.structural]
    }

    /// Total weight of soft clauses falsified by `assignment`.
    ///
    /// Variables absent from the assignment count as false.
    pub fn violated_weight(&self, assignment: &[i64]) -> u64 {
        let mut value = vec![false; self.num_vars() + 1];
        for &lit in assignment {
            if let Some(v) = value.get_mut(lit.unsigned_abs() as usize) {
                *v = lit > 0;
            }
        }
        let holds = |lit: i64| {
            value.get(lit.unsigned_abs() as usize).copied().unwrap_or(false) == (lit > 0)
        };
        self.soft
            .iter()
            .filter(|c| !c.lits.iter().any(|&l| holds(l)))
            .map(|c| c.weight)
            .sum()
    }
}

/// Everything the encoder needs for one chunk.
#[derive(Debug, Clone, Copy)]
pub struct EncodeRequest<'a> {
    pub topology: &'a Topology,
    pub calibration: Option<&'a Calibration>,
    pub logical_count: usize,
    /// `(control, target)` logical pairs in slot order.
    pub interactions: &'a [(u32, u32)],
    /// Whether each slot opens a layer (slot 0 always does).
    pub layer_starts: &'a [bool],
    /// Swap steps per layer.
    pub swaps: usize,
    pub routing: RoutingMode,
    pub max_displaced: usize,
    pub max_displacement_clauses: u64,
    pub fidelity_scale: f64,
    /// Extra hard clauses appended verbatim.
    pub extra: &'a [Vec<Lit>],
}

impl EncodeRequest<'_> {
    /// Dimensions of the instance this request produces.
    pub fn dims(&self) -> Dims {
        Dims {
            phys: self.topology.num_qubits() as usize,
            log: self.logical_count,
            slots: self.interactions.len(),
            swaps: self.swaps,
            edge_options: self.topology.edges().len() + 1,
        }
    }
}

struct Builder {
    codec: LiteralCodec,
    hard: Vec<Vec<i64>>,
    soft: Vec<SoftClause>,
}

impl Builder {
    fn hard(&mut self, lits: impl IntoIterator<Item = Lit>) {
        let clause = lits.into_iter().map(|l| self.codec.encode(l)).collect();
        self.hard.push(clause);
    }

    fn soft(&mut self, weight: u64, lits: impl IntoIterator<Item = Lit>) {
        if weight == 0 {
            return;
        }
        let lits = lits.into_iter().map(|l| self.codec.encode(l)).collect();
        self.soft.push(SoftClause { weight, lits });
    }
}

fn x(phys: usize, log: usize, slot: usize) -> Var {
    Var::Placement { phys, log, slot }
}

fn swap_var(edge: (u32, u32), step: usize, slot: usize) -> Var {
    Var::Swap {
        u: edge.0 as usize,
        v: edge.1 as usize,
        step,
        slot,
    }
}

/// Encode one chunk.
pub fn encode(req: &EncodeRequest<'_>) -> MapResult<Instance> {
    let dims = req.dims();
    if dims.log > dims.phys {
        return Err(MapError::CircuitTooLarge(format!(
            "{} logical qubits do not fit on {} physical qubits",
            dims.log, dims.phys
        )));
    }
    if req.layer_starts.len() != dims.slots {
        return Err(MapError::InvalidConfig(format!(
            "{} layer flags for {} slots",
            req.layer_starts.len(),
            dims.slots
        )));
    }

    let mut b = Builder {
        codec: LiteralCodec::new(dims),
        hard: vec![],
        soft: vec![],
    };

    placement_constraints(&mut b, dims);
    adjacency_constraints(&mut b, req);

    let swap_slots: Vec<usize> = if req.routing.is_routed() {
        (1..dims.slots).filter(|&k| req.layer_starts[k]).collect()
    } else {
        vec![]
    };

    match req.routing {
        RoutingMode::Routed => {
            layer_persistence(&mut b, req, dims);
            swap_choice(&mut b, req.topology, dims, &swap_slots);
            swap_effect(&mut b, req.topology, dims, &swap_slots)?;
        }
        RoutingMode::Weighted => distance_constraints(&mut b, req.topology, dims),
        RoutingMode::BoundedDisplacement => displacement_constraints(&mut b, req, dims)?,
        RoutingMode::Deferred => {}
    }

    let structural = b.hard.len();
    for clause in req.extra {
        b.hard(clause.iter().copied());
    }

    objective(&mut b, req, dims, &swap_slots);

    debug!(
        slots = dims.slots,
        vars = b.codec.num_vars(),
        hard = b.hard.len(),
        soft = b.soft.len(),
        "encoded chunk"
    );

    Ok(Instance {
        dims,
        hard: b.hard,
        soft: b.soft,
        structural,
        swap_slots,
    })
}

/// Exactly one physical qubit per logical qubit, at most one logical qubit
/// per physical qubit, at every slot.
fn placement_constraints(b: &mut Builder, dims: Dims) {
    for k in 0..dims.slots {
        for j in 0..dims.log {
            b.hard((0..dims.phys).map(|i| x(i, j, k).pos()));
            for (i2, i) in (0..dims.phys).tuple_combinations() {
                b.hard([x(i2, j, k).neg(), x(i, j, k).neg()]);
            }
        }
        for i in 0..dims.phys {
            for (j2, j) in (0..dims.log).tuple_combinations() {
                b.hard([x(i, j2, k).neg(), x(i, j, k).neg()]);
            }
        }
    }
}

/// The operands of each interaction sit on the two ends of some edge, in
/// one orientation or the other.
fn adjacency_constraints(b: &mut Builder, req: &EncodeRequest<'_>) {
    for (k, &(c, t)) in req.interactions.iter().enumerate() {
        let (c, t) = (c as usize, t as usize);
        let mut used = Vec::with_capacity(2 * req.topology.edges().len());
        for &(u, v) in req.topology.edges() {
            let (u, v) = (u as usize, v as usize);
            let fwd = Var::Forward { u, v, slot: k };
            let rev = Var::Reverse { u, v, slot: k };
            b.hard([fwd.neg(), x(u, c, k).pos()]);
            b.hard([fwd.neg(), x(v, t, k).pos()]);
            b.hard([rev.neg(), x(u, t, k).pos()]);
            b.hard([rev.neg(), x(v, c, k).pos()]);
            used.push(fwd.pos());
            used.push(rev.pos());
        }
        // Empty for an edgeless topology, which makes the chunk unsatisfiable.
        b.hard(used);
    }
}

/// Inside a layer the mapping does not change.
fn layer_persistence(b: &mut Builder, req: &EncodeRequest<'_>, dims: Dims) {
    for k in (1..dims.slots).filter(|&k| !req.layer_starts[k]) {
        for i in 0..dims.phys {
            for j in 0..dims.log {
                b.hard([x(i, j, k - 1).neg(), x(i, j, k).pos()]);
                b.hard([x(i, j, k - 1).pos(), x(i, j, k).neg()]);
            }
        }
    }
}

/// Selector options of a swap step: every edge, then the null swap.
fn swap_options(topology: &Topology) -> Vec<(u32, u32)> {
    topology
        .edges()
        .iter()
        .copied()
        .chain(std::iter::once((0, 0)))
        .collect()
}

/// Exactly one option per swap step, with a sequential at-most-one chain
/// over the ordering bits. Swap variables on uncoupled pairs are fixed false.
fn swap_choice(b: &mut Builder, topology: &Topology, dims: Dims, swap_slots: &[usize]) {
    let options = swap_options(topology);
    for &k in swap_slots {
        for t in 0..dims.swaps {
            b.hard(options.iter().map(|&e| swap_var(e, t, k).pos()));
            for (o, &e) in options.iter().enumerate() {
                let s = swap_var(e, t, k);
                let bit = Var::Order { option: o, step: t, slot: k };
                b.hard([s.neg(), bit.pos()]);
                if o > 0 {
                    let prev = Var::Order { option: o - 1, step: t, slot: k };
                    b.hard([prev.neg(), bit.pos()]);
                    b.hard([prev.neg(), s.neg()]);
                }
            }
            for u in 0..dims.phys as u32 {
                for v in (0..dims.phys as u32).filter(|&v| v != u) {
                    if u > v || !topology.is_adjacent(u, v) {
                        b.hard([swap_var((u, v), t, k).neg()]);
                    }
                }
            }
        }
    }
}

/// Enumerate every sequence of `steps` options, as option indices.
fn option_sequences(options: usize, steps: usize) -> MapResult<impl Iterator<Item = Vec<usize>>> {
    let total = u32::try_from(steps)
        .ok()
        .and_then(|steps| options.checked_pow(steps))
        .ok_or_else(|| {
            MapError::CircuitTooLarge(format!(
                "{options} swap options over {steps} steps overflow the sequence count"
            ))
        })?;
    Ok((0..total).map(move |mut n| {
        let mut seq = vec![0; steps];
        for slot in seq.iter_mut().rev() {
            *slot = n % options;
            n /= options;
        }
        seq
    }))
}

/// The chosen swap sequence maps the previous slot's placement onto the
/// current one.
fn swap_effect(b: &mut Builder, topology: &Topology, dims: Dims, swap_slots: &[usize]) -> MapResult<()> {
    let options = swap_options(topology);
    for seq in option_sequences(options.len(), dims.swaps)? {
        let chosen: Vec<(u32, u32)> = seq.iter().map(|&o| options[o]).collect();
        let real: Vec<(u32, u32)> = chosen.iter().copied().filter(|&(u, v)| u != v).collect();
        let image = compose_swaps(&real, dims.phys);
        for &k in swap_slots {
            let guard: Vec<Lit> = chosen
                .iter()
                .enumerate()
                .map(|(t, &e)| swap_var(e, t, k).neg())
                .collect();
            for i in 0..dims.phys {
                let to = image[i] as usize;
                for j in 0..dims.log {
                    b.hard(guard.iter().copied().chain([x(i, j, k - 1).neg(), x(to, j, k).pos()]));
                    b.hard(guard.iter().copied().chain([x(i, j, k - 1).pos(), x(to, j, k).neg()]));
                }
            }
        }
    }
    Ok(())
}

/// `w[i, i2, k]` holds whenever a logical qubit moves from `i` to `i2`
/// entering slot `k`. Moves between disconnected qubits are forbidden.
fn distance_constraints(b: &mut Builder, topology: &Topology, dims: Dims) {
    for k in 1..dims.slots {
        for (i, i2) in (0..dims.phys).cartesian_product(0..dims.phys) {
            if i == i2 {
                continue;
            }
            let w = Var::Distance { from: i, to: i2, slot: k };
            if topology.distance(i as u32, i2 as u32).is_none() {
                b.hard([w.neg()]);
                continue;
            }
            for j in 0..dims.log {
                b.hard([x(i, j, k - 1).neg(), x(i2, j, k).neg(), w.pos()]);
            }
        }
    }
}

fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * u128::from(n - i) / u128::from(i + 1);
        if acc > u128::from(u64::MAX) {
            return u64::MAX;
        }
    }
    acc as u64
}

/// Clauses in the displacement cap of a chunk: one per
/// `(max_displaced + 1)`-subset of the indicators `d[j, k]`, `k >= 1`.
pub fn displacement_cap_clauses(logical: usize, slots: usize, max_displaced: usize) -> u64 {
    let pool = logical * slots.saturating_sub(1);
    binomial(pool as u64, max_displaced as u64 + 1)
}

/// `d[j, k]` holds whenever logical `j` leaves its qubit entering slot `k`,
/// and no `max_displaced + 1` indicators hold together.
///
/// The cap is one clause per combination, so its size grows as
/// `C(log * (slots - 1), max_displaced + 1)`; requests beyond
/// `max_displacement_clauses` are refused. Slot 0 has no indicators.
fn displacement_constraints(b: &mut Builder, req: &EncodeRequest<'_>, dims: Dims) -> MapResult<()> {
    let group = req.max_displaced + 1;
    let pool = dims.log * dims.slots.saturating_sub(1);
    let count = displacement_cap_clauses(dims.log, dims.slots, req.max_displaced);
    if count > req.max_displacement_clauses {
        return Err(MapError::CircuitTooLarge(format!(
            "displacement cap needs {count} clauses (C({pool}, {group})), limit is {}",
            req.max_displacement_clauses
        )));
    }

    for k in 1..dims.slots {
        for i in 0..dims.phys {
            for j in 0..dims.log {
                b.hard([
                    x(i, j, k - 1).neg(),
                    x(i, j, k).pos(),
                    Var::Displaced { log: j, slot: k }.pos(),
                ]);
            }
        }
    }

    let indicators = (0..dims.log)
        .cartesian_product(1..dims.slots)
        .map(|(log, slot)| Var::Displaced { log, slot });
    for set in indicators.combinations(group) {
        b.hard(set.into_iter().map(Var::neg));
    }
    Ok(())
}

/// `-scale * ln(1 - error)`, truncated.
fn fidelity_weight(scale: f64, error: f64) -> u64 {
    let w = -scale * (1.0 - error).ln();
    if w.is_finite() && w > 0.0 { w as u64 } else { 0 }
}

fn objective(b: &mut Builder, req: &EncodeRequest<'_>, dims: Dims, swap_slots: &[usize]) {
    match (req.routing, req.calibration) {
        (RoutingMode::Routed, Some(cal)) => {
            for &(u, v) in req.topology.edges() {
                let error = cal.error_rate(u, v).unwrap_or(0.0);
                let gate = fidelity_weight(req.fidelity_scale, error);
                let swap = fidelity_weight(3.0 * req.fidelity_scale, error);
                let (uu, vv) = (u as usize, v as usize);
                for k in 0..dims.slots {
                    b.soft(gate, [Var::Forward { u: uu, v: vv, slot: k }.neg()]);
                    b.soft(gate, [Var::Reverse { u: uu, v: vv, slot: k }.neg()]);
                }
                for &k in swap_slots {
                    for t in 0..dims.swaps {
                        b.soft(swap, [swap_var((u, v), t, k).neg()]);
                    }
                }
            }
        }
        (RoutingMode::Routed, None) => {
            for &k in swap_slots {
                for t in 0..dims.swaps {
                    for &e in req.topology.edges() {
                        b.soft(1, [swap_var(e, t, k).neg()]);
                    }
                }
            }
        }
        (RoutingMode::Weighted, _) => {
            for k in 1..dims.slots {
                for (i, i2) in (0..dims.phys).cartesian_product(0..dims.phys) {
                    if i == i2 {
                        continue;
                    }
                    if let Some(d) = req.topology.distance(i as u32, i2 as u32) {
                        b.soft(u64::from(d), [Var::Distance { from: i, to: i2, slot: k }.neg()]);
                    }
                }
            }
        }
        (RoutingMode::BoundedDisplacement | RoutingMode::Deferred, _) => {
            for k in 1..dims.slots {
                for i in 0..dims.phys {
                    for j in 0..dims.log {
                        b.soft(1, [x(i, j, k - 1).neg(), x(i, j, k).pos()]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(
        topology: &'a Topology,
        interactions: &'a [(u32, u32)],
        starts: &'a [bool],
        routing: RoutingMode,
    ) -> EncodeRequest<'a> {
        EncodeRequest {
            topology,
            calibration: None,
            logical_count: 3,
            interactions,
            layer_starts: starts,
            swaps: 1,
            routing,
            max_displaced: 4,
            max_displacement_clauses: 1_000_000,
            fidelity_scale: 1000.0,
            extra: &[],
        }
    }

    #[test]
    fn test_rejects_too_many_logicals() {
        let topology = Topology::linear(2);
        let req = request(&topology, &[(0, 2)], &[true], RoutingMode::Routed);
        assert!(matches!(encode(&req), Err(MapError::CircuitTooLarge(_))));
    }

    #[test]
    fn test_swap_slots_follow_layers() {
        let topology = Topology::linear(3);
        let inters = [(0, 1), (1, 2), (0, 1)];
        let starts = [true, false, true];
        let inst = encode(&request(&topology, &inters, &starts, RoutingMode::Routed)).unwrap();
        assert_eq!(inst.swap_slots, vec![2]);
        // One unit-weight soft clause per edge and step at the swap slot.
        assert_eq!(inst.soft.len(), 2);
        assert!(inst.soft.iter().all(|c| c.weight == 1));
        assert_eq!(inst.top(), 3);
    }

    #[test]
    fn test_extra_clauses_are_not_structural() {
        let topology = Topology::linear(3);
        let extra = vec![vec![x(0, 0, 0).pos()]];
        let mut req = request(&topology, &[(0, 1)], &[true], RoutingMode::Routed);
        req.extra = &extra;
        let inst = encode(&req).unwrap();
        assert_eq!(inst.hard.len(), inst.structural + 1);
        assert_eq!(inst.hard.last().unwrap(), &vec![inst.codec().encode(x(0, 0, 0).pos())]);
    }

    #[test]
    fn test_calibrated_weights_keep_swap_ratio() {
        let topology = Topology::linear(3);
        let cal = Calibration::from_edge_rates([((0, 1), 0.1), ((1, 2), 0.1)]).unwrap();
        let inters = [(0, 1), (1, 2)];
        let mut req = request(&topology, &inters, &[true, true], RoutingMode::Routed);
        req.calibration = Some(&cal);
        let inst = encode(&req).unwrap();
        let gate = fidelity_weight(1000.0, 0.1);
        let swap = fidelity_weight(3000.0, 0.1);
        assert_eq!(gate, 105);
        assert_eq!(swap, 316);
        assert!(inst.soft.iter().any(|c| c.weight == gate));
        assert!(inst.soft.iter().any(|c| c.weight == swap));
    }

    #[test]
    fn test_displacement_cap_size_guard() {
        let topology = Topology::linear(4);
        let inters = [(0, 1); 10];
        let starts = [true; 10];
        let mut req = request(&topology, &inters, &starts, RoutingMode::BoundedDisplacement);
        req.max_displacement_clauses = 100;
        assert!(matches!(encode(&req), Err(MapError::CircuitTooLarge(_))));
    }

    #[test]
    fn test_displacement_cap_clause_count() {
        let topology = Topology::linear(3);
        let inters = [(0, 1), (1, 2)];
        let mut req = request(&topology, &inters, &[true, true], RoutingMode::BoundedDisplacement);
        req.max_displaced = 2;
        let inst = encode(&req).unwrap();
        // C(3 * 1, 3) cap clauses, each of width 3 and all negative.
        let caps = inst
            .hard
            .iter()
            .filter(|c| c.len() == 3 && c.iter().all(|&l| l < 0))
            .count();
        assert_eq!(caps, 1);
        assert_eq!(displacement_cap_clauses(3, 2, 2), 1);
    }

    #[test]
    fn test_displacement_cap_ignores_first_slot() {
        assert_eq!(displacement_cap_clauses(3, 1, 1), 0);
        assert_eq!(displacement_cap_clauses(3, 25, 4), binomial(72, 5));
        assert_eq!(displacement_cap_clauses(3, 20, 4), binomial(57, 5));
    }

    #[test]
    fn test_swap_sequence_overflow_is_too_large() {
        assert!(matches!(
            option_sequences(usize::MAX / 2, 3),
            Err(MapError::CircuitTooLarge(_))
        ));
        assert_eq!(option_sequences(3, 2).unwrap().count(), 9);

        let topology = Topology::full(8);
        let mut req = request(&topology, &[(0, 1), (1, 2)], &[true, true], RoutingMode::Routed);
        req.swaps = 40;
        assert!(matches!(encode(&req), Err(MapError::CircuitTooLarge(_))));
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(6, 3), 20);
        assert_eq!(binomial(5, 0), 1);
        assert_eq!(binomial(3, 4), 0);
    }

    #[test]
    fn test_violated_weight() {
        let topology = Topology::linear(3);
        let inst = encode(&request(&topology, &[(0, 1), (1, 2)], &[true, true], RoutingMode::Routed)).unwrap();
        let codec = inst.codec();
        let s = codec.encode(swap_var((0, 1), 0, 1).pos());
        assert_eq!(inst.violated_weight(&[s]), 1);
        assert_eq!(inst.violated_weight(&[-s]), 0);
    }
}
