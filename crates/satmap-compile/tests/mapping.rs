//! End-to-end mapping runs.
//!
//! Most tests drive the built-in varisat oracle on small devices. The
//! control-flow tests swap in scripted oracles to force timeouts, spurious
//! unsatisfiable answers and inconsistent models.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use satmap_compile::{
    Calibration, Instance, Layering, MapError, MapResult, Mapper, MapperConfig, MappingResult,
    Model, Oracle, OracleOutcome, RoutingMode, Topology, Var, VarisatOracle,
};
use satmap_ir::{Circuit, QubitId};

fn circuit(n: u32, pairs: &[(u32, u32)]) -> Circuit {
    let mut c = Circuit::with_size("test", n, 0);
    for &(a, b) in pairs {
        c.cx(QubitId(a), QubitId(b)).unwrap();
    }
    c
}

fn triangle() -> Circuit {
    circuit(3, &[(0, 1), (1, 2), (0, 2)])
}

fn assert_on_edges(mapped: &Circuit, topology: &Topology) {
    for (_, inst) in mapped.two_qubit_ops() {
        assert!(
            topology.is_adjacent(inst.qubits[0].0, inst.qubits[1].0),
            "{} on non-adjacent qubits {:?}",
            inst.name(),
            inst.qubits
        );
    }
}

/// Logical operands of the mapped two-qubit gates, with the inserted swaps
/// undone along the way.
fn logical_pairs(result: &MappingResult) -> Vec<(u32, u32)> {
    let mut layout = result.initial_layout.clone();
    let mut pairs = Vec::new();
    for (_, inst) in result.circuit.two_qubit_ops() {
        let (p, q) = (inst.qubits[0].0, inst.qubits[1].0);
        if inst.name() == "swap" {
            layout.swap(p, q);
            continue;
        }
        pairs.push((layout.logical(p).unwrap().0, layout.logical(q).unwrap().0));
    }
    pairs
}

#[tokio::test]
async fn test_single_interaction_needs_no_swaps() {
    let topology = Topology::linear(2);
    let mapper = Mapper::new(topology.clone(), MapperConfig::default()).unwrap();
    let result = mapper.map(&circuit(2, &[(0, 1)])).await.unwrap();

    assert_eq!(result.swap_count(), 0);
    assert_eq!(result.layouts.len(), 1);
    assert_eq!(result.cost, 0.0);
    assert_eq!(result.circuit.num_qubits(), 2);
    assert_on_edges(&result.circuit, &topology);
}

#[tokio::test]
async fn test_triangle_on_a_line_takes_one_swap() {
    let topology = Topology::linear(3);
    let mapper = Mapper::new(topology.clone(), MapperConfig::default()).unwrap();
    let result = mapper.map(&triangle()).await.unwrap();

    assert_eq!(result.swap_count(), 1);
    assert_eq!(result.circuit.two_qubit_ops().count(), 4);
    assert_on_edges(&result.circuit, &topology);
}

#[tokio::test]
async fn test_too_many_logical_qubits() {
    let mapper = Mapper::new(Topology::linear(2), MapperConfig::default()).unwrap();
    let err = mapper.map(&triangle()).await.unwrap_err();
    assert!(matches!(err, MapError::CircuitTooLarge(_)));
}

#[tokio::test]
async fn test_disconnected_pair_is_infeasible() {
    let config = MapperConfig::default().with_max_added_swaps(1);
    let mapper = Mapper::new(Topology::new(2), config).unwrap();
    let err = mapper.map(&circuit(2, &[(0, 1)])).await.unwrap_err();
    assert!(matches!(
        err,
        MapError::MappingInfeasible {
            chunk: 0,
            added_swaps: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_zero_swap_budget_grows() {
    let topology = Topology::linear(3);
    let config = MapperConfig::default()
        .with_swaps_per_layer(0)
        .with_layering(Layering::Trivial);
    let mapper = Mapper::new(topology.clone(), config).unwrap();
    let result = mapper.map(&triangle()).await.unwrap();

    assert_eq!(result.chunks.len(), 1);
    assert_eq!(result.chunks[0].added_swaps, 1);
    assert_eq!(result.chunks[0].attempts, 2);
    assert_eq!(result.swap_count(), 1);
    assert_on_edges(&result.circuit, &topology);
}

#[tokio::test]
async fn test_chunks_share_boundaries() {
    let topology = Topology::ring(4);
    let config = MapperConfig::default().with_slice_size(3);
    let mapper = Mapper::new(topology.clone(), config).unwrap();
    let c = circuit(3, &[(0, 1), (1, 2), (0, 2), (0, 1), (1, 2)]);
    let result = mapper.map(&c).await.unwrap();

    assert_eq!(result.chunks.len(), 2);
    assert_eq!(result.chunks[0].slots, 0..2);
    assert_eq!(result.chunks[1].slots, 2..5);
    assert_eq!(result.layouts.len(), 5);
    // No swaps enter a chunk's first slot.
    assert!(result.swaps[2].is_empty());
    assert_eq!(result.layouts[1], result.layouts[2]);
    assert_eq!(result.initial_layout, result.layouts[0]);
    assert_eq!(result.final_layout, result.layouts[4]);
    assert_on_edges(&result.circuit, &topology);
}

#[tokio::test]
async fn test_chunking_never_beats_a_single_solve() {
    let topology = Topology::ring(4);
    let pairs = [(0, 1), (1, 2), (0, 2), (0, 1), (1, 2)];
    let c = circuit(3, &pairs);

    let single = Mapper::new(topology.clone(), MapperConfig::default())
        .unwrap()
        .map(&c)
        .await
        .unwrap();
    let chunked = Mapper::new(topology.clone(), MapperConfig::default().with_slice_size(3))
        .unwrap()
        .map(&c)
        .await
        .unwrap();

    assert_eq!(single.chunks.len(), 1);
    assert_eq!(chunked.chunks.len(), 2);
    assert!(single.swap_count() >= 1);
    assert!(chunked.cost >= single.cost, "{} < {}", chunked.cost, single.cost);
    assert!(chunked.swap_count() >= single.swap_count());
    for result in [&single, &chunked] {
        assert_on_edges(&result.circuit, &topology);
        assert_eq!(logical_pairs(result), pairs);
    }
}

#[tokio::test]
async fn test_cyclic_single_chunk_returns_home() {
    let topology = Topology::linear(3);
    let config = MapperConfig::default().with_cyclic(true);
    let mapper = Mapper::new(topology.clone(), config).unwrap();
    let result = mapper.map(&triangle()).await.unwrap();

    assert_eq!(result.initial_layout, result.final_layout);
    assert_eq!(result.swap_count(), 2);
    assert_on_edges(&result.circuit, &topology);
}

#[tokio::test]
async fn test_cyclic_across_chunks() {
    let config = MapperConfig::default().with_slice_size(2).with_cyclic(true);
    let mapper = Mapper::new(Topology::linear(3), config).unwrap();
    let c = circuit(3, &[(0, 1), (1, 2), (0, 1), (1, 2)]);
    let result = mapper.map(&c).await.unwrap();

    assert_eq!(result.chunks.len(), 2);
    assert_eq!(result.initial_layout, result.final_layout);
}

#[tokio::test]
async fn test_unrouted_modes_insert_router_swaps() {
    for routing in [
        RoutingMode::Deferred,
        RoutingMode::Weighted,
        RoutingMode::BoundedDisplacement,
    ] {
        let topology = Topology::linear(3);
        let config = MapperConfig::default().with_routing(routing);
        let mapper = Mapper::new(topology.clone(), config).unwrap();
        let result = mapper.map(&triangle()).await.unwrap();

        assert!(result.swap_count() >= 1, "{routing:?}");
        assert_on_edges(&result.circuit, &topology);
    }
}

#[tokio::test]
async fn test_displacement_cap_limits_moves() {
    // No placement on a line serves all three triangle interactions, so
    // at least two logical qubits must move.
    let topology = Topology::linear(3);
    let capped = MapperConfig::default()
        .with_routing(RoutingMode::BoundedDisplacement)
        .with_max_displaced(1);

    let err = Mapper::new(topology.clone(), capped.clone().with_max_added_swaps(0))
        .unwrap()
        .map(&triangle())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MapError::MappingInfeasible {
            chunk: 0,
            added_swaps: 0,
            ..
        }
    ));

    let grown = Mapper::new(topology.clone(), capped)
        .unwrap()
        .map(&triangle())
        .await
        .unwrap();
    assert_eq!(grown.chunks[0].added_swaps, 1);
    assert_eq!(grown.chunks[0].attempts, 2);
    assert_on_edges(&grown.circuit, &topology);

    let roomy = MapperConfig::default()
        .with_routing(RoutingMode::BoundedDisplacement)
        .with_max_displaced(2);
    let result = Mapper::new(topology.clone(), roomy)
        .unwrap()
        .map(&triangle())
        .await
        .unwrap();
    assert_eq!(result.chunks[0].added_swaps, 0);
    assert_eq!(result.chunks[0].attempts, 1);
}

#[tokio::test]
async fn test_displacement_growth_stops_at_clause_limit() {
    // C(6, 2) = 15 clauses fit; raising the cap needs C(6, 3) = 20.
    let config = MapperConfig::default()
        .with_routing(RoutingMode::BoundedDisplacement)
        .with_max_displaced(1)
        .with_max_displacement_clauses(15);
    let err = Mapper::new(Topology::linear(3), config)
        .unwrap()
        .map(&triangle())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MapError::MappingInfeasible {
            chunk: 0,
            added_swaps: 0,
            ..
        }
    ));
}

#[tokio::test]
async fn test_default_bounded_mode_maps_a_full_slice() {
    let topology = Topology::linear(3);
    let pairs: Vec<(u32, u32)> = (0..25).map(|i| if i % 2 == 0 { (0, 1) } else { (1, 2) }).collect();
    let c = circuit(3, &pairs);
    let config = MapperConfig::default().with_routing(RoutingMode::BoundedDisplacement);
    let result = Mapper::new(topology.clone(), config)
        .unwrap()
        .map(&c)
        .await
        .unwrap();

    assert!(result.chunks.len() > 1);
    assert_on_edges(&result.circuit, &topology);
    assert_eq!(logical_pairs(&result), pairs);
}

#[tokio::test]
async fn test_calibrated_fidelity() {
    let topology = Topology::linear(2);
    let calibration = Calibration::from_edge_rates([((0, 1), 0.1)]).unwrap();
    let mapper = Mapper::new(topology, MapperConfig::default())
        .unwrap()
        .with_calibration(calibration.clone())
        .unwrap();
    let result = mapper.map(&circuit(2, &[(0, 1)])).await.unwrap();

    assert!((result.fidelity(&calibration).unwrap() - 0.9).abs() < 1e-9);
}

#[tokio::test]
async fn test_calibrated_fidelity_counts_swaps() {
    let topology = Topology::linear(3);
    let calibration = Calibration::from_edge_list(&topology, &[0.1, 0.1]).unwrap();
    let mapper = Mapper::new(topology, MapperConfig::default())
        .unwrap()
        .with_calibration(calibration.clone())
        .unwrap();
    let result = mapper.map(&triangle()).await.unwrap();

    let swaps = result.swap_count() as i32;
    assert!(swaps >= 1);
    let expected = 0.9f64.powi(3) * 0.9f64.powi(3 * swaps);
    assert!((result.fidelity(&calibration).unwrap() - expected).abs() < 1e-9);
}

#[tokio::test]
async fn test_empty_circuit_keeps_trivial_layout() {
    let mut c = Circuit::with_size("idle", 2, 0);
    c.h(QubitId(1)).unwrap();
    let mapper = Mapper::new(Topology::linear(3), MapperConfig::default()).unwrap();
    let result = mapper.map(&c).await.unwrap();

    assert!(result.chunks.is_empty());
    assert_eq!(result.initial_layout.physical(QubitId(1)), Some(1));
    assert_eq!(result.circuit.len(), 1);
}

/// Always runs out of time.
struct Stalling {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Oracle for Stalling {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn solve(&self, _instance: &Instance, _limit: Duration) -> MapResult<OracleOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(OracleOutcome::Timeout)
    }
}

#[tokio::test]
async fn test_timeouts_grow_budget_until_infeasible() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = MapperConfig::default().with_max_added_swaps(2);
    let mapper = Mapper::new(Topology::linear(2), config)
        .unwrap()
        .with_oracle(Stalling {
            calls: calls.clone(),
        });
    let err = mapper.map(&circuit(2, &[(0, 1)])).await.unwrap_err();

    assert!(matches!(
        err,
        MapError::MappingInfeasible {
            chunk: 0,
            added_swaps: 2,
            ..
        }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// Sleeps through its whole slice.
struct Sleeping;

#[async_trait]
impl Oracle for Sleeping {
    fn name(&self) -> &str {
        "sleeping"
    }

    async fn solve(&self, _instance: &Instance, limit: Duration) -> MapResult<OracleOutcome> {
        tokio::time::sleep(limit).await;
        Ok(OracleOutcome::Timeout)
    }
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhausted() {
    let config = MapperConfig::default().with_time_budget(Duration::from_secs(5));
    let mapper = Mapper::new(Topology::linear(2), config)
        .unwrap()
        .with_oracle(Sleeping);
    let err = mapper.map(&circuit(2, &[(0, 1)])).await.unwrap_err();
    assert!(matches!(err, MapError::BudgetExhausted { chunk: 0 }));
}

/// Delegates to varisat but claims the `fail_on`-th call is unsatisfiable.
struct Flaky {
    inner: VarisatOracle,
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl Oracle for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn solve(&self, instance: &Instance, limit: Duration) -> MapResult<OracleOutcome> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Ok(OracleOutcome::Unsatisfiable);
        }
        self.inner.solve(instance, limit).await
    }
}

#[tokio::test]
async fn test_failure_backtracks_into_previous_chunk() {
    let topology = Topology::linear(3);
    let config = MapperConfig::default().with_slice_size(2);
    let mapper = Mapper::new(topology.clone(), config)
        .unwrap()
        .with_oracle(Flaky {
            inner: VarisatOracle::default(),
            calls: AtomicUsize::new(0),
            fail_on: 2,
        });
    let result = mapper
        .map(&circuit(2, &[(0, 1), (0, 1), (0, 1), (0, 1)]))
        .await
        .unwrap();

    assert_eq!(result.chunks.len(), 2);
    // The boundary was not at fault, so all of it is ruled out.
    assert_eq!(result.chunks[0].negated_models, 1);
    assert_eq!(result.chunks[0].attempts, 2);
    assert_eq!(result.chunks[1].attempts, 2);
    assert_eq!(result.chunks[1].added_swaps, 0);
    assert_eq!(result.layouts[1], result.layouts[2]);
    assert_on_edges(&result.circuit, &topology);
}

/// Places both qubits, then exchanges them without any swap.
struct Teleporting;

#[async_trait]
impl Oracle for Teleporting {
    fn name(&self) -> &str {
        "teleporting"
    }

    async fn solve(&self, instance: &Instance, _limit: Duration) -> MapResult<OracleOutcome> {
        let codec = instance.codec();
        let x = |phys, log, slot| codec.var_id(&Var::Placement { phys, log, slot });
        Ok(OracleOutcome::Model(Model {
            cost: Some(0),
            assignment: vec![x(0, 0, 0), x(1, 1, 0), x(1, 0, 1), x(0, 1, 1)],
        }))
    }
}

#[tokio::test]
async fn test_unexplained_move_is_rejected() {
    let mapper = Mapper::new(Topology::linear(2), MapperConfig::default())
        .unwrap()
        .with_oracle(Teleporting);
    let err = mapper
        .map(&circuit(2, &[(0, 1), (0, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MapError::UnexplainedMapping {
            chunk: 0,
            slot: 1,
            ..
        }
    ));
}

#[test]
fn test_encode_single_instance() {
    let mapper = Mapper::new(Topology::linear(3), MapperConfig::default()).unwrap();
    let instance = mapper.encode_single(&triangle()).unwrap();
    assert_eq!(instance.structural, instance.hard.len());
    assert_eq!(instance.swap_slots, vec![1, 2]);
}
