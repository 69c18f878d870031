//! Chunked, backtracking solve driver.
//!
//! The slot sequence is cut into chunks that are solved one at a time. Each
//! chunk starts from the placement the previous chunk ended with. When a
//! chunk cannot be solved, the driver either learns a clause forbidding the
//! part of the previous boundary that caused the failure and backtracks, or
//! grants the chunk a larger swap allowance and retries.

use std::ops::Range;
use std::time::Duration;

use satmap_ir::Circuit;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::calibration::Calibration;
use crate::codec::{Lit, Var};
use crate::config::{MapperConfig, RoutingMode};
use crate::core::{IncrementalSession, minimal_core};
use crate::encoder::{EncodeRequest, Instance, displacement_cap_clauses, encode};
use crate::error::{AttemptFailure, MapError, MapResult};
use crate::extract::{Interactions, extract};
use crate::interrupt::Interrupt;
use crate::layout::Layout;
use crate::oracle::{Oracle, OracleOutcome, VarisatOracle};
use crate::ordering::{Schedule, chunk_windows, schedule};
use crate::reconstruct::{SlotPlan, reconstruct};
use crate::router::{RouteRequest, Router, SpanningTreeRouter};
use crate::score;
use crate::topology::Topology;
use crate::verify::{Decoded, decode, slot_layouts, verify};

/// What to do after a failed chunk attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Learn a clause on the previous chunk's boundary and re-solve it.
    Backtrack,
    /// Retry the same chunk with one more swap per layer.
    GrowBudget,
}

/// Cross-chunk search state: extra swap allowance and learned boundary
/// clauses per chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacktrackState {
    added_swaps: Vec<u32>,
    negated: Vec<Vec<Vec<Lit>>>,
    backtrack_factor: usize,
    growth_limit: Vec<u32>,
}

impl BacktrackState {
    pub fn new(chunks: usize, backtrack_factor: usize, max_added_swaps: u32) -> Self {
        Self {
            added_swaps: vec![0; chunks],
            negated: vec![Vec::new(); chunks],
            backtrack_factor,
            growth_limit: vec![max_added_swaps; chunks],
        }
    }

    /// Lower `chunk`'s largest swap budget growth to `limit`.
    pub fn limit_growth(&mut self, chunk: usize, limit: u32) {
        self.growth_limit[chunk] = self.growth_limit[chunk].min(limit);
    }

    pub fn added_swaps(&self, chunk: usize) -> u32 {
        self.added_swaps[chunk]
    }

    /// Clauses forbidding boundaries of `chunk`.
    pub fn negated(&self, chunk: usize) -> &[Vec<Lit>] {
        &self.negated[chunk]
    }

    pub fn learn(&mut self, chunk: usize, clause: Vec<Lit>) {
        self.negated[chunk].push(clause);
    }

    /// Decide how to react to a failure at `chunk`.
    ///
    /// Backtracking is chosen while the previous chunk has fewer learned
    /// clauses than `backtrack_factor * (added_swaps[chunk] + 1)`, so every
    /// budget increase buys another round of boundary alternatives.
    pub fn on_failure(&mut self, chunk: usize) -> MapResult<Transition> {
        if chunk > 0 {
            let limit = self.backtrack_factor * (self.added_swaps[chunk] as usize + 1);
            if self.negated[chunk - 1].len() < limit {
                return Ok(Transition::Backtrack);
            }
        }
        self.grow(chunk)
    }

    /// Add one swap to `chunk`'s allowance.
    pub fn grow(&mut self, chunk: usize) -> MapResult<Transition> {
        if self.added_swaps[chunk] >= self.growth_limit[chunk] {
            return Err(self.infeasible(chunk));
        }
        self.added_swaps[chunk] += 1;
        Ok(Transition::GrowBudget)
    }

    /// The error reported when the search gives up on `chunk`.
    pub fn infeasible(&self, chunk: usize) -> MapError {
        MapError::MappingInfeasible {
            chunk,
            added_swaps: self.added_swaps[chunk],
            negated_models: self.negated[chunk].len(),
            rejected_boundaries: chunk.checked_sub(1).map_or(0, |p| self.negated[p].len()),
        }
    }
}

/// Per-chunk summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkStats {
    /// Slots covered by the chunk.
    pub slots: Range<usize>,
    pub attempts: u32,
    pub added_swaps: u32,
    /// Boundary clauses learned against this chunk.
    pub negated_models: usize,
    pub cost: f64,
}

/// A verified mapping of a circuit.
#[derive(Debug, Clone)]
pub struct MappingResult {
    /// The circuit on physical qubits, with swaps inserted.
    pub circuit: Circuit,
    /// Layout at every slot.
    pub layouts: Vec<Layout>,
    /// Swaps inserted before every slot.
    pub swaps: Vec<Vec<(u32, u32)>>,
    pub initial_layout: Layout,
    pub final_layout: Layout,
    /// Sum of per-chunk objective values (router costs in the unrouted modes).
    pub cost: f64,
    pub chunks: Vec<ChunkStats>,
}

impl MappingResult {
    pub fn swap_count(&self) -> usize {
        score::swap_count(&self.swaps)
    }

    /// Estimated success probability of the mapped circuit.
    pub fn fidelity(&self, calibration: &Calibration) -> MapResult<f64> {
        score::fidelity(&self.circuit, calibration)
    }
}

struct Solved {
    layouts: Vec<Layout>,
    swaps: Vec<Vec<(u32, u32)>>,
    cost: f64,
}

enum Attempt {
    Solved(Solved),
    Failed {
        failure: AttemptFailure,
        instance: Instance,
        /// Index of the first boundary unit in `instance.hard`.
        boundary_start: usize,
    },
}

/// Inputs of one chunk attempt.
struct AttemptInput<'a> {
    chunk: usize,
    window: Range<usize>,
    pairs: &'a [(u32, u32)],
    layer_starts: Vec<bool>,
    logical: usize,
    boundary: Option<&'a Layout>,
    /// Layout the chunk's last slot must reproduce (cyclic runs).
    anchor: Option<&'a Layout>,
    /// Single-chunk cyclic run: last slot must equal the first.
    wrap: bool,
    negated: &'a [Vec<Lit>],
    added_swaps: u32,
    slice: Duration,
}

fn placement(phys: u32, log: u32, slot: usize) -> Var {
    Var::Placement {
        phys: phys as usize,
        log: log as usize,
        slot,
    }
}

/// The mapping pass.
pub struct Mapper {
    topology: Topology,
    calibration: Option<Calibration>,
    config: MapperConfig,
    oracle: Box<dyn Oracle>,
    router: Box<dyn Router>,
}

impl Mapper {
    /// A mapper using the built-in oracle and router.
    pub fn new(topology: Topology, config: MapperConfig) -> MapResult<Self> {
        config.validate()?;
        Ok(Self {
            topology,
            calibration: None,
            config,
            oracle: Box::new(VarisatOracle::default()),
            router: Box::new(SpanningTreeRouter),
        })
    }

    /// Weight the objective by edge error rates.
    pub fn with_calibration(mut self, calibration: Calibration) -> MapResult<Self> {
        calibration.covers(&self.topology)?;
        self.calibration = Some(calibration);
        Ok(self)
    }

    pub fn with_oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    pub fn with_router(mut self, router: impl Router + 'static) -> Self {
        self.router = Box::new(router);
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Interactions, slot order and the slot sequence of qubit pairs.
    fn pairs(&self, circuit: &Circuit) -> MapResult<(Interactions, Schedule, Vec<(u32, u32)>)> {
        let interactions = extract(circuit)?;
        let physical = self.topology.num_qubits() as usize;
        if interactions.logical_count > physical {
            return Err(MapError::CircuitTooLarge(format!(
                "{} logical qubits do not fit on {physical} physical qubits",
                interactions.logical_count
            )));
        }
        let schedule = schedule(circuit, &interactions, self.config.layering)?;
        let pairs = schedule
            .slots
            .iter()
            .map(|&i| {
                let inter = &interactions.interactions[i];
                (inter.control.0, inter.target.0)
            })
            .collect();
        Ok((interactions, schedule, pairs))
    }

    fn displacement_fits(&self, logical: usize, slots: usize, added: u32) -> bool {
        let max_displaced = self.config.max_displaced + added as usize;
        displacement_cap_clauses(logical, slots, max_displaced) <= self.config.max_displacement_clauses
    }

    /// Chunk windows over `num_slots` slots.
    ///
    /// In bounded-displacement mode the chunks are shortened until every
    /// displacement cap fits within `max_displacement_clauses`.
    fn windows(&self, num_slots: usize, logical: usize) -> Vec<Range<usize>> {
        let mut size = self.config.slice_size;
        loop {
            let windows = chunk_windows(num_slots, size);
            let fits = self.config.routing != RoutingMode::BoundedDisplacement
                || windows.iter().all(|w| self.displacement_fits(logical, w.len(), 0));
            if fits || size == 1 {
                if size < self.config.slice_size {
                    debug!(slice_size = size, "shortened chunks to fit the displacement cap");
                }
                return windows;
            }
            size -= 1;
        }
    }

    /// Largest budget growth whose displacement cap still fits a chunk of
    /// `slots` slots.
    fn displacement_growth(&self, logical: usize, slots: usize) -> u32 {
        (0..self.config.max_added_swaps)
            .take_while(|&added| self.displacement_fits(logical, slots, added + 1))
            .count() as u32
    }

    fn swaps_for(&self, added: u32) -> usize {
        if self.config.routing.is_routed() {
            (self.config.swaps_per_layer + added) as usize
        } else {
            0
        }
    }

    /// Encode the whole circuit as a single chunk, without boundary clauses.
    pub fn encode_single(&self, circuit: &Circuit) -> MapResult<Instance> {
        let (interactions, schedule, pairs) = self.pairs(circuit)?;
        let starts = schedule.layer_starts(&(0..pairs.len()));
        encode(&EncodeRequest {
            topology: &self.topology,
            calibration: self.calibration.as_ref(),
            logical_count: interactions.logical_count,
            interactions: &pairs,
            layer_starts: &starts,
            swaps: self.swaps_for(0),
            routing: self.config.routing,
            max_displaced: self.config.max_displaced,
            max_displacement_clauses: self.config.max_displacement_clauses,
            fidelity_scale: self.config.fidelity_scale,
            extra: &[],
        })
    }

    /// Map `circuit` onto the topology.
    #[instrument(skip_all, fields(circuit = circuit.name()))]
    pub async fn map(&self, circuit: &Circuit) -> MapResult<MappingResult> {
        let (interactions, schedule, pairs) = self.pairs(circuit)?;
        let logical = interactions.logical_count;
        let windows = self.windows(pairs.len(), logical);
        let chunks = windows.len();
        info!(
            logical,
            physical = self.topology.num_qubits(),
            interactions = pairs.len(),
            layers = schedule.num_layers(),
            chunks,
            routing = ?self.config.routing,
            oracle = self.oracle.name(),
            "mapping circuit"
        );

        let mut state = BacktrackState::new(
            chunks,
            self.config.backtrack_factor,
            self.config.max_added_swaps,
        );
        if self.config.routing == RoutingMode::BoundedDisplacement {
            for (c, window) in windows.iter().enumerate() {
                state.limit_growth(c, self.displacement_growth(logical, window.len()));
            }
        }
        let mut solved: Vec<Option<Solved>> = (0..chunks).map(|_| None).collect();
        let mut attempts = vec![0u32; chunks];
        let mut total_attempts = 0usize;
        let deadline = Instant::now() + self.config.time_budget;

        let mut c = 0;
        while c < chunks {
            total_attempts += 1;
            if total_attempts > self.config.max_attempts {
                return Err(state.infeasible(c));
            }
            attempts[c] += 1;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(MapError::BudgetExhausted { chunk: c });
            }
            let slice = remaining / (chunks - c) as u32;
            let slice_end = Instant::now() + slice;

            let boundary = c
                .checked_sub(1)
                .and_then(|p| solved[p].as_ref())
                .and_then(|s| s.layouts.last());
            let anchor = (self.config.cyclic && chunks > 1 && c + 1 == chunks)
                .then(|| solved[0].as_ref().and_then(|s| s.layouts.first()))
                .flatten();
            let input = AttemptInput {
                chunk: c,
                window: windows[c].clone(),
                pairs: &pairs[windows[c].clone()],
                layer_starts: schedule.layer_starts(&windows[c]),
                logical,
                boundary,
                anchor,
                wrap: self.config.cyclic && chunks == 1,
                negated: state.negated(c),
                added_swaps: state.added_swaps(c),
                slice,
            };

            match self.attempt(input).await? {
                Attempt::Solved(s) => {
                    debug!(chunk = c, cost = s.cost, "chunk solved");
                    solved[c] = Some(s);
                    c += 1;
                }
                Attempt::Failed {
                    failure,
                    instance,
                    boundary_start,
                } => {
                    warn!(chunk = c, %failure, attempt = attempts[c], "chunk attempt failed");
                    match state.on_failure(c)? {
                        Transition::Backtrack => {
                            let prev_last = windows[c - 1].len() - 1;
                            let learned = self
                                .learn_boundary(instance, boundary_start, prev_last, slice_end)
                                .await?;
                            match learned {
                                Some(clause) => {
                                    info!(chunk = c, core = clause.len(), "backtracking");
                                    state.learn(c - 1, clause);
                                    c -= 1;
                                }
                                None => {
                                    state.grow(c)?;
                                    info!(
                                        chunk = c,
                                        added_swaps = state.added_swaps(c),
                                        "boundary not at fault, growing swap budget"
                                    );
                                }
                            }
                        }
                        Transition::GrowBudget => {
                            info!(
                                chunk = c,
                                added_swaps = state.added_swaps(c),
                                "growing swap budget"
                            );
                        }
                    }
                }
            }
        }

        let mut layouts = Vec::with_capacity(pairs.len());
        let mut swaps = Vec::with_capacity(pairs.len());
        let mut stats = Vec::with_capacity(chunks);
        let mut cost = 0.0;
        for (c, s) in solved.into_iter().enumerate() {
            let Some(s) = s else {
                return Err(state.infeasible(c));
            };
            stats.push(ChunkStats {
                slots: windows[c].clone(),
                attempts: attempts[c],
                added_swaps: state.added_swaps(c),
                negated_models: state.negated(c).len(),
                cost: s.cost,
            });
            cost += s.cost;
            layouts.extend(s.layouts);
            swaps.extend(s.swaps);
        }

        let physical = self.topology.num_qubits() as usize;
        let initial_layout = layouts
            .first()
            .cloned()
            .unwrap_or_else(|| Layout::trivial(logical, physical));
        let final_layout = layouts.last().cloned().unwrap_or_else(|| initial_layout.clone());
        let plan = SlotPlan {
            interactions: &interactions,
            schedule: &schedule,
            layouts: &layouts,
            swaps: &swaps,
        };
        let mapped = reconstruct(circuit, plan, &self.topology)?;

        info!(
            swaps = score::swap_count(&swaps),
            cost,
            attempts = total_attempts,
            "mapping complete"
        );
        Ok(MappingResult {
            circuit: mapped,
            layouts,
            swaps,
            initial_layout,
            final_layout,
            cost,
            chunks: stats,
        })
    }

    #[instrument(skip_all, fields(chunk = input.chunk, slots = ?input.window, added = input.added_swaps))]
    async fn attempt(&self, input: AttemptInput<'_>) -> MapResult<Attempt> {
        let slots = input.window.len();
        let last = slots - 1;
        let physical = self.topology.num_qubits();

        let mut extra: Vec<Vec<Lit>> = input.negated.to_vec();
        if let Some(anchor) = input.anchor {
            extra.extend(anchor.iter().map(|(q, p)| vec![placement(p, q.0, last).pos()]));
        }
        if input.wrap {
            for i in 0..physical {
                for j in 0..input.logical as u32 {
                    let (first, end) = (placement(i, j, 0), placement(i, j, last));
                    extra.push(vec![first.neg(), end.pos()]);
                    extra.push(vec![first.pos(), end.neg()]);
                }
            }
        }
        let extra_boundary = extra.len();
        if let Some(boundary) = input.boundary {
            extra.extend(boundary.iter().map(|(q, p)| vec![placement(p, q.0, 0).pos()]));
        }

        let instance = encode(&EncodeRequest {
            topology: &self.topology,
            calibration: self.calibration.as_ref(),
            logical_count: input.logical,
            interactions: input.pairs,
            layer_starts: &input.layer_starts,
            swaps: self.swaps_for(input.added_swaps),
            routing: self.config.routing,
            max_displaced: self.config.max_displaced + input.added_swaps as usize,
            max_displacement_clauses: self.config.max_displacement_clauses,
            fidelity_scale: self.config.fidelity_scale,
            extra: &extra,
        })?;
        let boundary_start = instance.structural + extra_boundary;

        let started = Instant::now();
        let outcome = self.oracle.solve(&instance, input.slice).await?;
        debug!(
            oracle = self.oracle.name(),
            vars = instance.num_vars(),
            clauses = instance.hard.len() + instance.soft.len(),
            slice = ?input.slice,
            elapsed = ?started.elapsed(),
            "oracle returned"
        );

        let failed = |failure| {
            Ok(Attempt::Failed {
                failure,
                instance: instance.clone(),
                boundary_start,
            })
        };
        let model = match outcome {
            OracleOutcome::Model(model) => model,
            OracleOutcome::Unsatisfiable => return failed(AttemptFailure::Unsatisfiable),
            OracleOutcome::Timeout => return failed(AttemptFailure::Timeout),
        };
        let decoded = decode(&instance, &model)?;
        if !decoded.has_boundary() {
            return failed(AttemptFailure::MissingBoundary);
        }

        let solved = if self.config.routing.is_routed() {
            let layouts = verify(input.chunk, &decoded, &self.topology, input.logical, input.boundary)?;
            let cost = model
                .cost
                .unwrap_or_else(|| instance.violated_weight(&model.assignment));
            Solved {
                layouts,
                swaps: decoded.swaps,
                cost: cost as f64,
            }
        } else {
            self.route_chunk(&input, decoded).await?
        };
        Ok(Attempt::Solved(solved))
    }

    /// Route between consecutive placements of an unrouted chunk, then
    /// verify the result like a routed one.
    async fn route_chunk(&self, input: &AttemptInput<'_>, decoded: Decoded) -> MapResult<Solved> {
        let physical = self.topology.num_qubits() as usize;
        let placed = slot_layouts(input.chunk, &decoded, physical, input.logical)?;
        let mut swaps = vec![Vec::new(); placed.len()];
        let mut cost = 0.0;
        for k in 1..placed.len() {
            if placed[k] == placed[k - 1] {
                continue;
            }
            let response = self
                .router
                .route(RouteRequest {
                    topology: &self.topology,
                    initial: &placed[k - 1],
                    target: &placed[k],
                })
                .await?;
            debug!(router = self.router.name(), slot = k, cost = response.cost, "routed transition");
            cost += response.cost;
            swaps[k] = response.swaps;
        }
        let routed = Decoded {
            placements: decoded.placements,
            swaps,
        };
        let layouts = verify(input.chunk, &routed, &self.topology, input.logical, input.boundary)?;
        Ok(Solved {
            layouts,
            swaps: routed.swaps,
            cost,
        })
    }

    /// Clause forbidding the part of the previous chunk's boundary that
    /// makes the failed instance unsatisfiable, stated on that chunk's last
    /// slot. `None` when the boundary is not to blame.
    ///
    /// Core shrinking stops at `slice_end`, the end of the failed attempt's
    /// slice, or when this future is dropped.
    async fn learn_boundary(
        &self,
        instance: Instance,
        boundary_start: usize,
        prev_last: usize,
        slice_end: Instant,
    ) -> MapResult<Option<Vec<Lit>>> {
        let assumptions: Vec<i64> = instance.hard[boundary_start..]
            .iter()
            .filter_map(|clause| clause.first().copied())
            .collect();
        if assumptions.is_empty() {
            return Ok(None);
        }
        let limit = self.config.core_probe_limit;
        let codec = instance.codec();
        let clauses = instance.hard;
        let boundary = assumptions.clone();
        let (interrupt, _guard) = Interrupt::new(slice_end.into_std());
        let core = tokio::task::spawn_blocking(move || {
            let mut session = IncrementalSession::new(&clauses[..boundary_start]);
            minimal_core(&mut session, &boundary, limit, &interrupt)
        })
        .await
        .map_err(|e| MapError::OracleOutput(format!("core extraction failed: {e}")))??;

        let core = match core {
            Some(core) if core.is_empty() => return Ok(None),
            Some(core) => core,
            // Satisfiable under the full boundary: the oracle gave up, so
            // rule out the whole boundary.
            None => assumptions,
        };
        core.iter()
            .map(|&id| match codec.decode(id)?.var {
                Var::Placement { phys, log, .. } => Ok(Var::Placement {
                    phys,
                    log,
                    slot: prev_last,
                }
                .neg()),
                other => Err(MapError::OracleOutput(format!(
                    "boundary core contains non-placement literal {other:?}"
                ))),
            })
            .collect::<MapResult<Vec<Lit>>>()
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_chunk_only_grows() {
        let mut state = BacktrackState::new(3, 50, 2);
        assert_eq!(state.on_failure(0).unwrap(), Transition::GrowBudget);
        assert_eq!(state.added_swaps(0), 1);
        assert_eq!(state.on_failure(0).unwrap(), Transition::GrowBudget);
        assert!(matches!(
            state.on_failure(0),
            Err(MapError::MappingInfeasible { chunk: 0, added_swaps: 2, .. })
        ));
    }

    #[test]
    fn test_backtrack_threshold_scales_with_budget() {
        let mut state = BacktrackState::new(2, 2, 4);
        let clause = vec![placement(0, 0, 0).neg()];
        assert_eq!(state.on_failure(1).unwrap(), Transition::Backtrack);
        state.learn(0, clause.clone());
        assert_eq!(state.on_failure(1).unwrap(), Transition::Backtrack);
        state.learn(0, clause.clone());
        // Two learned clauses reach 2 * (0 + 1).
        assert_eq!(state.on_failure(1).unwrap(), Transition::GrowBudget);
        assert_eq!(state.added_swaps(1), 1);
        // The limit is now 2 * (1 + 1).
        assert_eq!(state.on_failure(1).unwrap(), Transition::Backtrack);
        assert_eq!(state.negated(0).len(), 2);
    }

    #[test]
    fn test_exhausted_first_chunk_counts_its_own_clauses() {
        let mut state = BacktrackState::new(2, 1, 0);
        state.learn(0, vec![placement(0, 0, 1).neg()]);
        state.learn(0, vec![placement(1, 0, 1).neg()]);
        assert!(matches!(
            state.on_failure(0),
            Err(MapError::MappingInfeasible {
                chunk: 0,
                added_swaps: 0,
                negated_models: 2,
                rejected_boundaries: 0,
            })
        ));
        // Chunk 1 has learned nothing itself; its predecessor rejected two.
        assert!(matches!(
            state.infeasible(1),
            MapError::MappingInfeasible {
                negated_models: 0,
                rejected_boundaries: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_growth_limit_is_per_chunk() {
        let mut state = BacktrackState::new(2, 0, 3);
        state.limit_growth(1, 1);
        state.limit_growth(1, 2);
        assert_eq!(state.grow(1).unwrap(), Transition::GrowBudget);
        assert!(matches!(
            state.grow(1),
            Err(MapError::MappingInfeasible { chunk: 1, added_swaps: 1, .. })
        ));
        for _ in 0..3 {
            assert_eq!(state.grow(0).unwrap(), Transition::GrowBudget);
        }
        assert!(state.grow(0).is_err());
    }

    #[test]
    fn test_bounded_chunks_shrink_to_fit_the_cap() {
        let config = MapperConfig {
            routing: RoutingMode::BoundedDisplacement,
            max_displaced: 1,
            max_displacement_clauses: 15,
            max_added_swaps: 4,
            ..MapperConfig::default()
        };
        let mapper = Mapper::new(Topology::linear(3), config).unwrap();
        // C(3 * (len - 1), 2) <= 15 allows at most 3 slots per chunk.
        let windows = mapper.windows(7, 3);
        assert!(windows.iter().all(|w| w.len() <= 3), "{windows:?}");
        assert_eq!(windows.iter().map(|w| w.len()).sum::<usize>(), 7);
        // Raising the cap to 2 would need C(6, 3) = 20 clauses.
        assert_eq!(mapper.displacement_growth(3, 3), 0);
        // Two slots give three indicators, so any cap of three or more is free.
        assert_eq!(mapper.displacement_growth(3, 2), 4);
    }

    #[test]
    fn test_default_bounded_chunk_fits() {
        let config = MapperConfig::default().with_routing(RoutingMode::BoundedDisplacement);
        let mapper = Mapper::new(Topology::linear(3), config.clone()).unwrap();
        let windows = mapper.windows(25, 3);
        assert!(windows.len() > 1);
        for w in &windows {
            assert!(
                displacement_cap_clauses(3, w.len(), config.max_displaced)
                    <= config.max_displacement_clauses
            );
        }
    }
}
