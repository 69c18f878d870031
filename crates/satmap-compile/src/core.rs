//! Unsatisfiable-core extraction over boundary assumptions.
//!
//! When chunk `c` cannot be solved from the placement chunk `c - 1` left
//! behind, only part of that placement is usually to blame. Solving the
//! chunk's clauses incrementally under the boundary units as assumptions
//! yields a core; negating just that core rules out every earlier placement
//! sharing it, not only the one that was tried.

use itertools::Itertools;
use tracing::trace;
use varisat::{ExtendFormula, Lit, Solver};

use crate::error::{MapError, MapResult};
use crate::interrupt::Interrupt;

/// An incremental SAT session over a fixed clause set.
pub struct IncrementalSession {
    solver: Solver<'static>,
    calls: usize,
}

impl std::fmt::Debug for IncrementalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalSession")
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}

fn lit(id: i64) -> Lit {
    Lit::from_dimacs(id as isize)
}

impl IncrementalSession {
    pub fn new<'c>(clauses: impl IntoIterator<Item = &'c Vec<i64>>) -> Self {
        let mut solver = Solver::new();
        for clause in clauses {
            let lits: Vec<Lit> = clause.iter().map(|&l| lit(l)).collect();
            solver.add_clause(&lits);
        }
        Self { solver, calls: 0 }
    }

    /// Solve under `assumptions`; `true` means satisfiable.
    pub fn solve_under(&mut self, assumptions: &[i64]) -> MapResult<bool> {
        let lits: Vec<Lit> = assumptions.iter().map(|&l| lit(l)).collect();
        self.solver.assume(&lits);
        self.calls += 1;
        self.solver
            .solve()
            .map_err(|e| MapError::OracleOutput(format!("varisat: {e}")))
    }

    /// Assumptions responsible for the last unsatisfiable answer.
    pub fn failed_core(&self) -> Vec<i64> {
        self.solver
            .failed_core()
            .map(|core| core.iter().map(|l| l.to_dimacs() as i64).collect())
            .unwrap_or_default()
    }

    /// Solver calls made so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

/// A small subset of `assumptions` that is unsatisfiable together with the
/// session's clauses, or `None` if all of them together are satisfiable.
///
/// The solver's own core is first shrunk by deletion until every element is
/// needed. Smaller subsets of that irreducible core are then tried in
/// increasing size while the probe budget lasts, so within budget the result
/// has minimum cardinality. Shrinking stops early once `interrupt` fires; the
/// core found so far is still returned.
pub fn minimal_core(
    session: &mut IncrementalSession,
    assumptions: &[i64],
    probe_limit: usize,
    interrupt: &Interrupt,
) -> MapResult<Option<Vec<i64>>> {
    if session.solve_under(assumptions)? {
        return Ok(None);
    }
    let mut core = session.failed_core();
    let mut probes = 0usize;

    let mut i = 0;
    while i < core.len() && probes < probe_limit && !interrupt.should_stop() {
        let trial: Vec<i64> = core
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != i)
            .map(|(_, &l)| l)
            .collect();
        probes += 1;
        if session.solve_under(&trial)? {
            i += 1;
        } else {
            let smaller = session.failed_core();
            core = trial.into_iter().filter(|l| smaller.contains(l)).collect();
        }
    }
    trace!(size = core.len(), probes, "core after deletion");

    for size in 1..core.len() {
        for subset in core.iter().copied().combinations(size) {
            if probes >= probe_limit || interrupt.should_stop() {
                return Ok(Some(core));
            }
            probes += 1;
            if !session.solve_under(&subset)? {
                return Ok(Some(subset));
            }
        }
    }
    Ok(Some(core))
}
