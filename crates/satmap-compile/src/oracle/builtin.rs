//! In-process MaxSAT on top of the `varisat` CDCL solver.
//!
//! Every soft clause gets a relaxation variable. The search then
//! 1. finds any model of the hard clauses,
//! 2. greedily forbids relaxations in decreasing weight order, keeping each
//!    one whose addition stays satisfiable,
//! 3. for uniform weights, tightens a sequential counter over the
//!    relaxation variables until the bound becomes unsatisfiable.
//!
//! Step 3 proves optimality when it runs to completion. The time limit and
//! cancellation are checked between solver calls; a single call is not
//! interrupted.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, trace};
use varisat::{ExtendFormula, Lit, Solver};

use super::{Model, Oracle, OracleOutcome};
use crate::encoder::Instance;
use crate::error::{MapError, MapResult};
use crate::interrupt::Interrupt;

/// Built-in oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarisatOracle {
    max_improvements: usize,
    counter_limit: usize,
}

impl Default for VarisatOracle {
    fn default() -> Self {
        Self {
            max_improvements: 10_000,
            counter_limit: 4_000_000,
        }
    }
}

impl VarisatOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap on solver calls spent improving the first model.
    pub fn with_max_improvements(mut self, max: usize) -> Self {
        self.max_improvements = max;
        self
    }

    /// Largest cardinality counter, in auxiliary variables, worth building.
    pub fn with_counter_limit(mut self, limit: usize) -> Self {
        self.counter_limit = limit;
        self
    }

    fn run(self, instance: &Instance, interrupt: &Interrupt) -> MapResult<OracleOutcome> {
        let mut search = Search::new(instance);
        let Some(first) = search.solve(&[])? else {
            return Ok(OracleOutcome::Unsatisfiable);
        };
        if interrupt.should_stop() {
            return Ok(OracleOutcome::Timeout);
        }

        let mut best_cost = instance.violated_weight(&first);
        let mut best = first;
        let mut calls = 0usize;
        trace!(cost = best_cost, "first model");

        let mut order: Vec<usize> = (0..instance.soft.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(instance.soft[i].weight));
        let mut fixed = Vec::new();
        for i in order {
            if best_cost == 0 || calls >= self.max_improvements || interrupt.should_stop() {
                break;
            }
            fixed.push(!search.relax[i]);
            if satisfied(&best, &instance.soft[i].lits) {
                continue;
            }
            calls += 1;
            match search.solve(&fixed)? {
                Some(model) => {
                    best_cost = instance.violated_weight(&model);
                    best = model;
                }
                None => {
                    fixed.pop();
                }
            }
        }
        debug!(cost = best_cost, calls, "greedy improvement done");

        let uniform = instance.soft.first().map(|c| c.weight).filter(|&w| {
            instance.soft.iter().all(|c| c.weight == w)
        });
        if let Some(weight) = uniform {
            let mut count = (best_cost / weight) as usize;
            if count > 0 && count * instance.soft.len() <= self.counter_limit {
                let at_least = search.counter(count);
                while count > 0 && calls < self.max_improvements && !interrupt.should_stop() {
                    calls += 1;
                    match search.solve(&[!at_least[count - 1]])? {
                        Some(model) => {
                            best_cost = instance.violated_weight(&model);
                            count = (best_cost / weight) as usize;
                            best = model;
                        }
                        None => break,
                    }
                }
                debug!(cost = best_cost, calls, "cardinality tightening done");
            }
        }

        let num_vars = instance.num_vars() as i64;
        best.retain(|l| l.abs() <= num_vars);
        Ok(OracleOutcome::Model(Model {
            cost: Some(best_cost),
            assignment: best,
        }))
    }
}

/// `model` lists every variable in id order.
fn satisfied(model: &[i64], clause: &[i64]) -> bool {
    clause.iter().any(|&lit| {
        let idx = lit.unsigned_abs() as usize;
        idx >= 1 && model.get(idx - 1).is_some_and(|&v| v == lit)
    })
}

struct Search {
    solver: Solver<'static>,
    relax: Vec<Lit>,
    next_var: isize,
}

impl Search {
    fn new(instance: &Instance) -> Self {
        let mut solver = Solver::new();
        let num_vars = instance.num_vars() as isize;
        for clause in &instance.hard {
            let lits: Vec<Lit> = clause.iter().map(|&l| Lit::from_dimacs(l as isize)).collect();
            solver.add_clause(&lits);
        }
        let mut next_var = num_vars + 1;
        let mut relax = Vec::with_capacity(instance.soft.len());
        for clause in &instance.soft {
            let r = Lit::from_dimacs(next_var);
            next_var += 1;
            let mut lits: Vec<Lit> = clause.lits.iter().map(|&l| Lit::from_dimacs(l as isize)).collect();
            lits.push(r);
            solver.add_clause(&lits);
            relax.push(r);
        }
        Self {
            solver,
            relax,
            next_var,
        }
    }

    fn fresh(&mut self) -> Lit {
        let lit = Lit::from_dimacs(self.next_var);
        self.next_var += 1;
        lit
    }

    fn solve(&mut self, assumptions: &[Lit]) -> MapResult<Option<Vec<i64>>> {
        self.solver.assume(assumptions);
        match self.solver.solve() {
            Ok(true) => {
                // Dense by id: variables the solver never saw are false.
                let mut model: Vec<i64> = (1..self.next_var as i64).map(|id| -id).collect();
                for lit in self.solver.model().unwrap_or_default() {
                    let id = lit.to_dimacs() as i64;
                    if let Some(slot) = model.get_mut(id.unsigned_abs() as usize - 1) {
                        *slot = id;
                    }
                }
                Ok(Some(model))
            }
            Ok(false) => Ok(None),
            Err(e) => Err(MapError::OracleOutput(format!("varisat: {e}"))),
        }
    }

    /// Sequential counter over the relaxation variables.
    ///
    /// Entry `j` of the result is implied whenever more than `j` of them are
    /// true, so assuming its negation bounds the count by `j`.
    fn counter(&mut self, width: usize) -> Vec<Lit> {
        let inputs = self.relax.clone();
        let mut prev: Vec<Lit> = Vec::new();
        for (i, &x) in inputs.iter().enumerate() {
            let reg: Vec<Lit> = (0..width).map(|_| self.fresh()).collect();
            self.solver.add_clause(&[!x, reg[0]]);
            if i > 0 {
                for j in 0..width {
                    self.solver.add_clause(&[!prev[j], reg[j]]);
                    if j > 0 {
                        self.solver.add_clause(&[!x, !prev[j - 1], reg[j]]);
                    }
                }
            }
            prev = reg;
        }
        prev
    }
}

#[async_trait]
impl Oracle for VarisatOracle {
    fn name(&self) -> &str {
        "varisat"
    }

    async fn solve(&self, instance: &Instance, time_limit: Duration) -> MapResult<OracleOutcome> {
        let instance = instance.clone();
        let this = *self;
        // Dropping this future drops `_guard`, which stops the search.
        let (interrupt, _guard) = Interrupt::new(Instant::now() + time_limit);
        tokio::task::spawn_blocking(move || this.run(&instance, &interrupt))
            .await
            .map_err(|e| MapError::OracleOutput(format!("solver task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Dims;
    use crate::encoder::SoftClause;

    /// Five free variables (the p/r/x/w/d families of a 1x1x1 chunk).
    fn instance(hard: Vec<Vec<i64>>, soft: Vec<SoftClause>) -> Instance {
        Instance {
            dims: Dims {
                phys: 1,
                log: 1,
                slots: 1,
                swaps: 0,
                edge_options: 1,
            },
            structural: hard.len(),
            hard,
            soft,
            swap_slots: vec![],
        }
    }

    fn soft(weight: u64, lits: &[i64]) -> SoftClause {
        SoftClause {
            weight,
            lits: lits.to_vec(),
        }
    }

    fn model(outcome: OracleOutcome) -> Model {
        match outcome {
            OracleOutcome::Model(m) => m,
            other => panic!("expected a model, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsatisfiable() {
        let inst = instance(vec![vec![1], vec![-1]], vec![]);
        let outcome = VarisatOracle::new().solve(&inst, Duration::from_secs(10)).await.unwrap();
        assert_eq!(outcome, OracleOutcome::Unsatisfiable);
    }

    #[tokio::test]
    async fn test_empty_clause_is_unsatisfiable() {
        let inst = instance(vec![vec![]], vec![]);
        let outcome = VarisatOracle::new().solve(&inst, Duration::from_secs(10)).await.unwrap();
        assert_eq!(outcome, OracleOutcome::Unsatisfiable);
    }

    #[tokio::test]
    async fn test_uniform_optimum() {
        // At least two of 1..=4 true; every true variable costs one.
        let hard = vec![vec![1, 2], vec![3, 4], vec![1, 3]];
        let softs = (1..=4).map(|v| soft(1, &[-v])).collect();
        let inst = instance(hard, softs);
        let m = model(VarisatOracle::new().solve(&inst, Duration::from_secs(10)).await.unwrap());
        assert_eq!(m.cost, Some(2));
        assert_eq!(inst.violated_weight(&m.assignment), 2);
        assert!(m.assignment.iter().all(|l| l.abs() <= inst.num_vars() as i64));
    }

    #[tokio::test]
    async fn test_weighted_prefers_heavy_clause() {
        // Exactly one of 1, 2 is true; keeping 1 false is worth more.
        let hard = vec![vec![1, 2], vec![-1, -2]];
        let inst = instance(hard, vec![soft(10, &[-1]), soft(3, &[-2])]);
        let m = model(VarisatOracle::new().solve(&inst, Duration::from_secs(10)).await.unwrap());
        assert_eq!(m.cost, Some(3));
        assert!(m.assignment.contains(&2));
    }

    #[test]
    fn test_cancelled_search_reports_timeout() {
        let hard = vec![vec![1, 2]];
        let inst = instance(hard, vec![soft(1, &[-1]), soft(1, &[-2])]);
        let (interrupt, guard) = Interrupt::new(Instant::now() + Duration::from_secs(3600));
        drop(guard);
        let outcome = VarisatOracle::new().run(&inst, &interrupt).unwrap();
        assert_eq!(outcome, OracleOutcome::Timeout);
    }

    #[test]
    fn test_satisfied_lookup() {
        let model = vec![1, -2, 3];
        assert!(satisfied(&model, &[-2]));
        assert!(!satisfied(&model, &[2, -3]));
    }
}
