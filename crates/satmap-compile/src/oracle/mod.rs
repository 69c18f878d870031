//! MaxSAT oracles.
//!
//! An [`Oracle`] takes one chunk [`Instance`] and a time limit and reports a
//! model, unsatisfiability, or a timeout. Two implementations ship with the
//! crate:
//!
//! - [`VarisatOracle`]: in-process, built on the `varisat` CDCL solver.
//! - [`ProcessOracle`]: runs an external MaxSAT solver on a WCNF file.

mod builtin;
mod process;

use std::time::Duration;

use async_trait::async_trait;

pub use builtin::VarisatOracle;
pub use process::ProcessOracle;

use crate::encoder::Instance;
use crate::error::MapResult;

/// A satisfying assignment and the cost the oracle reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Objective value, when the oracle reported one.
    pub cost: Option<u64>,
    /// Signed literal ids; a variable not listed is false.
    pub assignment: Vec<i64>,
}

impl Model {
    /// Ids of the variables set true.
    pub fn true_vars(&self) -> impl Iterator<Item = i64> + '_ {
        self.assignment.iter().copied().filter(|&l| l > 0)
    }
}

/// Outcome of one oracle call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleOutcome {
    Model(Model),
    Unsatisfiable,
    Timeout,
}

/// A weighted MaxSAT solver.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Solve `instance`, giving up after `time_limit`.
    async fn solve(&self, instance: &Instance, time_limit: Duration) -> MapResult<OracleOutcome>;
}
