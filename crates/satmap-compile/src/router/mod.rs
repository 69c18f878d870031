//! Swap routing between consecutive placements.
//!
//! In the unrouted encoding modes the oracle only chooses a placement per
//! slot; a [`Router`] then finds the swaps turning one placement into the
//! next.

mod process;
mod spanning_tree;

use async_trait::async_trait;

pub use process::ProcessRouter;
pub use spanning_tree::SpanningTreeRouter;

use crate::error::MapResult;
use crate::layout::Layout;
use crate::topology::Topology;

/// Move every logical qubit from its place in `initial` to its place in
/// `target`.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub topology: &'a Topology,
    pub initial: &'a Layout,
    pub target: &'a Layout,
}

/// Swaps to apply in order, and what the router says they cost.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub cost: f64,
    pub swaps: Vec<(u32, u32)>,
}

#[async_trait]
pub trait Router: Send + Sync {
    fn name(&self) -> &str;

    async fn route(&self, request: RouteRequest<'_>) -> MapResult<RouteResponse>;
}

/// Recover swaps from a sequence of `(logical, physical)` placements.
///
/// Between consecutive placements, the first logical qubit whose physical
/// position changed names the swap `(old, new)`. Identical consecutive
/// placements contribute nothing.
pub fn swaps_from_mappings(mappings: &[Vec<(u32, u32)>]) -> Vec<(u32, u32)> {
    mappings
        .windows(2)
        .filter_map(|pair| {
            let (before, after) = (&pair[0], &pair[1]);
            before.iter().find_map(|&(q, p)| {
                after
                    .iter()
                    .find(|&&(q1, p1)| q1 == q && p1 != p)
                    .map(|&(_, p1)| (p, p1))
            })
        })
        .collect()
}
