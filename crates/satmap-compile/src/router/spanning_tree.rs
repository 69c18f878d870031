//! Token swapping along a BFS spanning tree.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::{RouteRequest, RouteResponse, Router};
use crate::error::{MapError, MapResult};
use crate::layout::Layout;
use crate::topology::Topology;

/// Built-in router.
///
/// Every physical qubit holds a token: the logical qubit placed there, or a
/// blank. Blanks are paired with the free qubits of the target in sorted
/// order, so every token has a destination. Vertices of a BFS tree are then
/// filled deepest first, each by walking its token along the tree path. A
/// vertex filled this way is a leaf of the unfilled part and is never
/// touched again. Swaps exchanging two blanks are dropped.
///
/// The swap count is at most `n * diameter(tree)` and not optimal in general.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpanningTreeRouter;

struct Tree {
    parent: Vec<Option<u32>>,
    depth: Vec<u32>,
    order: Vec<u32>,
}

fn bfs_tree(topology: &Topology) -> MapResult<Tree> {
    let n = topology.num_qubits() as usize;
    let mut parent = vec![None; n];
    let mut depth = vec![0; n];
    let mut seen = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();
    if n > 0 {
        seen[0] = true;
        queue.push_back(0u32);
    }
    while let Some(v) = queue.pop_front() {
        order.push(v);
        for w in topology.neighbors(v) {
            if !seen[w as usize] {
                seen[w as usize] = true;
                parent[w as usize] = Some(v);
                depth[w as usize] = depth[v as usize] + 1;
                queue.push_back(w);
            }
        }
    }
    if order.len() != n {
        return Err(MapError::InvalidTopology(
            "cannot route on a disconnected coupling graph".into(),
        ));
    }
    Ok(Tree {
        parent,
        depth,
        order,
    })
}

impl Tree {
    /// Vertices from `from` to `to` along the tree, both ends included.
    fn path(&self, from: u32, to: u32) -> Vec<u32> {
        let (mut a, mut b) = (from, to);
        let mut head = vec![a];
        let mut tail = vec![b];
        while a != b {
            if self.depth[a as usize] >= self.depth[b as usize] {
                a = self.parent[a as usize].unwrap_or(a);
                head.push(a);
            } else {
                b = self.parent[b as usize].unwrap_or(b);
                tail.push(b);
            }
        }
        // Both walks end on the common ancestor.
        tail.pop();
        head.extend(tail.into_iter().rev());
        head
    }
}

/// Destination of the token on each physical qubit.
fn destinations(initial: &Layout, target: &Layout) -> Vec<u32> {
    let n = initial.num_physical();
    let blanks = (0..n as u32).filter(|&p| initial.logical(p).is_none());
    let mut free = (0..n as u32).filter(|&p| target.logical(p).is_none());
    let mut dest = vec![0; n];
    for (q, p) in initial.iter() {
        dest[p as usize] = target.physical(q).unwrap_or(p);
    }
    for p in blanks {
        dest[p as usize] = free.next().unwrap_or(p);
    }
    dest
}

impl SpanningTreeRouter {
    pub fn new() -> Self {
        Self
    }

    /// Swaps turning `initial` into `target`.
    pub fn plan(
        &self,
        topology: &Topology,
        initial: &Layout,
        target: &Layout,
    ) -> MapResult<Vec<(u32, u32)>> {
        if initial.num_physical() != topology.num_qubits() as usize
            || target.num_physical() != initial.num_physical()
            || target.num_logical() != initial.num_logical()
        {
            return Err(MapError::RouterOutput(
                "layouts do not match the topology".into(),
            ));
        }
        let tree = bfs_tree(topology)?;
        // token[p]: destination of the token currently on p.
        let mut token = destinations(initial, target);
        let mut occupied: Vec<bool> = (0..token.len() as u32)
            .map(|p| initial.logical(p).is_some())
            .collect();
        let mut swaps = Vec::new();

        for &v in tree.order.iter().rev() {
            let Some(at) = token.iter().position(|&d| d == v) else {
                continue;
            };
            let path = tree.path(at as u32, v);
            for step in path.windows(2) {
                let (a, b) = (step[0] as usize, step[1] as usize);
                if occupied[a] || occupied[b] {
                    swaps.push((step[0], step[1]));
                }
                token.swap(a, b);
                occupied.swap(a, b);
            }
        }
        Ok(swaps)
    }
}

#[async_trait]
impl Router for SpanningTreeRouter {
    fn name(&self) -> &str {
        "spanning-tree"
    }

    async fn route(&self, request: RouteRequest<'_>) -> MapResult<RouteResponse> {
        let swaps = self.plan(request.topology, request.initial, request.target)?;
        Ok(RouteResponse {
            cost: swaps.len() as f64,
            swaps,
        })
    }
}
