//! Physical device connectivity.

use std::collections::VecDeque;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{MapError, MapResult};

/// Undirected coupling graph of a device.
///
/// Edges are stored once as `(u, v)` with `u < v`, in insertion order; that
/// order fixes the edge indices used by calibration lists and by the swap
/// selector encoding. A distance matrix is precomputed with one BFS per
/// qubit, so distance lookups are O(1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    num_qubits: u32,
    edges: Vec<(u32, u32)>,
    adjacency: Vec<Vec<u32>>,
    /// `distances[a][b]`, or `u32::MAX` if unreachable.
    distances: Vec<Vec<u32>>,
}

/// On-disk forms accepted by [`Topology::from_json`].
#[derive(Deserialize)]
#[serde(untagged)]
enum TopologyFile {
    Rows(Vec<Vec<u32>>),
    Edges {
        num_qubits: Option<u32>,
        edges: Vec<(u32, u32)>,
    },
}

impl Topology {
    /// A topology with no edges.
    pub fn new(num_qubits: u32) -> Self {
        let mut topology = Self {
            num_qubits,
            edges: vec![],
            adjacency: vec![vec![]; num_qubits as usize],
            distances: vec![],
        };
        topology.precompute_distances();
        topology
    }

    /// Build from an edge list. Duplicates (in either direction) are merged;
    /// self-loops and out-of-range qubits are rejected.
    pub fn from_edges(
        num_qubits: u32,
        edges: impl IntoIterator<Item = (u32, u32)>,
    ) -> MapResult<Self> {
        let mut topology = Self::new(num_qubits);
        for (a, b) in edges {
            if a >= num_qubits || b >= num_qubits {
                return Err(MapError::InvalidTopology(format!(
                    "edge ({a}, {b}) references a qubit outside 0..{num_qubits}"
                )));
            }
            if a == b {
                return Err(MapError::InvalidTopology(format!("self-loop on qubit {a}")));
            }
            topology.insert_edge(a, b);
        }
        topology.precompute_distances();
        Ok(topology)
    }

    /// Build from an adjacency matrix. Any nonzero entry in either
    /// direction couples the pair, so directed device matrices are accepted.
    pub fn from_adjacency_matrix<T: Copy + Default + PartialEq>(matrix: &[Vec<T>]) -> MapResult<Self> {
        let n = matrix.len();
        if let Some(row) = matrix.iter().position(|row| row.len() != n) {
            return Err(MapError::InvalidTopology(format!(
                "adjacency matrix row {row} has {} entries, expected {n}",
                matrix[row].len()
            )));
        }
        let zero = T::default();
        let mut edges = vec![];
        for (a, row) in matrix.iter().enumerate() {
            for (b, &entry) in row.iter().enumerate() {
                if a != b && entry != zero {
                    edges.push((a as u32, b as u32));
                }
            }
        }
        Self::from_edges(n as u32, edges)
    }

    /// Parse a JSON adjacency matrix, a bare edge list, or an object with
    /// `edges` and optional `num_qubits`.
    ///
    /// A square 0/1 array is read as a matrix, any other array of pairs as
    /// an edge list.
    pub fn from_json(text: &str) -> MapResult<Self> {
        let file: TopologyFile = serde_json::from_str(text)
            .map_err(|e| MapError::InvalidTopology(format!("unrecognised topology file: {e}")))?;
        match file {
            TopologyFile::Rows(rows) => {
                let square = rows.iter().all(|r| r.len() == rows.len());
                let binary = rows.iter().flatten().all(|&v| v <= 1);
                if square && binary {
                    Self::from_adjacency_matrix(&rows)
                } else if rows.iter().all(|r| r.len() == 2) {
                    let edges: Vec<_> = rows.iter().map(|r| (r[0], r[1])).collect();
                    Self::from_edges(Self::span(&edges), edges)
                } else {
                    Err(MapError::InvalidTopology(
                        "array is neither a square 0/1 matrix nor a list of pairs".into(),
                    ))
                }
            }
            TopologyFile::Edges { num_qubits, edges } => {
                let n = num_qubits.unwrap_or_else(|| Self::span(&edges));
                Self::from_edges(n, edges)
            }
        }
    }

    fn span(edges: &[(u32, u32)]) -> u32 {
        edges.iter().map(|&(a, b)| a.max(b) + 1).max().unwrap_or(0)
    }

    fn insert_edge(&mut self, a: u32, b: u32) {
        let edge = (a.min(b), a.max(b));
        if self.edges.contains(&edge) {
            return;
        }
        self.edges.push(edge);
        self.adjacency[a as usize].push(b);
        self.adjacency[b as usize].push(a);
    }

    fn precompute_distances(&mut self) {
        let n = self.num_qubits as usize;
        self.distances = vec![vec![u32::MAX; n]; n];
        for src in 0..n {
            self.distances[src][src] = 0;
            let mut queue = VecDeque::from([src]);
            while let Some(cur) = queue.pop_front() {
                for &nb in &self.adjacency[cur] {
                    let nb = nb as usize;
                    if self.distances[src][nb] == u32::MAX {
                        self.distances[src][nb] = self.distances[src][cur] + 1;
                        queue.push_back(nb);
                    }
                }
            }
        }
    }

    /// Chain `0-1-2-...`.
    pub fn linear(n: u32) -> Self {
        Self::from_edges(n, (1..n).map(|i| (i - 1, i))).unwrap_or_else(|_| Self::new(n))
    }

    /// Cycle `0-1-...-(n-1)-0`.
    pub fn ring(n: u32) -> Self {
        let closing = (n > 2).then(|| (n - 1, 0));
        Self::from_edges(n, (1..n).map(|i| (i - 1, i)).chain(closing))
            .unwrap_or_else(|_| Self::new(n))
    }

    /// `rows x cols` mesh, qubits numbered row-major.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let n = rows * cols;
        let mut edges = vec![];
        for r in 0..rows {
            for c in 0..cols {
                let q = r * cols + c;
                if c + 1 < cols {
                    edges.push((q, q + 1));
                }
                if r + 1 < rows {
                    edges.push((q, q + cols));
                }
            }
        }
        Self::from_edges(n, edges).unwrap_or_else(|_| Self::new(n))
    }

    /// Qubit 0 coupled to every other qubit.
    pub fn star(n: u32) -> Self {
        Self::from_edges(n, (1..n).map(|i| (0, i))).unwrap_or_else(|_| Self::new(n))
    }

    /// Every pair coupled.
    pub fn full(n: u32) -> Self {
        let edges = (0..n).flat_map(|a| (a + 1..n).map(move |b| (a, b)));
        Self::from_edges(n, edges).unwrap_or_else(|_| Self::new(n))
    }

    /// Number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Edges as `(u, v)` with `u < v`.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Index of the edge joining `a` and `b`, in either orientation.
    pub fn edge_index(&self, a: u32, b: u32) -> Option<usize> {
        let edge = (a.min(b), a.max(b));
        self.edges.iter().position(|&e| e == edge)
    }

    /// Whether `a` and `b` are coupled.
    #[inline]
    pub fn is_adjacent(&self, a: u32, b: u32) -> bool {
        self.adjacency
            .get(a as usize)
            .is_some_and(|nbs| nbs.contains(&b))
    }

    /// Neighbours of `qubit`.
    pub fn neighbors(&self, qubit: u32) -> impl Iterator<Item = u32> + '_ {
        self.adjacency
            .get(qubit as usize)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Shortest-path distance, `None` if disconnected.
    pub fn distance(&self, a: u32, b: u32) -> Option<u32> {
        self.distances
            .get(a as usize)
            .and_then(|row| row.get(b as usize))
            .copied()
            .filter(|&d| d != u32::MAX)
    }

    /// The full distance matrix (`u32::MAX` marks unreachable pairs).
    pub fn distance_matrix(&self) -> &[Vec<u32>] {
        &self.distances
    }

    /// Whether every qubit can reach every other.
    pub fn is_connected(&self) -> bool {
        self.distances
            .first()
            .is_none_or(|row| row.iter().all(|&d| d != u32::MAX))
    }
}

impl FromStr for Topology {
    type Err = MapError;

    /// Parse `linear:N`, `ring:N`, `star:N`, `full:N`, `grid:N` (square) or
    /// `grid:RxC`.
    fn from_str(spec: &str) -> MapResult<Self> {
        let (kind, size) = spec.split_once(':').ok_or_else(|| {
            MapError::InvalidTopology(format!("expected '<kind>:<size>', got '{spec}'"))
        })?;
        let number = |s: &str| {
            s.trim()
                .parse::<u32>()
                .map_err(|_| MapError::InvalidTopology(format!("invalid size '{s}' in '{spec}'")))
        };
        match kind.trim() {
            "linear" => Ok(Self::linear(number(size)?)),
            "ring" | "circle" => Ok(Self::ring(number(size)?)),
            "star" => Ok(Self::star(number(size)?)),
            "full" => Ok(Self::full(number(size)?)),
            "grid" | "mesh" => match size.split_once('x') {
                Some((r, c)) => Ok(Self::grid(number(r)?, number(c)?)),
                None => {
                    let side = number(size)?;
                    Ok(Self::grid(side, side))
                }
            },
            other => Err(MapError::InvalidTopology(format!(
                "unknown topology kind '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_distances() {
        let t = Topology::linear(5);
        assert_eq!(t.edges().len(), 4);
        assert_eq!(t.distance(0, 4), Some(4));
        assert!(t.is_adjacent(2, 1));
        assert!(!t.is_adjacent(0, 2));
    }

    #[test]
    fn test_ring_closes() {
        let t = Topology::ring(4);
        assert_eq!(t.edges().len(), 4);
        assert_eq!(t.distance(0, 3), Some(1));
        assert_eq!(t.distance(0, 2), Some(2));
    }

    #[test]
    fn test_grid_shape() {
        let t = Topology::grid(2, 3);
        assert_eq!(t.num_qubits(), 6);
        assert_eq!(t.edges().len(), 7);
        assert_eq!(t.distance(0, 5), Some(3));
    }

    #[test]
    fn test_duplicate_edges_merged() {
        let t = Topology::from_edges(3, [(0, 1), (1, 0), (1, 2)]).unwrap();
        assert_eq!(t.edges(), &[(0, 1), (1, 2)]);
        assert_eq!(t.edge_index(2, 1), Some(1));
    }

    #[test]
    fn test_rejects_bad_edges() {
        assert!(Topology::from_edges(2, [(0, 2)]).is_err());
        assert!(Topology::from_edges(2, [(1, 1)]).is_err());
    }

    #[test]
    fn test_directed_matrix_is_symmetrised() {
        let matrix = vec![vec![0, 1, 0], vec![0, 0, 0], vec![0, 1, 0]];
        let t = Topology::from_adjacency_matrix(&matrix).unwrap();
        assert_eq!(t.edges(), &[(0, 1), (1, 2)]);
    }

    #[test]
    fn test_disconnected() {
        let t = Topology::from_edges(4, [(0, 1), (2, 3)]).unwrap();
        assert!(!t.is_connected());
        assert_eq!(t.distance(0, 3), None);
        assert!(Topology::linear(4).is_connected());
    }

    #[test]
    fn test_from_json_forms() {
        let m = Topology::from_json("[[0,1],[1,0]]").unwrap();
        assert_eq!(m.edges(), &[(0, 1)]);
        let e = Topology::from_json(r#"{"num_qubits": 4, "edges": [[0,1],[2,3]]}"#).unwrap();
        assert_eq!(e.num_qubits(), 4);
        let l = Topology::from_json("[[0,1],[1,2],[2,3]]").unwrap();
        assert_eq!(l.num_qubits(), 4);
        assert_eq!(l.distance(0, 3), Some(3));
        assert!(Topology::from_json("[[0,1,2]]").is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("linear:3".parse::<Topology>().unwrap().edges().len(), 2);
        assert_eq!("grid:2x2".parse::<Topology>().unwrap().edges().len(), 4);
        assert_eq!("grid:3".parse::<Topology>().unwrap().num_qubits(), 9);
        assert!("hexagon:3".parse::<Topology>().is_err());
        assert!("linear".parse::<Topology>().is_err());
    }
}
