//! Two-qubit gate error rates.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{MapError, MapResult};
use crate::topology::Topology;

/// Error probability of the two-qubit gate on each coupled pair.
///
/// Rates are keyed by undirected edge; when both orientations of a pair are
/// given, the later entry wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Calibration {
    rates: FxHashMap<(u32, u32), f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CalibrationFile {
    /// One rate per topology edge, in edge order.
    List(Vec<f64>),
    /// `[[u, v], rate]` entries.
    Edges(Vec<((u32, u32), f64)>),
}

fn key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

fn check_rate(edge: (u32, u32), rate: f64) -> MapResult<f64> {
    if (0.0..1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(MapError::InvalidTopology(format!(
            "error rate {rate} on ({}, {}) is outside [0, 1)",
            edge.0, edge.1
        )))
    }
}

impl Calibration {
    /// Rates for explicit edges.
    pub fn from_edge_rates(entries: impl IntoIterator<Item = ((u32, u32), f64)>) -> MapResult<Self> {
        let mut rates = FxHashMap::default();
        for ((a, b), rate) in entries {
            rates.insert(key(a, b), check_rate((a, b), rate)?);
        }
        Ok(Self { rates })
    }

    /// Rates listed in the topology's edge order.
    pub fn from_edge_list(topology: &Topology, rates: &[f64]) -> MapResult<Self> {
        if rates.len() != topology.edges().len() {
            return Err(MapError::InvalidTopology(format!(
                "{} error rates for {} edges",
                rates.len(),
                topology.edges().len()
            )));
        }
        Self::from_edge_rates(topology.edges().iter().copied().zip(rates.iter().copied()))
    }

    /// Parse a JSON list of rates (edge order) or of `[[u, v], rate]` pairs.
    pub fn from_json(topology: &Topology, text: &str) -> MapResult<Self> {
        let file: CalibrationFile = serde_json::from_str(text)
            .map_err(|e| MapError::InvalidTopology(format!("unrecognised calibration file: {e}")))?;
        match file {
            CalibrationFile::List(rates) => Self::from_edge_list(topology, &rates),
            CalibrationFile::Edges(entries) => Self::from_edge_rates(entries),
        }
    }

    /// Error rate of the gate on `(a, b)`, in either orientation.
    pub fn error_rate(&self, a: u32, b: u32) -> Option<f64> {
        self.rates.get(&key(a, b)).copied()
    }

    /// Success probability `1 - error` of the gate on `(a, b)`.
    pub fn success_rate(&self, a: u32, b: u32) -> Option<f64> {
        self.error_rate(a, b).map(|e| 1.0 - e)
    }

    /// Check that every topology edge has a rate.
    pub fn covers(&self, topology: &Topology) -> MapResult<()> {
        match topology
            .edges()
            .iter()
            .find(|&&(a, b)| self.error_rate(a, b).is_none())
        {
            Some(&(a, b)) => Err(MapError::InvalidTopology(format!(
                "no calibration for edge ({a}, {b})"
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_insensitive() {
        let cal = Calibration::from_edge_rates([((2, 1), 0.05)]).unwrap();
        assert_eq!(cal.error_rate(1, 2), Some(0.05));
        assert_eq!(cal.error_rate(2, 1), Some(0.05));
        assert_eq!(cal.error_rate(0, 1), None);
    }

    #[test]
    fn test_rejects_out_of_range_rates() {
        assert!(Calibration::from_edge_rates([((0, 1), 1.0)]).is_err());
        assert!(Calibration::from_edge_rates([((0, 1), -0.1)]).is_err());
    }

    #[test]
    fn test_edge_list_follows_topology_order() {
        let topology = Topology::linear(3);
        let cal = Calibration::from_json(&topology, "[0.01, 0.02]").unwrap();
        assert_eq!(cal.error_rate(1, 2), Some(0.02));
        cal.covers(&topology).unwrap();

        assert!(Calibration::from_json(&topology, "[0.01]").is_err());
    }

    #[test]
    fn test_pair_form() {
        let topology = Topology::linear(3);
        let cal = Calibration::from_json(&topology, "[[[0, 1], 0.1]]").unwrap();
        assert!((cal.success_rate(1, 0).unwrap() - 0.9).abs() < 1e-12);
        assert!(cal.covers(&topology).is_err());
    }
}
