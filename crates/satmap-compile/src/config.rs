//! Mapper configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MapError, MapResult};
use crate::ordering::Layering;

/// How swaps are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Swaps are part of the encoding and chosen by the oracle.
    #[default]
    Routed,
    /// The oracle minimises the topology distance travelled by mapping
    /// changes; a router realises them afterwards.
    Weighted,
    /// At most `max_displaced` qubits move per chunk; a router realises the
    /// moves afterwards.
    BoundedDisplacement,
    /// The oracle minimises the number of mapping changes; a router realises
    /// them afterwards.
    Deferred,
}

impl RoutingMode {
    /// Whether swaps come from the oracle model.
    pub fn is_routed(self) -> bool {
        self == RoutingMode::Routed
    }
}

/// Parameters of a mapping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Swap steps available per layer before any budget growth.
    pub swaps_per_layer: u32,
    /// Target number of slots per chunk.
    pub slice_size: usize,
    /// Wall-clock budget for all oracle calls together.
    #[serde(with = "secs")]
    pub time_budget: Duration,
    pub routing: RoutingMode,
    pub layering: Layering,
    /// A failed chunk backtracks while its predecessor has fewer than
    /// `backtrack_factor * (added_swaps + 1)` learned boundary clauses.
    pub backtrack_factor: usize,
    /// Largest swap budget growth for a single chunk.
    pub max_added_swaps: u32,
    /// Total chunk attempts before giving up.
    pub max_attempts: usize,
    /// Largest number of displaced qubits in bounded-displacement mode.
    pub max_displaced: usize,
    /// Bound on displacement cap clauses per chunk. Bounded-displacement
    /// chunks are shortened to fit it, and stop growing their cap when the
    /// next step would not fit.
    pub max_displacement_clauses: u64,
    /// Scale of calibrated soft weights (`-scale * ln(1 - error)`).
    pub fidelity_scale: f64,
    /// Solver calls spent searching for a minimum boundary core before
    /// falling back to deletion-based minimisation.
    pub core_probe_limit: usize,
    /// Require the final mapping to equal the initial one.
    pub cyclic: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            swaps_per_layer: 1,
            slice_size: 25,
            time_budget: Duration::from_secs(600),
            routing: RoutingMode::Routed,
            layering: Layering::Trivial,
            backtrack_factor: 50,
            max_added_swaps: 4,
            max_attempts: 10_000,
            max_displaced: 4,
            max_displacement_clauses: 5_000_000,
            fidelity_scale: 1000.0,
            core_probe_limit: 2048,
            cyclic: false,
        }
    }
}

impl MapperConfig {
    pub fn with_swaps_per_layer(mut self, swaps: u32) -> Self {
        self.swaps_per_layer = swaps;
        self
    }

    pub fn with_slice_size(mut self, slice_size: usize) -> Self {
        self.slice_size = slice_size;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_routing(mut self, routing: RoutingMode) -> Self {
        self.routing = routing;
        self
    }

    pub fn with_layering(mut self, layering: Layering) -> Self {
        self.layering = layering;
        self
    }

    pub fn with_max_added_swaps(mut self, max: u32) -> Self {
        self.max_added_swaps = max;
        self
    }

    pub fn with_max_displaced(mut self, max: usize) -> Self {
        self.max_displaced = max;
        self
    }

    pub fn with_max_displacement_clauses(mut self, max: u64) -> Self {
        self.max_displacement_clauses = max;
        self
    }

    pub fn with_cyclic(mut self, cyclic: bool) -> Self {
        self.cyclic = cyclic;
        self
    }

    /// Reject settings the driver cannot run with.
    pub fn validate(&self) -> MapResult<()> {
        if self.slice_size == 0 {
            return Err(MapError::InvalidConfig("slice_size must be positive".into()));
        }
        if self.time_budget.is_zero() {
            return Err(MapError::InvalidConfig("time_budget must be positive".into()));
        }
        if self.max_displaced == 0 {
            return Err(MapError::InvalidConfig("max_displaced must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(MapError::InvalidConfig("max_attempts must be positive".into()));
        }
        if !(self.fidelity_scale.is_finite() && self.fidelity_scale > 0.0) {
            return Err(MapError::InvalidConfig(
                "fidelity_scale must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

/// An external MaxSAT solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Solver executable.
    pub program: PathBuf,
    /// Value passed as `-iterations=<n>`.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Directory for clause and result files; the system temp dir if unset.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_iterations() -> u32 {
    100
}

impl OracleConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            iterations: default_iterations(),
            work_dir: None,
        }
    }
}

/// An external router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Router executable; receives the request file path.
    pub program: PathBuf,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub mapper: MapperConfig,
    pub oracle: Option<OracleConfig>,
    pub router: Option<RouterConfig>,
}

impl Config {
    /// Parse YAML text (JSON is accepted too, being a YAML subset).
    pub fn from_yaml(text: &str) -> MapResult<Self> {
        let config: Config = serde_yaml_ng::from_str(text)
            .map_err(|e| MapError::InvalidConfig(e.to_string()))?;
        config.mapper.validate()?;
        Ok(config)
    }

    /// Parse JSON text.
    pub fn from_json(text: &str) -> MapResult<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| MapError::InvalidConfig(e.to_string()))?;
        config.mapper.validate()?;
        Ok(config)
    }

    /// Load a file, choosing the format by extension (`.json`, else YAML).
    pub fn from_path(path: &Path) -> MapResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| MapError::io(path, e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }
}

/// `Duration` as (fractional) seconds.
mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        MapperConfig::default().validate().unwrap();
    }

    #[test]
    fn test_yaml_overrides() {
        let config = Config::from_yaml(
            "slice_size: 10\ntime_budget: 2.5\nrouting: bounded_displacement\n\
             layering: conflict\noracle:\n  program: /opt/open-wbo-inc\n",
        )
        .unwrap();
        assert_eq!(config.mapper.slice_size, 10);
        assert_eq!(config.mapper.time_budget, Duration::from_millis(2500));
        assert_eq!(config.mapper.routing, RoutingMode::BoundedDisplacement);
        assert_eq!(config.mapper.layering, Layering::Conflict);
        assert_eq!(config.mapper.swaps_per_layer, 1);
        let oracle = config.oracle.unwrap();
        assert_eq!(oracle.iterations, 100);
        assert!(config.router.is_none());
    }

    #[test]
    fn test_json_and_validation() {
        let config = Config::from_json(r#"{"cyclic": true, "swaps_per_layer": 2}"#).unwrap();
        assert!(config.mapper.cyclic);
        assert_eq!(config.mapper.swaps_per_layer, 2);

        assert!(matches!(
            Config::from_json(r#"{"slice_size": 0}"#),
            Err(MapError::InvalidConfig(_))
        ));
        assert!(Config::from_yaml("max_displaced: 0").is_err());
    }
}
