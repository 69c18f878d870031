//! Error types for the mapping pass.

use std::path::PathBuf;

use satmap_ir::IrError;
use thiserror::Error;

/// Errors that abort a mapping run.
///
/// Oracle timeouts and unsatisfiable chunks are not errors: they are
/// [`AttemptFailure`]s handled by the solve driver, and only surface as
/// [`MapError::MappingInfeasible`] once the bounded search gives up.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MapError {
    /// The circuit cannot be turned into an interaction sequence.
    #[error("Malformed circuit: {0}")]
    MalformedCircuit(String),

    /// The circuit or encoding does not fit the target.
    #[error("Circuit too large: {0}")]
    CircuitTooLarge(String),

    /// A solver literal id outside every variable family.
    #[error("Literal id {id} is outside the variable range 1..={num_vars}")]
    InvalidLiteralId { id: i64, num_vars: i64 },

    /// The external oracle could not be started.
    #[error("Failed to run oracle '{program}': {source}")]
    OracleUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The oracle's result stream could not be understood.
    #[error("Invalid oracle output: {0}")]
    OracleOutput(String),

    /// The backtracking search gave up.
    #[error(
        "No mapping found: chunk {chunk} still failing after {added_swaps} added swaps, \
         {negated_models} clauses learned against its final placement \
         and {rejected_boundaries} rejected starting placements"
    )]
    MappingInfeasible {
        chunk: usize,
        added_swaps: u32,
        /// Clauses learned against the chunk's own last slot.
        negated_models: usize,
        /// Clauses learned against the previous chunk's last slot.
        rejected_boundaries: usize,
    },

    /// The global time budget ran out.
    #[error("Time budget exhausted while solving chunk {chunk}")]
    BudgetExhausted { chunk: usize },

    /// A decoded slot mapping is not a bijection.
    #[error("Invalid solution: non-injective mapping at chunk {chunk}, slot {slot}: {detail}")]
    NonInjectiveMapping {
        chunk: usize,
        slot: usize,
        detail: String,
    },

    /// The first slot of a chunk disagrees with the previous chunk's last slot.
    #[error(
        "Invalid solution: chunk {chunk} places logical {logical} on {found}, \
         boundary requires {expected}"
    )]
    InconsistentBoundary {
        chunk: usize,
        logical: u32,
        expected: u32,
        found: u32,
    },

    /// A swap on a pair of physical qubits that are not coupled.
    #[error("Invalid solution: swap on ({}, {}) at chunk {chunk}, slot {slot}", .edge.0, .edge.1)]
    InvalidSwapEdge {
        chunk: usize,
        slot: usize,
        edge: (u32, u32),
    },

    /// A mapping change that the slot's swaps do not account for.
    #[error(
        "Invalid solution: logical {logical} at chunk {chunk}, slot {slot} is on {found}, \
         swaps move it to {expected}"
    )]
    UnexplainedMapping {
        chunk: usize,
        slot: usize,
        logical: u32,
        expected: u32,
        found: u32,
    },

    /// A two-qubit gate of the routed circuit lands on uncoupled qubits.
    #[error(
        "Two-qubit gate '{gate}' (instruction {instruction}) on uncoupled qubits ({}, {})",
        .physical.0, .physical.1
    )]
    NonAdjacentInteraction {
        gate: String,
        instruction: usize,
        physical: (u32, u32),
    },

    /// The external router could not be started.
    #[error("Failed to run router '{program}': {source}")]
    RouterUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The router's response could not be understood or is unusable.
    #[error("Invalid router output: {0}")]
    RouterOutput(String),

    /// Topology or calibration data is invalid.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O failure on a scratch or configuration file.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the circuit model.
    #[error("Circuit error: {0}")]
    Ir(#[from] IrError),
}

impl MapError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MapError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a single chunk attempt did not produce a usable boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The oracle ran out of its time slice.
    Timeout,
    /// The chunk instance has no model.
    Unsatisfiable,
    /// A model was reported but it places nothing at the chunk's last slot.
    MissingBoundary,
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptFailure::Timeout => write!(f, "timeout"),
            AttemptFailure::Unsatisfiable => write!(f, "unsatisfiable"),
            AttemptFailure::MissingBoundary => write!(f, "missing boundary"),
        }
    }
}

/// Result type for mapping operations.
pub type MapResult<T> = Result<T, MapError>;
